/*
    fqpack
    https://github.com/fqpack/fqpack

    Copyright 2026 The fqpack authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! Huffman coding over an arbitrary symbol -> frequency function.
//!
//! Construction is deterministic: the priority queue orders nodes by
//! `(frequency, symbol)`, so two builds over the same distribution produce
//! bit-identical codes. Encoding is a table lookup; decoding comes in a
//! bit-by-bit flavor (short header fields) and a streaming flavor over a
//! pluggable chunk source (the read payload). Nodes live in an id-indexed
//! arena, which the queue briefly shares while merging, so there are no
//! ownership cycles.

mod decoder;

pub use decoder::{BitwiseDecoder, ChunkSource, MemChunkSource, StreamingDecoder};

use crate::rbtree::RbTree;
use crate::Word;

const NIL: u32 = u32::MAX;

/// A right-justified prefix code: the low `length` bits of `code` hold the
/// code word, MSB-first on the wire. Length zero means "symbol cannot be
/// encoded" (zero frequency).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HuffCode {
    pub code: Word,
    pub length: u32,
}

struct HuffNode {
    symbol: u64,
    freq: u64,
    code: HuffCode,
    left: u32,
    right: u32,
}

/// Priority-queue key during construction. Ordering is `(freq, symbol)`;
/// both pairs are unique within one build, so the node id rides along
/// without participating in the ordering.
struct QueueKey {
    freq: u64,
    symbol: u64,
    node: u32,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.freq == other.freq && self.symbol == other.symbol
    }
}

impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.freq, self.symbol).cmp(&(other.freq, other.symbol))
    }
}

pub struct Huffman {
    nodes: Vec<HuffNode>,
    root: u32,
    codes: Vec<HuffCode>,
    num_coded: u64,
    total_bits: u64,
    total_chars: u64,
}

impl Huffman {
    /// Build a code over symbols `0..num_symbols` with the given frequency
    /// function. Symbols with zero frequency keep a table slot with code
    /// length zero.
    pub fn new<F: Fn(u64) -> u64>(num_symbols: u64, freq: F) -> Self {
        debug_assert!(num_symbols > 0);
        let mut nodes: Vec<HuffNode> = Vec::new();
        let mut queue: RbTree<QueueKey> = RbTree::new();

        for symbol in 0..num_symbols {
            let f = freq(symbol);
            if f > 0 {
                let id = nodes.len() as u32;
                nodes.push(HuffNode {
                    symbol,
                    freq: f,
                    code: HuffCode::default(),
                    left: NIL,
                    right: NIL,
                });
                queue.insert(QueueKey { freq: f, symbol, node: id });
            }
        }

        let num_coded = queue.len() as u64;
        let root = match num_coded {
            0 => NIL,
            1 => {
                // A lone symbol still costs one bit per occurrence so the
                // decoders have something to consume.
                let key = queue.pop_min().expect("one queued node");
                nodes[key.node as usize].code = HuffCode { code: 0, length: 1 };
                key.node
            }
            _ => {
                let mut newest = NIL;
                for _ in 0..num_coded - 1 {
                    let n1 = queue.pop_min().expect("first minimum");
                    let n2 = queue.pop_min().expect("second minimum");
                    let symbol = n1.symbol.max(n2.symbol);
                    let freq = n1.freq + n2.freq;
                    // The lighter of the two popped nodes goes right.
                    let (left, right) = if n1.freq < n2.freq {
                        (n2.node, n1.node)
                    }
                    else {
                        (n1.node, n2.node)
                    };
                    let id = nodes.len() as u32;
                    nodes.push(HuffNode {
                        symbol,
                        freq,
                        code: HuffCode::default(),
                        left,
                        right,
                    });
                    queue.insert(QueueKey { freq, symbol, node: id });
                    newest = id;
                }
                debug_assert_eq!(queue.len(), 1);
                newest
            }
        };

        let mut huffman = Huffman {
            nodes,
            root,
            codes: vec![HuffCode::default(); num_symbols as usize],
            num_coded,
            total_bits: 0,
            total_chars: 0,
        };
        huffman.assign_codes();
        huffman
    }

    /// Walk the tree assigning `(code << 1 | bit, length + 1)` to children,
    /// then fill the encode table and the size totals from the leaves.
    fn assign_codes(&mut self) {
        if self.root == NIL {
            return;
        }
        if self.num_coded > 1 {
            let mut stack = vec![self.root];
            while let Some(id) = stack.pop() {
                let node = &self.nodes[id as usize];
                let (left, right, code) = (node.left, node.right, node.code);
                if left != NIL {
                    self.nodes[left as usize].code = HuffCode {
                        code: code.code << 1,
                        length: code.length + 1,
                    };
                    self.nodes[right as usize].code = HuffCode {
                        code: (code.code << 1) | 1,
                        length: code.length + 1,
                    };
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        let leaf_data: Vec<_> = self.leaves().collect();
        for (symbol, freq, code) in leaf_data {
            self.codes[symbol as usize] = code;
            self.total_bits += code.length as u64 * freq;
            self.total_chars += freq;
        }
    }

    /// Look up the code for `symbol`. Encoding a symbol that had zero
    /// frequency is a caller bug; the returned length is zero in release
    /// builds.
    pub fn encode(&self, symbol: u64) -> HuffCode {
        debug_assert!((symbol as usize) < self.codes.len());
        let code = self.codes[symbol as usize];
        debug_assert!(code.length > 0, "encoding symbol {symbol} with zero frequency");
        code
    }

    /// Number of symbols with nonzero frequency.
    pub fn num_coded_symbols(&self) -> u64 {
        self.num_coded
    }

    /// Size of the symbol space, including uncoded symbols.
    pub fn num_symbols(&self) -> u64 {
        self.codes.len() as u64
    }

    /// `(total_bits, total_chars)`: bits needed for the whole input and the
    /// number of input symbols, per the distribution.
    pub fn size(&self) -> (u64, u64) {
        (self.total_bits, self.total_chars)
    }

    /// Leaves in left-first tree order as `(symbol, freq, code)`.
    pub fn leaves(&self) -> Leaves<'_> {
        let stack = if self.root == NIL { Vec::new() } else { vec![self.root] };
        Leaves { huffman: self, stack }
    }

    #[inline]
    pub(crate) fn root(&self) -> u32 {
        self.root
    }

    #[inline]
    pub(crate) fn has_tree(&self) -> bool {
        self.root != NIL
    }

    #[inline]
    pub(crate) fn is_leaf(&self, id: u32) -> bool {
        self.nodes[id as usize].left == NIL
    }

    #[inline]
    pub(crate) fn child(&self, id: u32, bit: bool) -> u32 {
        let node = &self.nodes[id as usize];
        if bit {
            node.right
        }
        else {
            node.left
        }
    }

    #[inline]
    pub(crate) fn symbol(&self, id: u32) -> u64 {
        self.nodes[id as usize].symbol
    }
}

/// Depth-first, left-first iterator over the leaves of a [`Huffman`] tree.
pub struct Leaves<'a> {
    huffman: &'a Huffman,
    stack: Vec<u32>,
}

impl Iterator for Leaves<'_> {
    type Item = (u64, u64, HuffCode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = &self.huffman.nodes[id as usize];
            if node.left == NIL {
                return Some((node.symbol, node.freq, node.code));
            }
            // right below left so the left branch pops first
            self.stack.push(node.right);
            self.stack.push(node.left);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic_distribution() -> [u64; 6] {
        [45, 16, 13, 12, 9, 5]
    }

    #[test]
    fn six_symbol_codes() {
        let distr = classic_distribution();
        let huffman = Huffman::new(6, |s| distr[s as usize]);

        assert_eq!(huffman.num_coded_symbols(), 6);
        assert_eq!(huffman.encode(0), HuffCode { code: 0b1, length: 1 });
        assert_eq!(huffman.encode(1), HuffCode { code: 0b000, length: 3 });
        assert_eq!(huffman.encode(2), HuffCode { code: 0b010, length: 3 });
        assert_eq!(huffman.encode(3), HuffCode { code: 0b011, length: 3 });
        assert_eq!(huffman.encode(4), HuffCode { code: 0b0010, length: 4 });
        assert_eq!(huffman.encode(5), HuffCode { code: 0b0011, length: 4 });

        // code lengths never decrease as frequency drops
        let mut prev_len = 0;
        for s in 0..6 {
            let len = huffman.encode(s).length;
            assert!(len >= prev_len);
            prev_len = len;
        }

        let (bits, chars) = huffman.size();
        assert_eq!(chars, 100);
        assert_eq!(bits, 45 + 3 * (16 + 13 + 12) + 4 * (9 + 5));
    }

    #[test]
    fn builds_are_deterministic() {
        let distr = classic_distribution();
        let a = Huffman::new(6, |s| distr[s as usize]);
        let b = Huffman::new(6, |s| distr[s as usize]);
        for s in 0..6 {
            assert_eq!(a.encode(s), b.encode(s));
        }
    }

    #[test]
    fn zero_frequency_symbols_keep_empty_slots() {
        let huffman = Huffman::new(8, |s| if s % 2 == 0 { s + 1 } else { 0 });
        assert_eq!(huffman.num_coded_symbols(), 4);
        assert_eq!(huffman.num_symbols(), 8);
        for s in (1..8).step_by(2) {
            assert_eq!(huffman.codes[s as usize].length, 0);
        }
    }

    #[test]
    fn single_symbol_gets_one_bit() {
        let huffman = Huffman::new(4, |s| if s == 2 { 10 } else { 0 });
        assert_eq!(huffman.encode(2), HuffCode { code: 0, length: 1 });
        let (bits, chars) = huffman.size();
        assert_eq!((bits, chars), (10, 10));
    }

    #[test]
    fn leaves_cover_coded_symbols() {
        let distr = classic_distribution();
        let huffman = Huffman::new(6, |s| distr[s as usize]);
        let mut seen: Vec<u64> = huffman.leaves().map(|(s, _, _)| s).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        for (symbol, freq, code) in huffman.leaves() {
            assert_eq!(distr[symbol as usize], freq);
            assert_eq!(code, huffman.encode(symbol));
        }
    }

    #[test]
    fn average_length_close_to_entropy() {
        let distr: Vec<u64> = vec![1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144];
        let total: u64 = distr.iter().sum();
        let huffman = Huffman::new(distr.len() as u64, |s| distr[s as usize]);
        let (bits, chars) = huffman.size();
        let avg = bits as f64 / chars as f64;
        let entropy: f64 = distr
            .iter()
            .filter(|&&f| f > 0)
            .map(|&f| {
                let p = f as f64 / total as f64;
                -p * p.log2()
            })
            .sum();
        assert!(avg >= entropy - 1e-9, "avg {avg} below entropy {entropy}");
        assert!(avg < entropy + 1.0, "avg {avg} more than one bit over entropy {entropy}");
    }
}
