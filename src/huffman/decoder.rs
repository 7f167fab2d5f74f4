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

use super::Huffman;
use crate::{FqPackError, Word, WORD_BITS};

/// Decodes one symbol at a time from caller-supplied bits. Used for the
/// short Huffman-coded fields of description records, where the bit source
/// is a [`crate::bitstream::BitReader`].
pub struct BitwiseDecoder<'a> {
    huffman: &'a Huffman,
    cur: u32,
}

impl<'a> BitwiseDecoder<'a> {
    pub fn new(huffman: &'a Huffman) -> Self {
        debug_assert!(huffman.has_tree(), "no coded symbols to decode");
        BitwiseDecoder {
            huffman,
            cur: huffman.root(),
        }
    }

    /// Feed one bit. Returns the decoded symbol once a leaf is reached and
    /// rearms for the next symbol; `None` means more bits are needed.
    ///
    /// A tree with a single leaf is degenerate: the encoder emits one bit
    /// per symbol, and this decoder returns the symbol on every call without
    /// examining the bit's value.
    pub fn next(&mut self, bit: bool) -> Option<u64> {
        if self.huffman.is_leaf(self.cur) {
            return Some(self.huffman.symbol(self.cur));
        }
        self.cur = self.huffman.child(self.cur, bit);
        if self.huffman.is_leaf(self.cur) {
            let symbol = self.huffman.symbol(self.cur);
            self.cur = self.huffman.root();
            Some(symbol)
        }
        else {
            None
        }
    }
}

/// Supplies successive windows of encoded words to a [`StreamingDecoder`].
///
/// Implementations hold their current window so the decoder can pause
/// mid-window between calls; `advance` invalidates the previous window.
pub trait ChunkSource {
    /// Move to the next window. Returns false when the data is exhausted.
    fn advance(&mut self) -> Result<bool, FqPackError>;

    /// Words of the current window.
    fn words(&self) -> &[Word];

    /// Bits of trailing padding in the last word of the current window.
    fn pad_bits(&self) -> u32;
}

/// A single in-memory window.
pub struct MemChunkSource {
    words: Vec<Word>,
    pad_bits: u32,
    consumed: bool,
}

impl MemChunkSource {
    pub fn new(words: Vec<Word>, pad_bits: u32) -> Self {
        debug_assert!(pad_bits <= WORD_BITS);
        MemChunkSource {
            words,
            pad_bits,
            consumed: false,
        }
    }
}

impl ChunkSource for MemChunkSource {
    fn advance(&mut self) -> Result<bool, FqPackError> {
        if self.consumed {
            Ok(false)
        }
        else {
            self.consumed = true;
            Ok(true)
        }
    }

    fn words(&self) -> &[Word] {
        &self.words
    }

    fn pad_bits(&self) -> u32 {
        self.pad_bits
    }
}

/// Streaming decoder over a [`ChunkSource`]. Owns the Huffman code it
/// decodes with; partial symbols may span window boundaries.
pub struct StreamingDecoder<S: ChunkSource> {
    huffman: Huffman,
    source: S,
    cur_node: u32,
    cur_word: usize,
    cur_bit: u32,
    exhausted: bool,
}

impl<S: ChunkSource> StreamingDecoder<S> {
    pub fn new(huffman: Huffman, source: S) -> Result<Self, FqPackError> {
        debug_assert!(huffman.has_tree(), "no coded symbols to decode");
        let mut decoder = StreamingDecoder {
            cur_node: huffman.root(),
            huffman,
            source,
            cur_word: 0,
            cur_bit: 0,
            exhausted: false,
        };
        decoder.refill()?;
        Ok(decoder)
    }

    /// Discard the current window and cursor and fetch a fresh window from
    /// the source. Used after the source has been repositioned to a sampled
    /// page.
    pub fn refill(&mut self) -> Result<(), FqPackError> {
        self.exhausted = !self.source.advance()?;
        self.cur_word = 0;
        self.cur_bit = 0;
        self.cur_node = self.huffman.root();
        Ok(())
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn huffman(&self) -> &Huffman {
        &self.huffman
    }

    fn bits_in_word(&self, idx: usize) -> u32 {
        if idx + 1 == self.source.words().len() {
            WORD_BITS - self.source.pad_bits()
        }
        else {
            WORD_BITS
        }
    }

    fn next_bit(&mut self) -> Result<Option<bool>, FqPackError> {
        loop {
            if self.exhausted {
                return Ok(None);
            }
            if self.cur_word >= self.source.words().len() {
                if !self.source.advance()? {
                    self.exhausted = true;
                    return Ok(None);
                }
                self.cur_word = 0;
                self.cur_bit = 0;
                continue;
            }
            let limit = self.bits_in_word(self.cur_word);
            if self.cur_bit >= limit {
                self.cur_word += 1;
                self.cur_bit = 0;
                continue;
            }
            let word = self.source.words()[self.cur_word];
            let bit = (word >> (WORD_BITS - 1 - self.cur_bit)) & 1 == 1;
            self.cur_bit += 1;
            return Ok(Some(bit));
        }
    }

    /// Decode up to `count` symbols into `out`. Returns true if all `count`
    /// were read, false if the source ran dry first.
    pub fn next(&mut self, out: &mut Vec<u64>, count: u64) -> Result<bool, FqPackError> {
        if count == 0 {
            return Ok(true);
        }
        let root = self.huffman.root();
        if self.huffman.is_leaf(root) {
            // one bit per symbol, value ignored
            let symbol = self.huffman.symbol(root);
            for _ in 0..count {
                if self.next_bit()?.is_none() {
                    return Ok(false);
                }
                out.push(symbol);
            }
            return Ok(true);
        }
        let mut read = 0;
        while read < count {
            let Some(bit) = self.next_bit()? else {
                return Ok(false);
            };
            self.cur_node = self.huffman.child(self.cur_node, bit);
            if self.huffman.is_leaf(self.cur_node) {
                out.push(self.huffman.symbol(self.cur_node));
                self.cur_node = root;
                read += 1;
            }
        }
        Ok(true)
    }
}
