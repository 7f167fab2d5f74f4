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

use std::collections::HashMap;

/// A sparse histogram over signed keys.
///
/// The description analyzer observes numeric values, deltas, leading-zero
/// counts, and per-column characters; their ranges can be large but the
/// number of distinct keys stays small, so a map beats a dense table. The
/// Huffman builder plugs in through a frequency closure, which lets sparse
/// histograms and dense tables share one code path.
#[derive(Debug, Default, Clone)]
pub struct Histogram {
    counts: HashMap<i64, u64>,
}

impl Histogram {
    pub fn new() -> Self {
        Histogram::default()
    }

    /// Count one occurrence of `key`. Returns true if the key was new.
    pub fn add(&mut self, key: i64) -> bool {
        match self.counts.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut e) => {
                *e.get_mut() += 1;
                false
            }
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(1);
                true
            }
        }
    }

    /// Record `key` with an explicit count (used when reading archived
    /// distributions back).
    pub fn set(&mut self, key: i64, count: u64) {
        self.counts.insert(key, count);
    }

    pub fn get(&self, key: i64) -> u64 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries in ascending key order. Header serialization depends on this
    /// being deterministic.
    pub fn sorted_entries(&self) -> Vec<(i64, u64)> {
        let mut entries: Vec<_> = self.counts.iter().map(|(&k, &v)| (k, v)).collect();
        entries.sort_unstable_by_key(|&(k, _)| k);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_order() {
        let mut hist = Histogram::new();
        assert!(hist.add(5));
        assert!(!hist.add(5));
        assert!(hist.add(-3));
        assert_eq!(hist.get(5), 2);
        assert_eq!(hist.get(-3), 1);
        assert_eq!(hist.get(0), 0);
        assert_eq!(hist.len(), 2);
        assert_eq!(hist.sorted_entries(), vec![(-3, 1), (5, 2)]);
    }
}
