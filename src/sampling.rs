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

//! The sampling index: a sparse, monotone map from logical element numbers
//! to page-aligned byte offsets in the encoded stream. A decoder looks up
//! the greatest sample at or below the wanted element, maps the page at the
//! sample's offset, and decodes forward from there.

use binrw::{BinReaderExt, BinWriterExt};

use crate::io::{ReadSeek, Seek, Write};
use crate::FqPackError;

/// How an encoder decides where to place samples.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SamplingConfig {
    /// No random-access index; decoding is sequential from the start.
    #[default]
    None,
    /// A sample every `rate` elements.
    Regular(u64),
    /// A sample on the first element that would cross a page boundary after
    /// at least `rate` pages were filled.
    Page(u64),
}

const METHOD_REGULAR: u8 = 0;
const METHOD_PAGES: u8 = 1;

pub struct Sampling {
    regular: bool,
    rate: u64,
    page_size: u64,
    /// byte offsets of the sampled pages, strictly increasing
    samples: Vec<u64>,
    /// page mode only: element number of each sample (regular mode derives
    /// them as `index * rate`)
    element_nums: Vec<u64>,
    cur_sample: usize,
    cur_elem: u64,
}

impl Sampling {
    pub fn new_regular(rate: u64, first_offset: u64) -> Self {
        let page_size = crate::page_size();
        debug_assert!(rate != 0);
        debug_assert!(first_offset % page_size == 0);
        Sampling {
            regular: true,
            rate,
            page_size,
            samples: vec![first_offset],
            element_nums: Vec::new(),
            cur_sample: 0,
            cur_elem: 0,
        }
    }

    pub fn new_page(rate: u64, first_offset: u64) -> Self {
        let mut sampling = Sampling::new_regular(rate, first_offset);
        sampling.regular = false;
        sampling.element_nums.push(0);
        sampling
    }

    pub fn is_regular(&self) -> bool {
        self.regular
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    pub fn num_of_samples(&self) -> usize {
        self.samples.len()
    }

    /// Should the element about to be written become a sample?
    ///
    /// `pages_written` and `elements_written` count since the last sample;
    /// `elem_bits` is the encoded size of the pending element and
    /// `bits_left_in_page` the room left in the current page. Regular mode
    /// triggers purely on the element count; page mode only at a page
    /// boundary the pending element would straddle.
    pub fn is_next_sample(
        &self,
        pages_written: u64,
        elements_written: u64,
        elem_bits: u64,
        bits_left_in_page: u64,
    ) -> bool {
        if self.regular {
            elements_written >= self.rate
        }
        else {
            pages_written >= self.rate && bits_left_in_page < elem_bits
        }
    }

    /// Record a sample. `position` must be page-aligned (the producer calls
    /// `flush_advance` first); both arguments must be monotone.
    pub fn add_sample(&mut self, position: u64, element_num: u64) {
        debug_assert!(position % self.page_size == 0);
        debug_assert!(self.samples.last().map_or(true, |&last| last < position));
        if self.regular {
            debug_assert!(element_num % self.rate == 0);
        }
        else {
            debug_assert!(self.element_nums.last().map_or(true, |&last| last < element_num));
            self.element_nums.push(element_num);
        }
        self.samples.push(position);
    }

    fn element_of(&self, idx: usize) -> u64 {
        if self.regular {
            idx as u64 * self.rate
        }
        else {
            self.element_nums[idx]
        }
    }

    /// The greatest sample with element number <= `element_num`, as
    /// `(sampled_element, position)`. Also repositions the sequential
    /// sample cursor there.
    pub fn get_page(&mut self, element_num: u64) -> (u64, u64) {
        let idx = if self.regular {
            ((element_num / self.rate) as usize).min(self.samples.len() - 1)
        }
        else {
            // element_nums[0] == 0, so the partition point is never 0
            self.element_nums.partition_point(|&e| e <= element_num).max(1) - 1
        };
        self.cur_sample = idx;
        self.cur_elem = self.element_of(idx);
        (self.cur_elem, self.samples[idx])
    }

    /// Element number of the sample after the cursor, if any. A sequential
    /// decoder compares this against the element it is about to decode to
    /// know when to hop to the next sampled page.
    pub fn peek_next_element(&self) -> Option<u64> {
        let next = self.cur_sample + 1;
        (next < self.samples.len()).then(|| self.element_of(next))
    }

    /// Step the cursor to the next sample and return it.
    pub fn advance_sample(&mut self) -> Option<(u64, u64)> {
        let next = self.cur_sample + 1;
        if next < self.samples.len() {
            self.cur_sample = next;
            self.cur_elem = self.element_of(next);
            Some((self.cur_elem, self.samples[next]))
        }
        else {
            None
        }
    }

    /// Rewind the sequential sample cursor to the first sample.
    pub fn rewind(&mut self) {
        self.cur_sample = 0;
        self.cur_elem = 0;
    }

    /// Serialize as `num_of_samples`, `method`, `rate`, the sample offsets,
    /// and (page mode only) the element numbers, all little-endian.
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<(), FqPackError> {
        writer.write_le(&(self.samples.len() as u64))?;
        writer.write_le(&if self.regular { METHOD_REGULAR } else { METHOD_PAGES })?;
        writer.write_le(&self.rate)?;
        for &sample in &self.samples {
            writer.write_le(&sample)?;
        }
        if !self.regular {
            for &element in &self.element_nums {
                writer.write_le(&element)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: ReadSeek>(reader: &mut R) -> Result<Self, FqPackError> {
        let num_of_samples: u64 = reader.read_le()?;
        let method: u8 = reader.read_le()?;
        let rate: u64 = reader.read_le()?;
        if num_of_samples == 0 || rate == 0 {
            return Err(FqPackError::Inconsistent("empty sampling table".into()));
        }
        if method != METHOD_REGULAR && method != METHOD_PAGES {
            return Err(FqPackError::Inconsistent(format!("unknown sampling method {method}")));
        }
        let mut samples = Vec::with_capacity(num_of_samples as usize);
        for _ in 0..num_of_samples {
            samples.push(reader.read_le::<u64>()?);
        }
        let mut element_nums = Vec::new();
        if method == METHOD_PAGES {
            element_nums.reserve(num_of_samples as usize);
            for _ in 0..num_of_samples {
                element_nums.push(reader.read_le::<u64>()?);
            }
        }

        if !samples.windows(2).all(|w| w[0] < w[1]) {
            return Err(FqPackError::Inconsistent("sample offsets not increasing".into()));
        }
        if method == METHOD_PAGES {
            if element_nums.first() != Some(&0) {
                return Err(FqPackError::Inconsistent("first sample must anchor element 0".into()));
            }
            if !element_nums.windows(2).all(|w| w[0] < w[1]) {
                return Err(FqPackError::Inconsistent("sample elements not increasing".into()));
            }
        }
        Ok(Sampling {
            regular: method == METHOD_REGULAR,
            rate,
            page_size: crate::page_size(),
            samples,
            element_nums,
            cur_sample: 0,
            cur_elem: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Cursor;

    #[test]
    fn page_mode_lookup() {
        // rate 2, two samples at offsets {0, 8192} with elements {0, 500}
        let mut sampling = Sampling::new_page(2, 0);
        sampling.page_size = 4096;
        sampling.add_sample(8192, 500);

        assert_eq!(sampling.get_page(400), (0, 0));
        assert_eq!(sampling.get_page(500), (500, 8192));
        assert_eq!(sampling.get_page(900), (500, 8192));
        assert_eq!(sampling.get_page(0), (0, 0));
    }

    #[test]
    fn regular_mode_lookup() {
        let mut sampling = Sampling::new_regular(10, 0);
        sampling.page_size = 4096;
        sampling.add_sample(4096, 10);
        sampling.add_sample(8192, 20);

        assert_eq!(sampling.get_page(0), (0, 0));
        assert_eq!(sampling.get_page(9), (0, 0));
        assert_eq!(sampling.get_page(10), (10, 4096));
        assert_eq!(sampling.get_page(19), (10, 4096));
        assert_eq!(sampling.get_page(25), (20, 8192));
        // beyond the last sample the last one still covers
        assert_eq!(sampling.get_page(99), (20, 8192));
    }

    #[test]
    fn sequential_cursor() {
        let mut sampling = Sampling::new_page(1, 0);
        sampling.page_size = 4096;
        sampling.add_sample(4096, 7);
        sampling.add_sample(12288, 21);

        assert_eq!(sampling.peek_next_element(), Some(7));
        assert_eq!(sampling.advance_sample(), Some((7, 4096)));
        assert_eq!(sampling.peek_next_element(), Some(21));
        assert_eq!(sampling.advance_sample(), Some((21, 12288)));
        assert_eq!(sampling.peek_next_element(), None);
        assert_eq!(sampling.advance_sample(), None);

        sampling.rewind();
        assert_eq!(sampling.peek_next_element(), Some(7));

        // get_page repositions the cursor
        sampling.get_page(30);
        assert_eq!(sampling.peek_next_element(), None);
    }

    #[test]
    fn next_sample_predicate() {
        let regular = Sampling::new_regular(16, 0);
        assert!(!regular.is_next_sample(100, 15, 10, 10_000));
        assert!(regular.is_next_sample(0, 16, 10, 10_000));

        let page = Sampling::new_page(2, 0);
        // not enough pages yet
        assert!(!page.is_next_sample(1, 1_000, 100, 10));
        // enough pages but the element still fits in the page
        assert!(!page.is_next_sample(2, 1_000, 100, 200));
        // page boundary straddle
        assert!(page.is_next_sample(2, 1_000, 100, 99));
    }

    #[test]
    fn serialization_round_trip() {
        let mut page = Sampling::new_page(3, 0);
        page.page_size = 4096;
        page.add_sample(4096, 11);
        page.add_sample(20480, 47);

        let mut cursor = Cursor::new(Vec::new());
        page.write_to(&mut cursor).unwrap();
        cursor.set_position(0);
        let mut read = Sampling::read_from(&mut cursor).unwrap();
        assert!(!read.is_regular());
        assert_eq!(read.rate(), 3);
        assert_eq!(read.num_of_samples(), 3);
        assert_eq!(read.get_page(46), (11, 4096));

        let mut regular = Sampling::new_regular(5, 0);
        regular.page_size = 4096;
        regular.add_sample(8192, 5);
        let mut cursor = Cursor::new(Vec::new());
        regular.write_to(&mut cursor).unwrap();
        cursor.set_position(0);
        let mut read = Sampling::read_from(&mut cursor).unwrap();
        assert!(read.is_regular());
        assert_eq!(read.get_page(7), (5, 8192));
    }

    #[test]
    fn corrupt_tables_are_rejected() {
        // sample offsets out of order
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&2u64).unwrap();
        cursor.write_le(&METHOD_REGULAR).unwrap();
        cursor.write_le(&4u64).unwrap();
        cursor.write_le(&8192u64).unwrap();
        cursor.write_le(&4096u64).unwrap();
        cursor.set_position(0);
        assert!(matches!(
            Sampling::read_from(&mut cursor),
            Err(FqPackError::Inconsistent(_))
        ));

        // unknown method byte
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&1u64).unwrap();
        cursor.write_le(&7u8).unwrap();
        cursor.write_le(&4u64).unwrap();
        cursor.write_le(&0u64).unwrap();
        cursor.set_position(0);
        assert!(matches!(
            Sampling::read_from(&mut cursor),
            Err(FqPackError::Inconsistent(_))
        ));
    }
}
