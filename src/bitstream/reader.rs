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

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::{FqPackError, Word, WORD_BITS, WORD_BYTES};

/// Presents a file as a sequence of bits starting at a page-aligned offset.
///
/// A window of `pages_to_map` pages is mapped at a time; when the cursor
/// walks off the end of the window and the file has more data, the window is
/// remapped one full span forward. The caller is responsible for knowing how
/// many bits are meaningful (trailing padding is recorded in the producing
/// archive's header).
pub struct BitReader {
    path: PathBuf,
    file_len: u64,
    page_size: u64,
    span: u64,
    window_offset: u64,
    window_len: usize,
    num_words: usize,
    map: Option<Mmap>,
    cur_word: usize,
    cur_bit: u32,
}

impl BitReader {
    /// Map `pages_to_map` pages of `path` starting at `offset`, which must
    /// be a multiple of the page size.
    pub fn new(path: &Path, offset: u64, pages_to_map: u64) -> Result<Self, FqPackError> {
        let page_size = crate::page_size();
        let file_len = std::fs::metadata(path)?.len();
        let mut pages = pages_to_map.max(1);
        if file_len < pages * page_size {
            pages = file_len / page_size + 1;
        }
        let mut reader = BitReader {
            path: path.to_path_buf(),
            file_len,
            page_size,
            span: pages * page_size,
            window_offset: 0,
            window_len: 0,
            num_words: 0,
            map: None,
            cur_word: 0,
            cur_bit: 0,
        };
        reader.reinit(offset)?;
        Ok(reader)
    }

    /// Drop the current window and remap starting at `offset` (page-aligned).
    /// The cursor resets to the first bit of the new window.
    pub fn reinit(&mut self, offset: u64) -> Result<(), FqPackError> {
        debug_assert!(offset % self.page_size == 0, "window offset must be page-aligned");
        if offset >= self.file_len {
            return Err(FqPackError::Inconsistent(format!(
                "window offset {} beyond end of file ({} bytes)",
                offset, self.file_len
            )));
        }
        let len = (self.file_len - offset).min(self.span) as usize;
        let file = File::open(&self.path)?;
        // SAFETY: the mapping is read-only and lives as long as self.
        let map = unsafe { MmapOptions::new().offset(offset).len(len).map(&file)? };
        self.map = Some(map);
        self.window_offset = offset;
        self.window_len = len;
        self.num_words = len.div_ceil(WORD_BYTES);
        self.cur_word = 0;
        self.cur_bit = 0;
        Ok(())
    }

    fn word_at(&self, idx: usize) -> Word {
        let data = self.map.as_ref().expect("window is mapped");
        let start = idx * WORD_BYTES;
        let end = (start + WORD_BYTES).min(self.window_len);
        let mut buf = [0u8; WORD_BYTES];
        buf[..end - start].copy_from_slice(&data[start..end]);
        Word::from_le_bytes(buf)
    }

    /// The next bit, or `None` when the file is exhausted. Remaps forward
    /// transparently at window boundaries.
    pub fn next_bit(&mut self) -> Result<Option<bool>, FqPackError> {
        if self.cur_bit == WORD_BITS {
            if self.cur_word + 1 < self.num_words {
                self.cur_word += 1;
                self.cur_bit = 0;
            }
            else if self.window_offset + self.span >= self.file_len {
                return Ok(None);
            }
            else {
                self.reinit(self.window_offset + self.span)?;
            }
        }
        if self.num_words == 0 {
            return Ok(None);
        }
        let word = self.word_at(self.cur_word);
        let bit = (word >> (WORD_BITS - 1 - self.cur_bit)) & 1 == 1;
        self.cur_bit += 1;
        Ok(Some(bit))
    }

    /// Read `count` bits MSB-first into the low bits of the result. Fails
    /// with [`FqPackError::TruncatedStream`] if the file ends first.
    pub fn read_bits(&mut self, count: u32) -> Result<Word, FqPackError> {
        debug_assert!(count <= WORD_BITS);
        let mut value: Word = 0;
        for _ in 0..count {
            let bit = self.next_bit()?.ok_or(FqPackError::TruncatedStream)?;
            value = (value << 1) | Word::from(bit);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitWriter;
    use crate::io::Write;
    use std::fs::OpenOptions;

    fn scratch_file(name: &str) -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        // Keep the directory alive for the duration of the test process.
        let path = dir.path().join(name);
        std::mem::forget(dir);
        path
    }

    #[test]
    fn round_trips_written_codes() {
        let path = scratch_file("roundtrip.bits");
        let codes: Vec<(Word, u32)> = vec![
            (0b1, 1),
            (0b010, 3),
            (0b1111_1111, 8),
            (0x0123_4567_89AB_CDEF, 64),
            (0b0, 1),
            (0x7FFF, 15),
        ];
        let total_bits: u32 = codes.iter().map(|&(_, l)| l).sum();

        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&path).unwrap();
        let mut writer = BitWriter::new(&mut file);
        for &(code, len) in &codes {
            writer.append(code, len).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);
        file.flush().unwrap();

        let mut expected = Vec::new();
        for &(code, len) in &codes {
            for i in (0..len).rev() {
                expected.push((code >> i) & 1 == 1);
            }
        }

        let mut reader = BitReader::new(&path, 0, 2).unwrap();
        for (i, &bit) in expected.iter().enumerate() {
            assert_eq!(reader.next_bit().unwrap(), Some(bit), "bit {i}");
        }
        // zero padding up to the flushed word boundary, then EOF
        let mut trailing = 0;
        while let Some(bit) = reader.next_bit().unwrap() {
            assert!(!bit);
            trailing += 1;
        }
        assert_eq!(total_bits, 92);
        assert_eq!(total_bits + trailing, 128);
    }

    #[test]
    fn remaps_across_windows() {
        let path = scratch_file("windows.bits");
        let page = crate::page_size();
        let words_per_page = page as usize / WORD_BYTES;

        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&path).unwrap();
        let mut writer = BitWriter::new(&mut file);
        // two and a half pages of counter words
        let num_words = words_per_page * 5 / 2;
        for i in 0..num_words {
            writer.append(i as Word, WORD_BITS).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);
        file.flush().unwrap();

        // map a single page at a time to force remapping
        let mut reader = BitReader::new(&path, 0, 1).unwrap();
        for i in 0..num_words {
            assert_eq!(reader.read_bits(WORD_BITS).unwrap(), i as Word, "word {i}");
        }

        // reinit into the second page reads the same data at an offset
        reader.reinit(page).unwrap();
        assert_eq!(reader.read_bits(WORD_BITS).unwrap(), words_per_page as Word);
    }

    #[test]
    fn read_bits_reports_truncation() {
        let path = scratch_file("truncated.bits");
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&path).unwrap();
        let mut writer = BitWriter::new(&mut file);
        writer.append(0xAB, 8).unwrap();
        writer.flush().unwrap();
        drop(writer);
        file.flush().unwrap();

        let mut reader = BitReader::new(&path, 0, 1).unwrap();
        assert_eq!(reader.read_bits(WORD_BITS).unwrap(), 0xAB << (WORD_BITS - 8));
        assert!(matches!(reader.read_bits(1), Err(FqPackError::TruncatedStream)));
    }

    #[test]
    fn rejects_offsets_beyond_eof() {
        let path = scratch_file("short.bits");
        std::fs::write(&path, [0u8; 16]).unwrap();
        assert!(matches!(
            BitReader::new(&path, crate::page_size(), 1),
            Err(FqPackError::Inconsistent(_))
        ));
    }
}
