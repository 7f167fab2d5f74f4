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

use crate::huffman::ChunkSource;
use crate::{FqPackError, Word, WORD_BYTES};

/// Pages mapped per chunk while streaming the read payload.
const PAGES_PER_CHUNK: u64 = 10;

/// [`ChunkSource`] over the encoded region of a read archive: maps
/// `PAGES_PER_CHUNK` pages at a time between `start` (page-aligned) and
/// `end` (the sampling table). Repositionable to any sampled page.
pub(crate) struct MmapChunkSource {
    path: PathBuf,
    file_len: u64,
    start: u64,
    end: u64,
    pos: u64,
    block_size: u64,
    map: Option<Mmap>,
    valid_words: usize,
}

impl MmapChunkSource {
    pub(crate) fn new(path: &Path, start: u64, end: u64) -> Result<Self, FqPackError> {
        let page_size = crate::page_size();
        let file_len = std::fs::metadata(path)?.len();
        debug_assert!(start % page_size == 0);
        debug_assert!((end - start) % WORD_BYTES as u64 == 0);
        if end > file_len || start > end {
            return Err(FqPackError::Inconsistent(format!(
                "encoded region {start}..{end} outside file of {file_len} bytes"
            )));
        }
        Ok(MmapChunkSource {
            path: path.to_path_buf(),
            file_len,
            start,
            end,
            pos: start,
            block_size: page_size * PAGES_PER_CHUNK,
            map: None,
            valid_words: 0,
        })
    }

    /// Continue from `pos` (a sampled, page-aligned offset) at the next
    /// `advance`.
    pub(crate) fn seek(&mut self, pos: u64) {
        debug_assert!(self.start <= pos && pos < self.end);
        debug_assert!(pos % crate::page_size() == 0);
        log::trace!("data iterator reset to offset {pos}");
        self.map = None;
        self.valid_words = 0;
        self.pos = pos;
    }

    pub(crate) fn reset(&mut self) {
        let start = self.start;
        self.seek(start);
    }
}

impl ChunkSource for MmapChunkSource {
    fn advance(&mut self) -> Result<bool, FqPackError> {
        if self.pos >= self.end {
            self.map = None;
            self.valid_words = 0;
            return Ok(false);
        }
        let map_len = self.block_size.min(self.file_len - self.pos);
        let data_len = self.block_size.min(self.end - self.pos);
        let file = File::open(&self.path)?;
        // SAFETY: read-only mapping of a file we do not mutate.
        let map = unsafe {
            MmapOptions::new()
                .offset(self.pos)
                .len(map_len as usize)
                .map(&file)?
        };
        self.map = Some(map);
        self.valid_words = data_len as usize / WORD_BYTES;
        self.pos += self.block_size;
        Ok(true)
    }

    fn words(&self) -> &[Word] {
        match &self.map {
            None => &[],
            Some(map) => bytemuck::cast_slice(&map[..self.valid_words * WORD_BYTES]),
        }
    }

    fn pad_bits(&self) -> u32 {
        // the payload always ends on a word boundary; symbol counts from the
        // file table bound what the decoder actually consumes
        0
    }
}
