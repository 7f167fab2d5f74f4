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

//! Input iteration contracts.
//!
//! FASTA/FASTQ parsing is not fqpack's concern. Encoders consume these two
//! resettable iterator traits; the analyzers walk the input twice, so a
//! source must be able to rewind. In-memory implementations over slices are
//! provided for tests and for callers that already hold parsed records.

use crate::FqPackError;

/// A resettable stream of description lines.
pub trait DescSource {
    /// The next description, or `None` at the end of the input.
    fn next_desc(&mut self) -> Result<Option<&str>, FqPackError>;

    /// Rewind to the first description.
    fn reset(&mut self) -> Result<(), FqPackError>;
}

/// A resettable stream of (sequence, qualities) records from one input file.
/// Both slices of a record must have the same length.
pub trait ReadSource {
    /// The next read, or `None` at the end of the input.
    fn next_read(&mut self) -> Result<Option<(&[u8], &[u8])>, FqPackError>;

    /// Rewind to the first read.
    fn reset(&mut self) -> Result<(), FqPackError>;
}

/// In-memory [`DescSource`] over owned strings.
pub struct SliceDescSource {
    descs: Vec<String>,
    pos: usize,
}

impl SliceDescSource {
    pub fn new<S: Into<String>>(descs: impl IntoIterator<Item = S>) -> Self {
        SliceDescSource {
            descs: descs.into_iter().map(Into::into).collect(),
            pos: 0,
        }
    }
}

impl DescSource for SliceDescSource {
    fn next_desc(&mut self) -> Result<Option<&str>, FqPackError> {
        if self.pos < self.descs.len() {
            self.pos += 1;
            Ok(Some(&self.descs[self.pos - 1]))
        }
        else {
            Ok(None)
        }
    }

    fn reset(&mut self) -> Result<(), FqPackError> {
        self.pos = 0;
        Ok(())
    }
}

/// In-memory [`ReadSource`] over owned (sequence, qualities) pairs.
pub struct SliceReadSource {
    reads: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

impl SliceReadSource {
    pub fn new(reads: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        SliceReadSource { reads, pos: 0 }
    }

    /// Convenience constructor from `(seq, qual)` string pairs.
    pub fn from_strs(reads: &[(&str, &str)]) -> Self {
        SliceReadSource::new(
            reads
                .iter()
                .map(|(s, q)| (s.as_bytes().to_vec(), q.as_bytes().to_vec()))
                .collect(),
        )
    }
}

impl ReadSource for SliceReadSource {
    fn next_read(&mut self) -> Result<Option<(&[u8], &[u8])>, FqPackError> {
        if self.pos < self.reads.len() {
            self.pos += 1;
            let (seq, qual) = &self.reads[self.pos - 1];
            Ok(Some((seq, qual)))
        }
        else {
            Ok(None)
        }
    }

    fn reset(&mut self) -> Result<(), FqPackError> {
        self.pos = 0;
        Ok(())
    }
}
