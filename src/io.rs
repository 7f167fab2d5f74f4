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

//! The `io` module re-exports the std::io types the rest of the crate builds
//! on, and provides the header-placeholder helper used to patch offsets that
//! are only known after the encoding pass.

pub use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use binrw::BinWriterExt;

use crate::FqPackError;

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A reserved slot in an archive header.
///
/// Some header fields (the sampling-table offset in particular) are only
/// known once the encoding pass has finished. `HeaderPlaceholder` records the
/// slot position at header-write time and patches the real value in
/// afterwards with a single seek.
pub(crate) struct HeaderPlaceholder {
    pos: u64,
}

impl HeaderPlaceholder {
    /// Write a zeroed `i64` slot at the current position and remember where
    /// it is.
    pub(crate) fn reserve<W: Write + Seek>(writer: &mut W) -> Result<Self, FqPackError> {
        let pos = writer.stream_position()?;
        writer.write_le(&0i64)?;
        Ok(HeaderPlaceholder { pos })
    }

    /// Overwrite the reserved slot with `value`, restoring the stream
    /// position afterwards.
    pub(crate) fn patch<W: Write + Seek>(self, writer: &mut W, value: i64) -> Result<(), FqPackError> {
        let saved = writer.stream_position()?;
        writer.seek(SeekFrom::Start(self.pos))?;
        writer.write_le(&value)?;
        writer.seek(SeekFrom::Start(saved))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_patches_in_place() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&0xAAu8).unwrap();
        let slot = HeaderPlaceholder::reserve(&mut cursor).unwrap();
        cursor.write_le(&0xBBu8).unwrap();
        slot.patch(&mut cursor, -12345).unwrap();

        assert_eq!(cursor.stream_position().unwrap(), 10);
        let data = cursor.into_inner();
        assert_eq!(data[0], 0xAA);
        assert_eq!(i64::from_le_bytes(data[1..9].try_into().unwrap()), -12345);
        assert_eq!(data[9], 0xBB);
    }
}
