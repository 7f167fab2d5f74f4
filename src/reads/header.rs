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

//! Read-archive header records: the per-file table and the joint
//! (base, quality) distribution stored as Huffman leaves.

use binrw::{binrw, BinReaderExt, BinWriterExt};

use crate::io::{ReadSeek, Seek, Write};
use crate::FqPackError;

/// One input file's contribution: the running read total through this file
/// and the (uniform) read length within it.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub cumulative_reads: u64,
    pub read_length: u64,
}

/// One leaf of the joint code: the decoded base character, the quality
/// character (offset already applied), and its frequency.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct LeafRecord {
    pub base_char: u8,
    pub quality_char: u8,
    pub freq: u64,
}

#[binrw]
#[brw(little)]
struct FileTable {
    num_of_files: u64,
    #[br(count = num_of_files)]
    files: Vec<FileInfo>,
}

pub(crate) fn write_file_table<W: Write + Seek>(
    infos: &[FileInfo],
    writer: &mut W,
) -> Result<(), FqPackError> {
    writer.write_le(&FileTable {
        num_of_files: infos.len() as u64,
        files: infos.to_vec(),
    })?;
    Ok(())
}

pub(crate) fn read_file_table<R: ReadSeek>(reader: &mut R) -> Result<Vec<FileInfo>, FqPackError> {
    let table: FileTable = reader.read_le()?;
    if table.files.is_empty() {
        return Err(FqPackError::Inconsistent("archive lists no input files".into()));
    }
    if !table.files.windows(2).all(|w| w[0].cumulative_reads < w[1].cumulative_reads) {
        return Err(FqPackError::Inconsistent("file table read counts not increasing".into()));
    }
    Ok(table.files)
}

pub(crate) fn write_leaves<W: Write + Seek>(
    leaves: &[LeafRecord],
    writer: &mut W,
) -> Result<(), FqPackError> {
    writer.write_le(&(leaves.len() as u64))?;
    for leaf in leaves {
        writer.write_le(leaf)?;
    }
    Ok(())
}

pub(crate) fn read_leaves<R: ReadSeek>(reader: &mut R) -> Result<Vec<LeafRecord>, FqPackError> {
    let count: u64 = reader.read_le()?;
    if count == 0 {
        return Err(FqPackError::Inconsistent("archive has no coded symbols".into()));
    }
    let mut leaves = Vec::with_capacity(count as usize);
    for _ in 0..count {
        leaves.push(reader.read_le::<LeafRecord>()?);
    }
    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Cursor;

    #[test]
    fn tables_round_trip() {
        let infos = vec![
            FileInfo { cumulative_reads: 1, read_length: 5 },
            FileInfo { cumulative_reads: 3, read_length: 4 },
        ];
        let leaves = vec![
            LeafRecord { base_char: b'A', quality_char: b'!', freq: 10 },
            LeafRecord { base_char: b'N', quality_char: b'#', freq: 1 },
        ];
        let mut cursor = Cursor::new(Vec::new());
        write_file_table(&infos, &mut cursor).unwrap();
        write_leaves(&leaves, &mut cursor).unwrap();

        cursor.set_position(0);
        assert_eq!(read_file_table(&mut cursor).unwrap(), infos);
        let read = read_leaves(&mut cursor).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].base_char, b'A');
        assert_eq!(read[1].freq, 1);
    }

    #[test]
    fn unordered_file_table_is_rejected() {
        let infos = vec![
            FileInfo { cumulative_reads: 3, read_length: 5 },
            FileInfo { cumulative_reads: 3, read_length: 4 },
        ];
        let mut cursor = Cursor::new(Vec::new());
        write_file_table(&infos, &mut cursor).unwrap();
        cursor.set_position(0);
        assert!(matches!(
            read_file_table(&mut cursor),
            Err(FqPackError::Inconsistent(_))
        ));
    }
}
