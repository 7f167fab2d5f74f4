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

//! # fqpack
//!
//! fqpack is a Rust library for compressing FASTQ short-read archives. Each
//! (base, quality) pair of a read is treated as one symbol of a joint
//! alphabet and Huffman coded; description lines are compressed separately
//! by a structural coder that discovers constant, numeric, and free-text
//! fields. Both payloads carry a page-aligned sampling index, so any read or
//! description can be decoded by mapping at most one sampled page and
//! decoding forward.
//!
//! The main interfaces are [`reads::ReadEncoder`] / [`reads::ReadDecoder`]
//! for the sequence+quality payload and [`desc::DescEncoder`] /
//! [`desc::DescDecoder`] for description lines. Input parsing is left to the
//! caller, who supplies [`sources::ReadSource`] / [`sources::DescSource`]
//! iterators.

pub mod alphabet;
pub mod bitstream;
pub mod desc;
pub mod huffman;
mod io;
pub mod rbtree;
pub mod reads;
pub mod sampling;
pub mod sources;

mod distribution;

pub use distribution::Histogram;

use thiserror::Error;

/// The bit-packing unit of the encoded payload. Codes are packed MSB-first
/// into words of this width; words are stored little-endian on disk.
pub type Word = u64;

/// Width of [`Word`] in bits.
pub const WORD_BITS: u32 = Word::BITS;

/// Width of [`Word`] in bytes.
pub const WORD_BYTES: usize = (Word::BITS / 8) as usize;

#[derive(Debug, Error)]
pub enum FqPackError {
    #[error("an IO error occurred reading or writing the archive: {0}")]
    Io(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("compressed stream ended in the middle of a symbol")]
    TruncatedStream,
    #[error("requested element {0} is beyond the archive ({1} elements)")]
    OutOfRange(u64, u64),
    #[error("the input contained no records, there is nothing to compress")]
    EmptyInput,
    #[error("archive is inconsistent: {0}")]
    Inconsistent(String),
}

impl From<std::io::Error> for FqPackError {
    fn from(err: std::io::Error) -> Self {
        FqPackError::Io(err.to_string())
    }
}

impl From<binrw::Error> for FqPackError {
    fn from(err: binrw::Error) -> Self {
        FqPackError::Io(err.to_string())
    }
}

/// The operating system's virtual-memory page size. Sampled offsets are
/// multiples of this, which lets decoders map windows starting at any sample.
#[cfg(unix)]
pub fn page_size() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 {
        4096
    }
    else {
        sz as u64
    }
}

#[cfg(not(unix))]
pub fn page_size() -> u64 {
    4096
}

/// Round `pos` up to the next multiple of `page_size` (identity if already
/// aligned).
pub(crate) fn next_page_boundary(pos: u64, page_size: u64) -> u64 {
    if pos % page_size == 0 {
        pos
    }
    else {
        (pos / page_size + 1) * page_size
    }
}

/// Number of binary digits needed to express `value`; 1 for zero. This is
/// the bit width used for verbatim numeric ranges, field lengths and field
/// counts.
pub(crate) fn bits_for(value: u64) -> u32 {
    if value == 0 {
        1
    }
    else {
        u64::BITS - value.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_widths() {
        assert_eq!(bits_for(0), 1);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 2);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(4), 3);
        assert_eq!(bits_for(255), 8);
        assert_eq!(bits_for(256), 9);
    }

    #[test]
    fn page_rounding() {
        assert_eq!(next_page_boundary(0, 4096), 0);
        assert_eq!(next_page_boundary(1, 4096), 4096);
        assert_eq!(next_page_boundary(4096, 4096), 4096);
        assert_eq!(next_page_boundary(4097, 4096), 8192);
    }
}
