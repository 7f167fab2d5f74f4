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

//! Character/code translation for sequence data.
//!
//! The read compressor is agnostic to the biological alphabet; it only needs
//! a bidirectional mapping between sequence characters and small contiguous
//! codes plus a wildcard sentinel. Callers with custom alphabets implement
//! [`Alphabet`]; [`DnaAlphabet`] covers the common case.

/// Sentinel code for characters the alphabet does not know. The read
/// compressor reindexes it to the last code of the alphabet so the joint
/// symbol space stays contiguous.
pub const WILDCARD: u8 = u8::MAX;

pub trait Alphabet {
    /// Number of character codes, including the reserved wildcard slot.
    fn size(&self) -> u32;

    /// Translate a sequence character to its code, or [`WILDCARD`] if the
    /// character is not part of the alphabet.
    fn encode(&self, ch: u8) -> u8;

    /// Translate a code (including the wildcard slot `size() - 1`) back to
    /// its display character.
    fn decode(&self, code: u8) -> u8;
}

/// The standard nucleotide alphabet: `A`, `C`, `G`, `T` (case-insensitive,
/// `U` accepted for `T`) plus a wildcard slot displayed as `N`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnaAlphabet;

impl Alphabet for DnaAlphabet {
    fn size(&self) -> u32 {
        5
    }

    fn encode(&self, ch: u8) -> u8 {
        match ch.to_ascii_uppercase() {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' | b'U' => 3,
            _ => WILDCARD,
        }
    }

    fn decode(&self, code: u8) -> u8 {
        match code {
            0 => b'A',
            1 => b'C',
            2 => b'G',
            3 => b'T',
            _ => b'N',
        }
    }
}
