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

use bit_vec::BitVec;

use crate::io::{Seek, SeekFrom, Write};
use crate::{next_page_boundary, FqPackError, Word, WORD_BITS};

/// Appends variable-length codes to a byte sink, packing them MSB-first into
/// [`Word`]s written little-endian.
///
/// Between operations the high `WORD_BITS - bits_left` bits of the buffer
/// hold the next unwritten code bits and the low `bits_left` bits are zero.
pub struct BitWriter<S: Write + Seek> {
    sink: S,
    buffer: Word,
    bits_left: u32,
    written_bits: u64,
    page_size: u64,
}

impl<S: Write + Seek> BitWriter<S> {
    pub fn new(sink: S) -> Self {
        BitWriter {
            sink,
            buffer: 0,
            bits_left: WORD_BITS,
            written_bits: 0,
            page_size: crate::page_size(),
        }
    }

    fn emit_buffer(&mut self) -> Result<(), FqPackError> {
        self.sink.write_all(&self.buffer.to_le_bytes())?;
        Ok(())
    }

    /// Append the low `bits` bits of `code`, most significant first.
    pub fn append(&mut self, code: Word, bits: u32) -> Result<(), FqPackError> {
        debug_assert!(bits <= WORD_BITS);
        debug_assert!(bits == WORD_BITS || code >> bits == 0, "code wider than bit count");
        if bits == 0 {
            return Ok(());
        }
        if self.bits_left < bits {
            let overhang = bits - self.bits_left;
            self.buffer |= code.checked_shr(overhang).unwrap_or(0);
            self.emit_buffer()?;
            self.buffer = 0;
            self.bits_left = WORD_BITS - overhang;
            self.written_bits += WORD_BITS as u64;
        }
        else {
            self.bits_left -= bits;
        }
        self.buffer |= code.checked_shl(self.bits_left).unwrap_or(0);
        Ok(())
    }

    /// Append every bit of `tab` in index order.
    pub fn append_bittab(&mut self, tab: &BitVec) -> Result<(), FqPackError> {
        for bit in tab.iter() {
            if self.bits_left == 0 {
                self.emit_buffer()?;
                self.buffer = 0;
                self.bits_left = WORD_BITS;
                self.written_bits += WORD_BITS as u64;
            }
            self.bits_left -= 1;
            if bit {
                self.buffer |= (1 as Word) << self.bits_left;
            }
        }
        Ok(())
    }

    /// Write the pending word, zero-padded in its low bits. Only the used
    /// bits count towards `written_bits`.
    pub fn flush(&mut self) -> Result<(), FqPackError> {
        self.emit_buffer()?;
        self.written_bits += (WORD_BITS - self.bits_left) as u64;
        self.buffer = 0;
        self.bits_left = WORD_BITS;
        Ok(())
    }

    /// [`flush`](Self::flush), then move the sink to the next page boundary
    /// if it is not already on one. Afterwards [`pos`](Self::pos) is always a
    /// multiple of the page size.
    pub fn flush_advance(&mut self) -> Result<(), FqPackError> {
        self.flush()?;
        let pos = self.sink.stream_position()?;
        if pos % self.page_size != 0 {
            self.sink.seek(SeekFrom::Start(next_page_boundary(pos, self.page_size)))?;
        }
        Ok(())
    }

    /// Byte offset of the sink. Call [`flush`](Self::flush) first for a
    /// value that accounts for all appended bits.
    pub fn pos(&mut self) -> Result<u64, FqPackError> {
        Ok(self.sink.stream_position()?)
    }

    /// Total bits emitted through full words and flushes so far.
    pub fn written_bits(&self) -> u64 {
        self.written_bits
    }

    /// Consume the writer and hand the sink back. Pending unflushed bits are
    /// dropped; call [`flush`](Self::flush) first.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Cursor;

    fn words_of(data: &[u8]) -> Vec<Word> {
        data.chunks(8)
            .map(|c| {
                let mut buf = [0u8; 8];
                buf[..c.len()].copy_from_slice(c);
                Word::from_le_bytes(buf)
            })
            .collect()
    }

    #[test]
    fn packs_codes_msb_first() {
        let mut writer = BitWriter::new(Cursor::new(Vec::new()));
        // 1 + 0 1 1 + 0 0 0 0 0 1 0 1 = 0b1011_000001_01...
        writer.append(0b1, 1).unwrap();
        writer.append(0b011, 3).unwrap();
        writer.append(0b000001_01, 8).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.written_bits(), 12);

        let data = writer.sink.into_inner();
        assert_eq!(data.len(), 8);
        let word = words_of(&data)[0];
        assert_eq!(word >> (WORD_BITS - 12), 0b1011_0000_0101);
        assert_eq!(word & ((1 << (WORD_BITS - 12)) - 1), 0);
    }

    #[test]
    fn splits_codes_across_words() {
        let mut writer = BitWriter::new(Cursor::new(Vec::new()));
        // 60 zero bits, then an 8-bit code straddling the word boundary.
        writer.append(0, 60).unwrap();
        writer.append(0b1111_0001, 8).unwrap();
        writer.flush().unwrap();

        assert_eq!(writer.written_bits(), 68);
        let data = writer.sink.into_inner();
        let words = words_of(&data);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0] & 0xF, 0b1111);
        assert_eq!(words[1] >> (WORD_BITS - 4), 0b0001);
    }

    #[test]
    fn full_width_codes() {
        let mut writer = BitWriter::new(Cursor::new(Vec::new()));
        writer.append(0xDEAD_BEEF_0123_4567, WORD_BITS).unwrap();
        writer.append(0xFFFF_0000_FFFF_0000, WORD_BITS).unwrap();
        writer.flush().unwrap();
        let words = words_of(&writer.sink.into_inner());
        assert_eq!(words[0], 0xDEAD_BEEF_0123_4567);
        assert_eq!(words[1], 0xFFFF_0000_FFFF_0000);
    }

    #[test]
    fn bittab_appends_bitwise() {
        let mut tab = BitVec::from_elem(10, false);
        tab.set(0, true);
        tab.set(3, true);
        tab.set(9, true);
        let mut writer = BitWriter::new(Cursor::new(Vec::new()));
        writer.append_bittab(&tab).unwrap();
        writer.flush().unwrap();
        let word = words_of(&writer.sink.into_inner())[0];
        assert_eq!(word >> (WORD_BITS - 10), 0b1001000001);
    }

    #[test]
    fn flush_advance_lands_on_page_boundary() {
        let mut writer = BitWriter::new(Cursor::new(Vec::new()));
        let page = crate::page_size();
        writer.append(0b101, 3).unwrap();
        writer.flush_advance().unwrap();
        assert_eq!(writer.pos().unwrap() % page, 0);
        assert_eq!(writer.pos().unwrap(), page);
        // flush always emits one word, so a second advance lands on the
        // following page
        writer.flush_advance().unwrap();
        assert_eq!(writer.pos().unwrap(), 2 * page);
    }
}
