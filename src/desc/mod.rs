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

//! The description compressor.
//!
//! A corpus of description lines is analyzed into per-field strategies
//! (constant, numeric with optional delta/Huffman coding, per-column text),
//! then encoded into a header plus a bitstream. Numeric fields at sampled
//! descriptions store absolute values, so a decoder can restart cold at any
//! sample.

pub(crate) mod analyze;
mod header;

use std::fs::File;
use std::path::Path;

use analyze::{
    count_leading_zeros, init_huffman, parse_int, walk_fields, Analysis, DescField,
    FieldStrategy,
};

use crate::bitstream::{BitReader, BitWriter};
use crate::huffman::{BitwiseDecoder, HuffCode, Huffman};
use crate::io::{Seek, SeekFrom, Write};
use crate::sampling::{Sampling, SamplingConfig};
use crate::sources::DescSource;
use crate::FqPackError;

/// Windows mapped at a time while decoding.
const PAGES_TO_MAP: u64 = 5;

/// Encodes a corpus of description lines into a random-access archive.
#[derive(Debug, Default, Clone)]
pub struct DescEncoder {
    sampling: SamplingConfig,
}

struct PreparedDesc {
    codes: Vec<HuffCode>,
    total_bits: u64,
}

impl PreparedDesc {
    fn push(&mut self, code: u64, length: u32) {
        debug_assert!(length == 64 || code >> length == 0);
        self.codes.push(HuffCode { code, length });
        self.total_bits += length as u64;
    }
}

/// Translate one description into its codes. `sampled` selects absolute
/// numeric values instead of deltas. Updates each numeric field's running
/// previous value.
fn prepare_desc(
    fields: &mut [DescField],
    num_of_fields_is_const: bool,
    bits_per_field: u32,
    field_count: u64,
    desc: &[u8],
    cur_desc: u64,
    sampled: bool,
) -> Result<PreparedDesc, FqPackError> {
    let mut prepared = PreparedDesc {
        codes: Vec::new(),
        total_bits: 0,
    };
    if !num_of_fields_is_const {
        prepared.push(field_count, bits_per_field);
    }

    let seps: Vec<u8> = fields.iter().map(|f| f.sep).collect();
    let mut failure: Option<FqPackError> = None;
    walk_fields(desc, &seps, |idx, token| {
        if failure.is_some() {
            return;
        }
        let field = &mut fields[idx];
        match &mut field.strategy {
            FieldStrategy::Constant => {}
            FieldStrategy::Numeric(num) => {
                let Some(value) = parse_int(token) else {
                    failure = Some(FqPackError::InvalidInput(format!(
                        "non-numeric token {:?} in numeric field {idx}",
                        String::from_utf8_lossy(token)
                    )));
                    return;
                };
                if num.has_zero_padding && !field.fieldlen_is_const {
                    let zero_count = count_leading_zeros(token);
                    let code = num
                        .huffman_zero
                        .as_ref()
                        .expect("zero-count coder initialized")
                        .encode(zero_count as u64);
                    prepared.push(code.code, code.length);
                }
                if cur_desc == 0 || sampled {
                    let to_store = value.wrapping_sub(num.min_value) as u64;
                    prepared.push(to_store, num.bits_per_value);
                }
                else if !num.is_value_const || !num.is_delta_const {
                    let to_store = if num.use_delta_coding {
                        value.wrapping_sub(num.prev_value).wrapping_sub(num.min_delta) as u64
                    }
                    else {
                        value.wrapping_sub(num.min_value) as u64
                    };
                    if num.use_hc {
                        let code = num
                            .huffman_num
                            .as_ref()
                            .expect("numeric coder initialized")
                            .encode(to_store);
                        prepared.push(code.code, code.length);
                    }
                    else {
                        prepared.push(to_store, num.bits_per_num);
                    }
                }
                num.prev_value = value;
            }
            FieldStrategy::Text(text) => {
                if !field.fieldlen_is_const {
                    prepared.push(token.len() as u64 - field.min_len, field.bits_per_len);
                }
                for (k, &ch) in token.iter().enumerate() {
                    let covered = (k as u64) < field.len && text.bittab.get(k).unwrap_or(false);
                    if !covered {
                        let code = text.coders[k]
                            .as_ref()
                            .expect("column coder initialized")
                            .encode(ch as u64);
                        prepared.push(code.code, code.length);
                    }
                }
            }
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(prepared),
    }
}

impl DescEncoder {
    pub fn new() -> Self {
        DescEncoder {
            sampling: SamplingConfig::None,
        }
    }

    pub fn with_sampling(sampling: SamplingConfig) -> Self {
        DescEncoder { sampling }
    }

    pub fn set_sampling(&mut self, sampling: SamplingConfig) {
        self.sampling = sampling;
    }

    pub fn sampling(&self) -> SamplingConfig {
        self.sampling
    }

    /// Analyze `source` (two passes) and write the archive to `out`.
    pub fn encode<S: DescSource, W: Write + Seek>(
        &self,
        source: &mut S,
        mut out: W,
    ) -> Result<(), FqPackError> {
        if let SamplingConfig::Regular(0) | SamplingConfig::Page(0) = self.sampling {
            return Err(FqPackError::InvalidInput("sampling rate must be nonzero".into()));
        }

        let mut analysis = analyze::analyze(source)?;
        let (samplingtab_slot, start_of_encoding) = header::write_header(&analysis, &mut out)?;
        init_huffman(&mut analysis.fields);

        let mut sampling = match self.sampling {
            SamplingConfig::None => None,
            SamplingConfig::Regular(rate) => Some(Sampling::new_regular(rate, start_of_encoding)),
            SamplingConfig::Page(rate) => Some(Sampling::new_page(rate, start_of_encoding)),
        };

        let start_of_samplingtab =
            write_encoding(&mut analysis, &mut sampling, source, &mut out)?;

        if sampling.is_some() {
            samplingtab_slot.patch(&mut out, start_of_samplingtab as i64)?;
        }
        log::debug!(
            "encoded {} descriptions, {} characters",
            analysis.num_of_descs,
            analysis.total_num_of_chars
        );
        Ok(())
    }
}

/// The encoding pass proper: walk the corpus once more, asking the sampling
/// index before each description whether to cut a page-aligned sample, and
/// append the prepared codes to the bitstream. Returns the byte offset the
/// sampling table was written at (the end of the encoded region).
fn write_encoding<S: DescSource, W: Write + Seek>(
    analysis: &mut Analysis,
    sampling: &mut Option<Sampling>,
    source: &mut S,
    out: &mut W,
) -> Result<u64, FqPackError> {
    let page_bits = crate::page_size() * 8;
    let mut bits_left_in_page = page_bits;
    let mut desc_counter = 0u64;
    let mut page_counter = 0u64;
    let mut cur_desc = 0u64;

    for field in analysis.fields.iter_mut() {
        if let FieldStrategy::Numeric(num) = &mut field.strategy {
            num.prev_value = 0;
        }
    }

    source.reset()?;
    let mut bitstream = BitWriter::new(&mut *out);
    loop {
        let desc = match source.next_desc()? {
            Some(desc) => desc.as_bytes().to_vec(),
            None => break,
        };
        let field_count = analysis.num_of_fields_tab[cur_desc as usize];
        let mut prepared = prepare_desc(
            &mut analysis.fields,
            analysis.num_of_fields_is_const,
            analysis.bits_per_field,
            field_count,
            &desc,
            cur_desc,
            false,
        )?;

        if let Some(sampling) = sampling.as_mut() {
            if sampling.is_next_sample(
                page_counter,
                desc_counter,
                prepared.total_bits,
                bits_left_in_page,
            ) {
                log::debug!("sampling at description {cur_desc}");
                // re-prepare with absolute numeric values
                prepared = prepare_desc(
                    &mut analysis.fields,
                    analysis.num_of_fields_is_const,
                    analysis.bits_per_field,
                    field_count,
                    &desc,
                    cur_desc,
                    true,
                )?;
                bitstream.flush_advance()?;
                sampling.add_sample(bitstream.pos()?, cur_desc);
                desc_counter = 0;
                page_counter = 0;
                bits_left_in_page = page_bits;
            }
        }

        let mut pending = prepared.total_bits;
        while bits_left_in_page < pending {
            page_counter += 1;
            pending -= bits_left_in_page;
            bits_left_in_page = page_bits;
        }
        bits_left_in_page -= pending;
        if page_counter == 0 {
            page_counter = 1;
        }
        desc_counter += 1;
        cur_desc += 1;

        for code in &prepared.codes {
            bitstream.append(code.code, code.length)?;
        }
    }

    bitstream.flush()?;
    let start_of_samplingtab = bitstream.pos()?;
    log::debug!("{} bits of description payload", bitstream.written_bits());
    drop(bitstream);

    if let Some(sampling) = sampling {
        sampling.write_to(out)?;
    }
    Ok(start_of_samplingtab)
}

/// Random-access reader over an encoded description archive.
pub struct DescDecoder {
    fields: Vec<DescField>,
    num_of_fields: u64,
    num_of_fields_is_const: bool,
    #[allow(dead_code)]
    num_of_fields_tab: Vec<u64>,
    bits_per_field: u32,
    num_of_descs: u64,
    total_num_of_chars: u64,
    start_of_encoding: u64,
    sampling: Option<Sampling>,
    reader: BitReader,
    cur_desc: u64,
    /// set after a random-access seek: the next description was encoded in
    /// sampled (absolute-value) mode
    pending_sampled: bool,
}

fn decode_symbol(reader: &mut BitReader, huffman: &Huffman) -> Result<u64, FqPackError> {
    let mut decoder = BitwiseDecoder::new(huffman);
    loop {
        let bit = reader.next_bit()?.ok_or(FqPackError::TruncatedStream)?;
        if let Some(symbol) = decoder.next(bit) {
            return Ok(symbol);
        }
    }
}

impl DescDecoder {
    /// Open an archive written by [`DescEncoder::encode`].
    pub fn open(path: &Path) -> Result<Self, FqPackError> {
        let mut file = File::open(path)?;
        let header = header::read_header(&mut file)?;
        let mut fields = header.fields;
        init_huffman(&mut fields);

        let sampling = if header.start_of_samplingtab != 0 {
            file.seek(SeekFrom::Start(header.start_of_samplingtab as u64))?;
            Some(Sampling::read_from(&mut file)?)
        }
        else {
            None
        };
        drop(file);

        let reader = BitReader::new(path, header.start_of_encoding as u64, PAGES_TO_MAP)?;
        Ok(DescDecoder {
            fields,
            num_of_fields: header.num_of_fields,
            num_of_fields_is_const: header.num_of_fields_is_const,
            num_of_fields_tab: header.num_of_fields_tab,
            bits_per_field: header.bits_per_field,
            num_of_descs: header.num_of_descs,
            total_num_of_chars: header.total_num_of_chars,
            start_of_encoding: header.start_of_encoding as u64,
            sampling,
            reader,
            cur_desc: 0,
            pending_sampled: false,
        })
    }

    pub fn num_of_descs(&self) -> u64 {
        self.num_of_descs
    }

    /// Total characters across all descriptions before compression.
    pub fn total_num_of_chars(&self) -> u64 {
        self.total_num_of_chars
    }

    /// Decode the description with index `num`.
    pub fn decode(&mut self, num: u64) -> Result<String, FqPackError> {
        if num >= self.num_of_descs {
            return Err(FqPackError::OutOfRange(num, self.num_of_descs));
        }

        if self.cur_desc != num {
            let descs_to_skip;
            if let Some(sampling) = self.sampling.as_mut() {
                let (nearest, position) = sampling.get_page(num);
                if nearest <= self.cur_desc && self.cur_desc <= num {
                    // already between the covering sample and the target
                    descs_to_skip = num - self.cur_desc;
                }
                else {
                    log::trace!("seek to sample {nearest} at offset {position}");
                    self.reader.reinit(position)?;
                    self.cur_desc = nearest;
                    // the description at the sample stores absolute values
                    self.pending_sampled = true;
                    descs_to_skip = num - nearest;
                }
            }
            else if self.cur_desc <= num {
                descs_to_skip = num - self.cur_desc;
            }
            else {
                self.reader.reinit(self.start_of_encoding)?;
                self.cur_desc = 0;
                descs_to_skip = num;
            }
            for _ in 0..descs_to_skip {
                self.next_desc(false)?;
            }
        }

        let bytes = self.next_desc(true)?.expect("collected description");
        String::from_utf8(bytes)
            .map_err(|_| FqPackError::InvalidInput("description is not valid UTF-8".into()))
    }

    /// Decode the next description in sequence. With `collect == false` the
    /// bits are consumed but no string is built (used to skip forward from
    /// a sample).
    fn next_desc(&mut self, collect: bool) -> Result<Option<Vec<u8>>, FqPackError> {
        if self.cur_desc == self.num_of_descs {
            return Err(FqPackError::OutOfRange(self.cur_desc, self.num_of_descs));
        }

        let mut sampled = self.pending_sampled;
        self.pending_sampled = false;
        if let Some(sampling) = self.sampling.as_mut() {
            if sampling.peek_next_element() == Some(self.cur_desc) {
                let (element, position) = sampling.advance_sample().expect("peeked sample");
                debug_assert_eq!(element, self.cur_desc);
                log::trace!("hopping to sampled description {element} at offset {position}");
                self.reader.reinit(position)?;
                sampled = true;
            }
        }

        let num_of_fields = if !self.num_of_fields_is_const {
            self.reader.read_bits(self.bits_per_field)?
        }
        else {
            self.num_of_fields
        };
        if num_of_fields > self.num_of_fields {
            return Err(FqPackError::Inconsistent(format!(
                "description claims {num_of_fields} fields, archive has {}",
                self.num_of_fields
            )));
        }

        let mut out: Vec<u8> = Vec::new();
        let cur_desc = self.cur_desc;
        for field in self.fields.iter_mut().take(num_of_fields as usize) {
            match &mut field.strategy {
                FieldStrategy::Constant => {
                    out.extend_from_slice(&field.data);
                    out.push(field.sep);
                }
                FieldStrategy::Numeric(num) => {
                    if num.has_zero_padding && !field.fieldlen_is_const {
                        let coder = num.huffman_zero.as_ref().expect("zero-count coder");
                        let zero_count = decode_symbol(&mut self.reader, coder)?;
                        for _ in 0..zero_count {
                            out.push(b'0');
                        }
                    }

                    let value: i64;
                    if cur_desc == 0 || sampled {
                        let raw = self.reader.read_bits(num.bits_per_value)?;
                        value = (raw as i64).wrapping_add(num.min_value);
                    }
                    else {
                        let stored: i64 = if !num.is_value_const || !num.is_delta_const {
                            if num.use_hc {
                                let coder = num.huffman_num.as_ref().expect("numeric coder");
                                decode_symbol(&mut self.reader, coder)? as i64
                            }
                            else {
                                self.reader.read_bits(num.bits_per_num)? as i64
                            }
                        }
                        else if num.use_delta_coding {
                            0
                        }
                        else {
                            num.prev_value.wrapping_sub(num.min_value)
                        };
                        value = if num.use_delta_coding {
                            stored.wrapping_add(num.prev_value).wrapping_add(num.min_delta)
                        }
                        else {
                            stored.wrapping_add(num.min_value)
                        };
                    }
                    num.prev_value = value;

                    if num.has_zero_padding && field.fieldlen_is_const {
                        let digits = decimal_width(value);
                        for _ in 0..(field.len).saturating_sub(digits) {
                            out.push(b'0');
                        }
                    }
                    out.extend_from_slice(value.to_string().as_bytes());
                    out.push(field.sep);
                }
                FieldStrategy::Text(text) => {
                    let field_len = if !field.fieldlen_is_const {
                        self.reader.read_bits(field.bits_per_len)? + field.min_len
                    }
                    else {
                        field.len
                    };
                    if field_len > field.max_len {
                        return Err(FqPackError::Inconsistent(format!(
                            "field length {field_len} beyond maximum {}",
                            field.max_len
                        )));
                    }
                    for idx in 0..field_len as usize {
                        let covered =
                            (idx as u64) < field.len && text.bittab.get(idx).unwrap_or(false);
                        if covered {
                            out.push(field.data[idx]);
                        }
                        else {
                            let coder = text.coders[idx].as_ref().expect("column coder");
                            let symbol = decode_symbol(&mut self.reader, coder)?;
                            if symbol > u8::MAX as u64 {
                                return Err(FqPackError::Inconsistent(
                                    "column symbol out of byte range".into(),
                                ));
                            }
                            out.push(symbol as u8);
                        }
                    }
                    out.push(field.sep);
                }
            }
        }
        if !out.is_empty() {
            out.pop();
        }
        self.cur_desc += 1;
        Ok(collect.then_some(out))
    }
}

/// Number of characters `value` occupies in decimal, sign included.
fn decimal_width(value: i64) -> u64 {
    let mut width = if value < 0 { 1u64 } else { 0 };
    let mut magnitude = value.unsigned_abs();
    loop {
        width += 1;
        magnitude /= 10;
        if magnitude == 0 {
            return width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_widths() {
        assert_eq!(decimal_width(0), 1);
        assert_eq!(decimal_width(9), 1);
        assert_eq!(decimal_width(10), 2);
        assert_eq!(decimal_width(42), 2);
        assert_eq!(decimal_width(-7), 2);
        assert_eq!(decimal_width(-100), 4);
    }
}
