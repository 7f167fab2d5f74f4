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

//! Description-archive header layout.
//!
//! The header carries everything a decoder needs to rebuild the per-field
//! coders: the template data, per-field flags, numeric ranges, bit widths,
//! the column match table and the distributions behind each Huffman code.
//! All integers are little-endian. Offsets that are only known after the
//! encoding pass are reserved as placeholders and patched at the end.

use binrw::{BinReaderExt, BinWriterExt};
use bit_vec::BitVec;
use bitflags::bitflags;

use super::analyze::{Analysis, DescField, FieldStrategy, NumericField, TextField};
use crate::io::{HeaderPlaceholder, ReadSeek, Seek, SeekFrom, Write};
use crate::{next_page_boundary, FqPackError, Histogram};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct FieldFlags: u8 {
        const IS_CONST          = 0b0000_0001;
        const IS_NUMERIC        = 0b0000_0010;
        const USE_DELTA         = 0b0000_0100;
        const USE_HC            = 0b0000_1000;
        const HAS_ZERO_PADDING  = 0b0001_0000;
        const FIELDLEN_IS_CONST = 0b0010_0000;
        const IS_VALUE_CONST    = 0b0100_0000;
        const IS_DELTA_CONST    = 0b1000_0000;
    }
}

pub(crate) struct DescHeader {
    pub fields: Vec<DescField>,
    pub num_of_fields: u64,
    pub num_of_fields_is_const: bool,
    pub num_of_fields_tab: Vec<u64>,
    pub bits_per_field: u32,
    pub num_of_descs: u64,
    pub total_num_of_chars: u64,
    pub start_of_encoding: i64,
    pub start_of_samplingtab: i64,
}

fn field_flags(field: &DescField) -> FieldFlags {
    let mut flags = FieldFlags::empty();
    if field.fieldlen_is_const {
        flags |= FieldFlags::FIELDLEN_IS_CONST;
    }
    match &field.strategy {
        FieldStrategy::Constant => flags |= FieldFlags::IS_CONST,
        FieldStrategy::Numeric(num) => {
            flags |= FieldFlags::IS_NUMERIC;
            if num.use_delta_coding {
                flags |= FieldFlags::USE_DELTA;
            }
            if num.use_hc {
                flags |= FieldFlags::USE_HC;
            }
            if num.has_zero_padding {
                flags |= FieldFlags::HAS_ZERO_PADDING;
            }
            if num.is_value_const {
                flags |= FieldFlags::IS_VALUE_CONST;
            }
            if num.is_delta_const {
                flags |= FieldFlags::IS_DELTA_CONST;
            }
        }
        FieldStrategy::Text(_) => {}
    }
    flags
}

fn write_histogram<W: Write + Seek>(hist: &Histogram, writer: &mut W) -> Result<(), FqPackError> {
    writer.write_le(&(hist.len() as u64))?;
    for (key, freq) in hist.sorted_entries() {
        writer.write_le(&key)?;
        writer.write_le(&freq)?;
    }
    Ok(())
}

fn read_histogram<R: ReadSeek>(reader: &mut R) -> Result<Histogram, FqPackError> {
    let count: u64 = reader.read_le()?;
    let mut hist = Histogram::new();
    for _ in 0..count {
        let key: i64 = reader.read_le()?;
        let freq: u64 = reader.read_le()?;
        hist.set(key, freq);
    }
    Ok(hist)
}

/// Columns of a text field that need their own coder (and therefore a
/// stored distribution): everything the bittab does not cover.
fn column_needs_coder(field: &DescField, text: &TextField, idx: usize) -> bool {
    idx as u64 >= field.len || !text.bittab.get(idx).unwrap_or(false)
}

fn write_field<W: Write + Seek>(field: &DescField, writer: &mut W) -> Result<(), FqPackError> {
    writer.write_le(&field.sep)?;
    writer.write_le(&(field.data.len() as u32))?;
    writer.write_all(&field.data)?;
    writer.write_le(&field_flags(field).bits())?;
    writer.write_le(&(field.min_len as u32))?;
    writer.write_le(&(field.max_len as u32))?;
    writer.write_le(&(field.len as u32))?;

    let (bits_per_num, bits_per_value) = match &field.strategy {
        FieldStrategy::Numeric(num) => {
            writer.write_le(&num.min_value)?;
            writer.write_le(&num.max_value)?;
            writer.write_le(&num.prev_value)?;
            writer.write_le(&num.min_delta)?;
            writer.write_le(&num.max_delta)?;
            writer.write_le(&num.max_zero)?;
            (num.bits_per_num, num.bits_per_value)
        }
        _ => (0, 0),
    };
    writer.write_le(&bits_per_num)?;
    writer.write_le(&bits_per_value)?;
    writer.write_le(&field.bits_per_len)?;

    match &field.strategy {
        FieldStrategy::Constant => {}
        FieldStrategy::Text(text) => {
            writer.write_all(&text.bittab.to_bytes())?;
            for idx in 0..field.max_len as usize {
                if column_needs_coder(field, text, idx) {
                    write_histogram(&text.columns[idx], writer)?;
                }
            }
        }
        FieldStrategy::Numeric(num) => {
            if num.use_hc {
                let hist = if num.use_delta_coding { &num.deltas } else { &num.values };
                write_histogram(hist, writer)?;
            }
            if num.has_zero_padding && !field.fieldlen_is_const {
                write_histogram(&num.zero_counts, writer)?;
            }
        }
    }
    Ok(())
}

fn read_field<R: ReadSeek>(reader: &mut R) -> Result<DescField, FqPackError> {
    let sep: u8 = reader.read_le()?;
    let data_len: u32 = reader.read_le()?;
    let mut data = vec![0u8; data_len as usize];
    reader.read_exact(&mut data).map_err(FqPackError::from)?;
    let flag_bits: u8 = reader.read_le()?;
    let flags = FieldFlags::from_bits(flag_bits)
        .ok_or_else(|| FqPackError::Inconsistent(format!("unknown field flags {flag_bits:#x}")))?;
    let min_len: u32 = reader.read_le()?;
    let max_len: u32 = reader.read_le()?;
    let len: u32 = reader.read_le()?;

    let numeric_block = if flags.contains(FieldFlags::IS_NUMERIC) {
        let min_value: i64 = reader.read_le()?;
        let max_value: i64 = reader.read_le()?;
        let prev_value: i64 = reader.read_le()?;
        let min_delta: i64 = reader.read_le()?;
        let max_delta: i64 = reader.read_le()?;
        let max_zero: u32 = reader.read_le()?;
        Some((min_value, max_value, prev_value, min_delta, max_delta, max_zero))
    }
    else {
        None
    };
    let bits_per_num: u32 = reader.read_le()?;
    let bits_per_value: u32 = reader.read_le()?;
    let bits_per_len: u32 = reader.read_le()?;

    let mut field = DescField {
        sep,
        data,
        len: len as u64,
        min_len: min_len as u64,
        max_len: max_len as u64,
        fieldlen_is_const: flags.contains(FieldFlags::FIELDLEN_IS_CONST),
        bits_per_len,
        strategy: FieldStrategy::Constant,
    };

    if flags.contains(FieldFlags::IS_CONST) {
        return Ok(field);
    }

    if let Some((min_value, max_value, prev_value, min_delta, max_delta, max_zero)) = numeric_block
    {
        let use_hc = flags.contains(FieldFlags::USE_HC);
        let use_delta_coding = flags.contains(FieldFlags::USE_DELTA);
        let has_zero_padding = flags.contains(FieldFlags::HAS_ZERO_PADDING);
        let mut values = Histogram::new();
        let mut deltas = Histogram::new();
        if use_hc {
            let hist = read_histogram(reader)?;
            if use_delta_coding {
                deltas = hist;
            }
            else {
                values = hist;
            }
        }
        let zero_counts = if has_zero_padding && !field.fieldlen_is_const {
            read_histogram(reader)?
        }
        else {
            Histogram::new()
        };
        field.strategy = FieldStrategy::Numeric(NumericField {
            min_value,
            max_value,
            min_delta,
            max_delta,
            prev_value,
            is_value_const: flags.contains(FieldFlags::IS_VALUE_CONST),
            is_delta_const: flags.contains(FieldFlags::IS_DELTA_CONST),
            use_delta_coding,
            use_hc,
            has_zero_padding,
            max_zero,
            bits_per_num,
            bits_per_value,
            values,
            deltas,
            zero_counts,
            huffman_num: None,
            huffman_zero: None,
        });
    }
    else {
        let mut tab_bytes = vec![0u8; (field.len as usize).div_ceil(8)];
        reader.read_exact(&mut tab_bytes).map_err(FqPackError::from)?;
        let mut bittab = BitVec::from_bytes(&tab_bytes);
        bittab.truncate(field.len as usize);
        let mut text = TextField {
            bittab,
            columns: vec![Histogram::new(); field.max_len as usize],
            coders: Vec::new(),
        };
        for idx in 0..field.max_len as usize {
            if column_needs_coder(&field, &text, idx) {
                text.columns[idx] = read_histogram(reader)?;
            }
        }
        field.strategy = FieldStrategy::Text(text);
    }
    Ok(field)
}

/// Write the archive header, leaving the sampling-table slot reserved, and
/// position the writer at the page-aligned start of the encoded region.
/// Returns the reserved slot and `start_of_encoding`.
pub(crate) fn write_header<W: Write + Seek>(
    analysis: &Analysis,
    writer: &mut W,
) -> Result<(HeaderPlaceholder, u64), FqPackError> {
    writer.write_le(&analysis.num_of_fields)?;
    writer.write_le(&u8::from(analysis.num_of_fields_is_const))?;
    if !analysis.num_of_fields_is_const {
        writer.write_le(&(analysis.num_of_fields_tab.len() as u64))?;
        for &count in &analysis.num_of_fields_tab {
            writer.write_le(&count)?;
        }
    }
    writer.write_le(&analysis.total_num_of_chars)?;
    writer.write_le(&analysis.num_of_descs)?;
    writer.write_le(&analysis.bits_per_field)?;
    let encoding_slot = HeaderPlaceholder::reserve(writer)?;
    let samplingtab_slot = HeaderPlaceholder::reserve(writer)?;

    for field in &analysis.fields {
        write_field(field, writer)?;
    }

    let header_end = writer.stream_position()?;
    let start_of_encoding = next_page_boundary(header_end, crate::page_size());
    encoding_slot.patch(writer, start_of_encoding as i64)?;
    writer.seek(SeekFrom::Start(start_of_encoding))?;
    Ok((samplingtab_slot, start_of_encoding))
}

pub(crate) fn read_header<R: ReadSeek>(reader: &mut R) -> Result<DescHeader, FqPackError> {
    let num_of_fields: u64 = reader.read_le()?;
    if num_of_fields == 0 {
        return Err(FqPackError::Inconsistent("header reports zero fields".into()));
    }
    let const_byte: u8 = reader.read_le()?;
    let num_of_fields_is_const = const_byte != 0;
    let num_of_fields_tab = if !num_of_fields_is_const {
        let count: u64 = reader.read_le()?;
        let mut tab = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tab.push(reader.read_le::<u64>()?);
        }
        tab
    }
    else {
        Vec::new()
    };
    let total_num_of_chars: u64 = reader.read_le()?;
    let num_of_descs: u64 = reader.read_le()?;
    let bits_per_field: u32 = reader.read_le()?;
    let start_of_encoding: i64 = reader.read_le()?;
    let start_of_samplingtab: i64 = reader.read_le()?;

    let mut fields = Vec::with_capacity(num_of_fields as usize);
    for _ in 0..num_of_fields {
        fields.push(read_field(reader)?);
    }

    Ok(DescHeader {
        fields,
        num_of_fields,
        num_of_fields_is_const,
        num_of_fields_tab,
        bits_per_field,
        num_of_descs,
        total_num_of_chars,
        start_of_encoding,
        start_of_samplingtab,
    })
}
