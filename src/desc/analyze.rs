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

//! Two-pass description analysis.
//!
//! The first pass finds the description with the most fields (the template)
//! under the static separator set. The second pass walks every description
//! against the template's per-field separators, accumulating length, content
//! and numeric statistics. Fields start as provisional free-text and are
//! finalized into constant / numeric / text strategies only once all the
//! evidence is in.

use bit_vec::BitVec;

use crate::huffman::Huffman;
use crate::sources::DescSource;
use crate::{bits_for, FqPackError, Histogram};

/// Cap on the number of distinct values a numeric field may have and still
/// be Huffman coded; above this the field stores verbatim binary values.
pub(crate) const MAX_HUFFMAN_VALUES: usize = 512;

/// Separator characters that end a field; end-of-string acts as a tenth one.
fn is_separator(b: u8) -> bool {
    matches!(b, b'.' | b'_' | b',' | b'=' | b':' | b'/' | b'-' | b'|' | b' ')
}

/// Count the `'0'` characters a numeric token starts with. A token that is
/// all zeros keeps one digit for the value, so its final zero is not
/// counted.
pub(crate) fn count_leading_zeros(token: &[u8]) -> u32 {
    let mut count = 0u32;
    for (idx, &b) in token.iter().enumerate() {
        if b != b'0' {
            return count;
        }
        count = idx as u32 + 1;
    }
    count.saturating_sub(1)
}

pub(crate) fn parse_int(token: &[u8]) -> Option<i64> {
    std::str::from_utf8(token).ok()?.parse::<i64>().ok()
}

/// A field of the description template with its finalized coding strategy.
pub(crate) struct DescField {
    /// separator that ends this field in the template; 0 for end-of-string
    pub sep: u8,
    /// template token
    pub data: Vec<u8>,
    /// template token length
    pub len: u64,
    pub min_len: u64,
    pub max_len: u64,
    pub fieldlen_is_const: bool,
    pub bits_per_len: u32,
    pub strategy: FieldStrategy,
}

pub(crate) enum FieldStrategy {
    /// identical in every description; nothing is encoded
    Constant,
    Numeric(NumericField),
    Text(TextField),
}

pub(crate) struct NumericField {
    pub min_value: i64,
    pub max_value: i64,
    pub min_delta: i64,
    pub max_delta: i64,
    pub prev_value: i64,
    pub is_value_const: bool,
    pub is_delta_const: bool,
    pub use_delta_coding: bool,
    pub use_hc: bool,
    pub has_zero_padding: bool,
    pub max_zero: u32,
    pub bits_per_num: u32,
    pub bits_per_value: u32,
    pub values: Histogram,
    pub deltas: Histogram,
    pub zero_counts: Histogram,
    pub huffman_num: Option<Huffman>,
    pub huffman_zero: Option<Huffman>,
}

pub(crate) struct TextField {
    /// which template columns matched in every description
    pub bittab: BitVec,
    /// per-column character distributions, one per column up to `max_len`
    pub columns: Vec<Histogram>,
    /// per-column coders for the columns the bittab does not cover
    pub coders: Vec<Option<Huffman>>,
}

impl NumericField {
    /// Range of the values actually stored: deltas when delta coding.
    pub fn huffman_domain(&self) -> (i64, u64) {
        if self.use_delta_coding {
            (self.min_delta, self.max_delta.abs_diff(self.min_delta) + 1)
        }
        else {
            (self.min_value, self.max_value.abs_diff(self.min_value) + 1)
        }
    }
}

/// Working state for one field while evidence accumulates.
struct FieldProbe {
    sep: u8,
    data: Vec<u8>,
    len: u64,
    min_len: u64,
    max_len: u64,
    is_const: bool,
    is_numeric: bool,
    fieldlen_is_const: bool,
    min_value: i64,
    max_value: i64,
    min_delta: i64,
    max_delta: i64,
    prev_value: i64,
    is_value_const: bool,
    is_delta_const: bool,
    is_delta_positive: bool,
    is_delta_negative: bool,
    has_zero_padding: bool,
    max_zero: u32,
    values: Histogram,
    deltas: Histogram,
    zero_counts: Histogram,
    bittab: BitVec,
    columns: Vec<Histogram>,
}

impl FieldProbe {
    fn from_template_token(token: &[u8], sep: u8) -> Self {
        let len = token.len() as u64;
        let mut probe = FieldProbe {
            sep,
            data: token.to_vec(),
            len,
            min_len: len,
            max_len: len,
            is_const: true,
            is_numeric: false,
            fieldlen_is_const: true,
            min_value: 0,
            max_value: 0,
            min_delta: 0,
            max_delta: 0,
            prev_value: 0,
            is_value_const: false,
            is_delta_const: false,
            is_delta_positive: false,
            is_delta_negative: false,
            has_zero_padding: false,
            max_zero: 0,
            values: Histogram::new(),
            deltas: Histogram::new(),
            zero_counts: Histogram::new(),
            bittab: BitVec::from_elem(token.len(), true),
            columns: vec![Histogram::new(); token.len()],
        };
        if let Some(value) = parse_int(token) {
            probe.is_numeric = true;
            probe.min_value = value;
            probe.max_value = value;
        }
        probe
    }

    /// Fold one observed token into the running statistics. `desc_idx` is
    /// the index of the description the token came from.
    fn observe(&mut self, token: &[u8], desc_idx: u64) {
        let chars_len = token.len() as u64;
        if chars_len > self.max_len {
            self.is_const = false;
            self.fieldlen_is_const = false;
            self.columns.resize(token.len(), Histogram::new());
            self.max_len = chars_len;
        }
        else if chars_len < self.min_len {
            self.is_const = false;
            self.fieldlen_is_const = false;
            self.min_len = chars_len;
        }

        for (k, &ch) in token.iter().enumerate() {
            self.columns[k].add(ch as i64);
        }

        if self.is_const && self.data != token {
            self.is_const = false;
        }

        if self.is_numeric {
            match parse_int(token) {
                None => self.is_numeric = false,
                Some(value) => {
                    let zero_count = count_leading_zeros(token);
                    if zero_count > 0 {
                        self.has_zero_padding = true;
                    }
                    if zero_count > self.max_zero {
                        self.max_zero = zero_count;
                    }
                    self.zero_counts.add(zero_count as i64);

                    if desc_idx == 0 {
                        self.min_value = value;
                        self.max_value = value;
                        self.is_value_const = true;
                        self.is_delta_positive = true;
                        self.is_delta_negative = true;
                    }
                    else {
                        let delta = value - self.prev_value;
                        if delta != 0 {
                            self.is_value_const = false;
                            if value < self.min_value {
                                self.min_value = value;
                            }
                            if value > self.max_value {
                                self.max_value = value;
                            }
                        }
                        if delta <= 0 {
                            self.is_delta_positive = false;
                        }
                        if delta >= 0 {
                            self.is_delta_negative = false;
                        }

                        if desc_idx == 1 {
                            self.min_delta = delta;
                            self.max_delta = delta;
                            self.is_delta_const = true;
                        }
                        else {
                            if delta > self.max_delta {
                                self.is_delta_const = false;
                                self.max_delta = delta;
                            }
                            if delta < self.min_delta {
                                self.is_delta_const = false;
                                self.min_delta = delta;
                            }
                        }
                        self.deltas.add(delta);
                    }
                    self.values.add(value);
                    self.prev_value = value;
                }
            }
        }

        // unmark template columns this token contradicts
        if !self.is_const {
            for k in 0..self.len as usize {
                if k < token.len() {
                    if self.data[k] != token[k] {
                        self.bittab.set(k, false);
                    }
                }
                else {
                    self.bittab.set(k, false);
                }
            }
        }
    }

    /// A field absent from some description: nothing about it can be
    /// trusted as constant or numeric any more.
    fn mark_absent(&mut self) {
        self.is_const = false;
        self.fieldlen_is_const = false;
        self.is_numeric = false;
    }

    fn finalize(self) -> DescField {
        let mut bits_per_len = 0;
        let strategy = if self.is_const {
            FieldStrategy::Constant
        }
        else if self.is_numeric {
            let value_range = self.max_value.abs_diff(self.min_value);
            let delta_range = self.max_delta.abs_diff(self.min_delta);
            let use_delta_coding = delta_range < value_range && !self.deltas.is_empty();
            let chosen_range = if use_delta_coding { delta_range } else { value_range };
            let distinct = if use_delta_coding { self.deltas.len() } else { self.values.len() };
            let use_hc = !(self.is_value_const && self.is_delta_const) && distinct <= MAX_HUFFMAN_VALUES;
            log::debug!(
                "numeric field: value range {value_range}, delta range {delta_range}, \
                 delta coding {use_delta_coding}, huffman {use_hc}"
            );
            if self.is_delta_positive || self.is_delta_negative {
                log::debug!(
                    "delta is strictly {}",
                    if self.is_delta_positive { "positive" } else { "negative" }
                );
            }
            FieldStrategy::Numeric(NumericField {
                min_value: self.min_value,
                max_value: self.max_value,
                min_delta: self.min_delta,
                max_delta: self.max_delta,
                prev_value: self.prev_value,
                is_value_const: self.is_value_const,
                is_delta_const: self.is_delta_const,
                use_delta_coding,
                use_hc,
                has_zero_padding: self.has_zero_padding,
                max_zero: self.max_zero,
                bits_per_num: bits_for(chosen_range),
                bits_per_value: bits_for(value_range),
                values: self.values,
                deltas: self.deltas,
                zero_counts: self.zero_counts,
                huffman_num: None,
                huffman_zero: None,
            })
        }
        else {
            bits_per_len = bits_for(self.max_len - self.min_len);
            FieldStrategy::Text(TextField {
                bittab: self.bittab,
                columns: self.columns,
                coders: Vec::new(),
            })
        };
        DescField {
            sep: self.sep,
            data: self.data,
            len: self.len,
            min_len: self.min_len,
            max_len: self.max_len,
            fieldlen_is_const: self.fieldlen_is_const,
            bits_per_len,
            strategy,
        }
    }
}

pub(crate) struct Analysis {
    pub fields: Vec<DescField>,
    pub num_of_fields: u64,
    pub num_of_fields_is_const: bool,
    /// per-description field count, in input order
    pub num_of_fields_tab: Vec<u64>,
    pub bits_per_field: u32,
    pub num_of_descs: u64,
    pub total_num_of_chars: u64,
}

/// Count fields under the full separator set. Empty tokens merge into the
/// following token rather than counting.
fn count_fields(desc: &[u8]) -> u64 {
    let mut count = 0;
    let mut start = 0usize;
    for i in 0..=desc.len() {
        let sep_here = i == desc.len() || is_separator(desc[i]);
        if sep_here && i > start {
            count += 1;
            start = i + 1;
        }
    }
    count
}

/// Split the template into `(token, separator)` pairs with the same
/// empty-token merging as [`count_fields`].
fn split_template(template: &[u8]) -> Vec<(Vec<u8>, u8)> {
    let mut fields = Vec::new();
    let mut start = 0usize;
    for i in 0..=template.len() {
        let sep = if i == template.len() { 0 } else { template[i] };
        let sep_here = i == template.len() || is_separator(template[i]);
        if sep_here && i > start {
            fields.push((template[start..i].to_vec(), sep));
            start = i + 1;
        }
    }
    fields
}

/// Walk `desc` against the template fields, invoking `on_token(field_idx,
/// token)` for each field the description closes. Returns the number of
/// fields closed. A field only ends at its own template separator (or
/// end-of-string), so tokens may contain other separator characters.
pub(crate) fn walk_fields<F: FnMut(usize, &[u8])>(
    desc: &[u8],
    seps: &[u8],
    mut on_token: F,
) -> usize {
    let mut field_idx = 0usize;
    let mut start = 0usize;
    for i in 0..=desc.len() {
        if field_idx >= seps.len() {
            break;
        }
        let closes = i == desc.len() || desc[i] == seps[field_idx];
        if closes {
            on_token(field_idx, &desc[start..i]);
            start = i + 1;
            field_idx += 1;
        }
    }
    field_idx
}

/// Run both analysis passes over `source` and finalize each field's coding
/// strategy.
pub(crate) fn analyze<S: DescSource>(source: &mut S) -> Result<Analysis, FqPackError> {
    // first pass: find the template
    let mut num_of_fields = 0u64;
    let mut template: Option<Vec<u8>> = None;
    source.reset()?;
    while let Some(desc) = source.next_desc()? {
        let count = count_fields(desc.as_bytes());
        if count > num_of_fields {
            num_of_fields = count;
            template = Some(desc.as_bytes().to_vec());
        }
    }
    let Some(template) = template else {
        return Err(FqPackError::EmptyInput);
    };
    log::debug!("template description: {}", String::from_utf8_lossy(&template));

    let mut probes: Vec<FieldProbe> = split_template(&template)
        .into_iter()
        .map(|(token, sep)| FieldProbe::from_template_token(&token, sep))
        .collect();
    debug_assert_eq!(probes.len() as u64, num_of_fields);
    let seps: Vec<u8> = probes.iter().map(|p| p.sep).collect();

    // second pass: fold every description into the field statistics
    let mut num_of_fields_is_const = true;
    let mut num_of_fields_tab = Vec::new();
    let mut total_num_of_chars = 0u64;
    let mut cur_desc = 0u64;
    source.reset()?;
    while let Some(desc) = source.next_desc()? {
        let bytes = desc.as_bytes().to_vec();
        total_num_of_chars += bytes.len() as u64;

        let fields_seen = walk_fields(&bytes, &seps, |idx, token| {
            probes[idx].observe(token, cur_desc);
        });

        if (fields_seen as u64) < num_of_fields {
            log::debug!(
                "description {cur_desc} has {fields_seen} of {num_of_fields} fields"
            );
            num_of_fields_is_const = false;
        }
        num_of_fields_tab.push(fields_seen as u64);

        // All fields past the last seen one are treated as untrustworthy,
        // even if only a middle field was actually absent.
        for probe in probes.iter_mut().skip(fields_seen) {
            probe.mark_absent();
        }
        cur_desc += 1;
    }

    let fields: Vec<DescField> = probes.into_iter().map(FieldProbe::finalize).collect();
    for (idx, field) in fields.iter().enumerate() {
        log::debug!(
            "field {idx}: {}",
            match &field.strategy {
                FieldStrategy::Constant => "constant",
                FieldStrategy::Numeric(_) => "numeric",
                FieldStrategy::Text(_) => "text",
            }
        );
    }

    Ok(Analysis {
        bits_per_field: bits_for(num_of_fields),
        fields,
        num_of_fields,
        num_of_fields_is_const,
        num_of_fields_tab,
        num_of_descs: cur_desc,
        total_num_of_chars,
    })
}

/// Build the per-field Huffman coders the finalized strategies call for.
/// Encoder and decoder both run this, from identical statistics, so the
/// codes agree.
pub(crate) fn init_huffman(fields: &mut [DescField]) {
    for field in fields.iter_mut() {
        match &mut field.strategy {
            FieldStrategy::Constant => {}
            FieldStrategy::Numeric(num) => {
                if num.use_hc {
                    let (base, size) = num.huffman_domain();
                    let hist = if num.use_delta_coding { &num.deltas } else { &num.values };
                    num.huffman_num =
                        Some(Huffman::new(size, |sym| hist.get(base.wrapping_add(sym as i64))));
                }
                if num.has_zero_padding && !field.fieldlen_is_const {
                    let hist = &num.zero_counts;
                    num.huffman_zero =
                        Some(Huffman::new(num.max_zero as u64 + 1, |sym| hist.get(sym as i64)));
                }
            }
            FieldStrategy::Text(text) => {
                let mut coders = Vec::with_capacity(field.max_len as usize);
                for idx in 0..field.max_len as usize {
                    let covered =
                        (idx as u64) < field.len && text.bittab.get(idx).unwrap_or(false);
                    if covered {
                        coders.push(None);
                    }
                    else {
                        let hist = &text.columns[idx];
                        coders.push(Some(Huffman::new(256, |sym| hist.get(sym as i64))));
                    }
                }
                text.coders = coders;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SliceDescSource;

    #[test]
    fn leading_zero_counts() {
        assert_eq!(count_leading_zeros(b"000156"), 3);
        assert_eq!(count_leading_zeros(b"x"), 0);
        assert_eq!(count_leading_zeros(b"0000"), 3);
        assert_eq!(count_leading_zeros(b""), 0);
        assert_eq!(count_leading_zeros(b"0"), 0);
        assert_eq!(count_leading_zeros(b"042"), 1);
    }

    #[test]
    fn field_counting_merges_empty_tokens() {
        assert_eq!(count_fields(b"read_1 pos=100"), 4);
        assert_eq!(count_fields(b"a..b"), 2);
        assert_eq!(count_fields(b""), 0);
        assert_eq!(count_fields(b"..."), 0);
        assert_eq!(count_fields(b"plain"), 1);
    }

    #[test]
    fn template_split_matches_count() {
        for desc in [&b"read_1 pos=100"[..], b"a..b", b"x|y|z", b"one"] {
            assert_eq!(split_template(desc).len() as u64, count_fields(desc));
        }
        let fields = split_template(b"read_1 pos=100");
        assert_eq!(fields[0], (b"read".to_vec(), b'_'));
        assert_eq!(fields[1], (b"1".to_vec(), b' '));
        assert_eq!(fields[2], (b"pos".to_vec(), b'='));
        assert_eq!(fields[3], (b"100".to_vec(), 0));
    }

    #[test]
    fn classifies_constant_and_delta_fields() {
        let mut source =
            SliceDescSource::new(["read_1 pos=100", "read_2 pos=102", "read_3 pos=104"]);
        let analysis = analyze(&mut source).unwrap();

        assert_eq!(analysis.num_of_descs, 3);
        assert_eq!(analysis.num_of_fields, 4);
        assert!(analysis.num_of_fields_is_const);

        let fields = &analysis.fields;
        assert_eq!(fields[0].sep, b'_');
        assert!(matches!(fields[0].strategy, FieldStrategy::Constant));
        assert_eq!(fields[0].data, b"read");

        assert_eq!(fields[1].sep, b' ');
        let FieldStrategy::Numeric(num) = &fields[1].strategy else {
            panic!("field 1 should be numeric");
        };
        assert_eq!((num.min_value, num.max_value), (1, 3));
        assert!(num.use_delta_coding);
        assert!(num.is_delta_const);

        assert_eq!(fields[2].sep, b'=');
        assert!(matches!(fields[2].strategy, FieldStrategy::Constant));

        let FieldStrategy::Numeric(pos) = &fields[3].strategy else {
            panic!("field 3 should be numeric");
        };
        assert_eq!((pos.min_value, pos.max_value), (100, 104));
        assert!(pos.use_delta_coding);
    }

    #[test]
    fn detects_zero_padding() {
        let mut source = SliceDescSource::new(["seq_00042", "seq_00100", "seq_01234"]);
        let analysis = analyze(&mut source).unwrap();
        let FieldStrategy::Numeric(num) = &analysis.fields[1].strategy else {
            panic!("second field should be numeric");
        };
        assert!(num.has_zero_padding);
        assert_eq!(num.max_zero, 3);
        assert!(analysis.fields[1].fieldlen_is_const);
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut source = SliceDescSource::new(Vec::<String>::new());
        assert!(matches!(analyze(&mut source), Err(FqPackError::EmptyInput)));

        let mut source = SliceDescSource::new(["...", "---"]);
        assert!(matches!(analyze(&mut source), Err(FqPackError::EmptyInput)));
    }

    #[test]
    fn missing_fields_untrust_the_tail() {
        let mut source = SliceDescSource::new(["a_bb_1", "a_bb_2", "a"]);
        let analysis = analyze(&mut source).unwrap();
        assert!(!analysis.num_of_fields_is_const);
        assert_eq!(analysis.num_of_fields_tab, vec![3, 3, 1]);
        // field 0 stays constant, the tail is demoted
        assert!(matches!(analysis.fields[0].strategy, FieldStrategy::Constant));
        assert!(matches!(analysis.fields[1].strategy, FieldStrategy::Text(_)));
        assert!(matches!(analysis.fields[2].strategy, FieldStrategy::Text(_)));
    }

    #[test]
    fn variable_text_field_columns() {
        let mut source = SliceDescSource::new(["id_AAAA", "id_ABBA", "id_AACA"]);
        let analysis = analyze(&mut source).unwrap();
        let field = &analysis.fields[1];
        let FieldStrategy::Text(text) = &field.strategy else {
            panic!("should be text");
        };
        assert!(field.fieldlen_is_const);
        // columns 0 and 3 match the template everywhere
        assert_eq!(text.bittab.get(0), Some(true));
        assert_eq!(text.bittab.get(1), Some(false));
        assert_eq!(text.bittab.get(2), Some(false));
        assert_eq!(text.bittab.get(3), Some(true));
    }
}
