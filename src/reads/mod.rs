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

//! The read compressor.
//!
//! Every (base, quality) pair of a read is one symbol of a joint alphabet of
//! `alphabet_size * quality_range` entries, coded with a single Huffman
//! tree. Reads are emitted back to back with page-aligned samples, so any
//! read is reachable by mapping one sampled page and decoding forward.

mod data_iter;
mod header;

pub use header::FileInfo;

use std::fs::File;
use std::path::Path;

use binrw::BinReaderExt;

use data_iter::MmapChunkSource;
use header::LeafRecord;

use crate::alphabet::{Alphabet, WILDCARD};
use crate::bitstream::BitWriter;
use crate::desc::{DescDecoder, DescEncoder};
use crate::huffman::{Huffman, StreamingDecoder};
use crate::io::{HeaderPlaceholder, Seek, SeekFrom, Write};
use crate::rbtree::RbTree;
use crate::sampling::{Sampling, SamplingConfig};
use crate::sources::{DescSource, ReadSource};
use crate::FqPackError;

/// Quality characters are ASCII; values outside this range are rejected at
/// the distribution stage.
const HIGHEST_QUAL: u8 = 127;

/// Column width of FASTQ text produced by [`ReadDecoder::decode_range`].
const LINE_WIDTH: usize = 80;

/// An inclusive clamp on raw quality characters: values at or below `start`
/// are raised to it, values at or above `end` are lowered to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualRange {
    pub start: Option<u8>,
    pub end: Option<u8>,
}

impl QualRange {
    fn clamp(&self, qual: u8) -> u8 {
        let mut q = qual;
        if let Some(start) = self.start {
            if q <= start {
                q = start;
            }
        }
        if let Some(end) = self.end {
            if q >= end {
                q = end;
            }
        }
        q
    }
}

/// The joint (base, quality) frequency table gathered from the input (or
/// rebuilt from archived leaves). Row = quality minus offset, column = base
/// code.
struct BaseQualDistr {
    counts: Vec<Vec<u64>>,
    ncols: u64,
    qual_offset: u8,
}

impl BaseQualDistr {
    fn freq(&self, symbol: u64) -> u64 {
        self.counts[(symbol / self.ncols) as usize][(symbol % self.ncols) as usize]
    }

    fn num_symbols(&self) -> u64 {
        self.counts.len() as u64 * self.ncols
    }

    fn build_huffman(&self) -> Huffman {
        Huffman::new(self.num_symbols(), |symbol| self.freq(symbol))
    }
}

/// Accumulates the distribution over the full quality range, then trims to
/// the observed quality window.
struct DistrBuilder {
    counts: Vec<Vec<u64>>,
    ncols: u64,
    wildcard_idx: u8,
    min_qual: u8,
    max_qual: u8,
    seen: bool,
}

impl DistrBuilder {
    fn new(alphabet_size: u32) -> Self {
        DistrBuilder {
            counts: vec![vec![0u64; alphabet_size as usize]; HIGHEST_QUAL as usize + 1],
            ncols: alphabet_size as u64,
            wildcard_idx: alphabet_size as u8 - 1,
            min_qual: HIGHEST_QUAL,
            max_qual: 0,
            seen: false,
        }
    }

    fn add<A: Alphabet>(
        &mut self,
        alphabet: &A,
        qrange: QualRange,
        seq: &[u8],
        qual: &[u8],
    ) -> Result<(), FqPackError> {
        for (&base, &q) in seq.iter().zip(qual.iter()) {
            let mut code = alphabet.encode(base);
            if code == WILDCARD {
                code = self.wildcard_idx;
            }
            let q = qrange.clamp(q);
            if q > HIGHEST_QUAL {
                return Err(FqPackError::InvalidInput(format!(
                    "quality character {q:#x} outside the ASCII range"
                )));
            }
            self.counts[q as usize][code as usize] += 1;
            self.min_qual = self.min_qual.min(q);
            self.max_qual = self.max_qual.max(q);
            self.seen = true;
        }
        Ok(())
    }

    fn set(&mut self, qual: u8, code: u8, freq: u64) {
        self.counts[qual as usize][code as usize] = freq;
        self.min_qual = self.min_qual.min(qual);
        self.max_qual = self.max_qual.max(qual);
        self.seen = true;
    }

    /// Drop the unused quality rows below and above the observed window.
    fn trim(self) -> Result<BaseQualDistr, FqPackError> {
        if !self.seen {
            return Err(FqPackError::EmptyInput);
        }
        let counts = self.counts[self.min_qual as usize..=self.max_qual as usize].to_vec();
        Ok(BaseQualDistr {
            counts,
            ncols: self.ncols,
            qual_offset: self.min_qual,
        })
    }
}

/// Compresses FASTQ reads (sequence + qualities) into a random-access
/// archive. Descriptions can be encoded side by side via
/// [`encode_paired`](Self::encode_paired).
pub struct ReadEncoder<A: Alphabet> {
    alphabet: A,
    qrange: QualRange,
    sampling: SamplingConfig,
}

impl<A: Alphabet> ReadEncoder<A> {
    /// A read archive always carries a sampling index;
    /// [`SamplingConfig::None`] is rejected, as is a degenerate quality
    /// clamp.
    pub fn new(alphabet: A, qrange: QualRange, sampling: SamplingConfig) -> Result<Self, FqPackError> {
        if let (Some(start), Some(end)) = (qrange.start, qrange.end) {
            if start == end {
                return Err(FqPackError::InvalidInput(
                    "quality range start must not equal its end".into(),
                ));
            }
        }
        match sampling {
            SamplingConfig::None => {
                return Err(FqPackError::InvalidInput(
                    "read archives require a sampling index".into(),
                ));
            }
            SamplingConfig::Regular(0) | SamplingConfig::Page(0) => {
                return Err(FqPackError::InvalidInput("sampling rate must be nonzero".into()));
            }
            _ => {}
        }
        Ok(ReadEncoder {
            alphabet,
            qrange,
            sampling,
        })
    }

    pub fn sampling(&self) -> SamplingConfig {
        self.sampling
    }

    fn symbol_of(&self, distr_cols: u64, qual_offset: u8, base: u8, qual: u8) -> u64 {
        let mut code = self.alphabet.encode(base);
        if code == WILDCARD {
            code = distr_cols as u8 - 1;
        }
        let q = self.qrange.clamp(qual) - qual_offset;
        q as u64 * distr_cols + code as u64
    }

    /// Analyze all `files` (each a stream of equal-length reads), then
    /// write the archive to `out`.
    pub fn encode<R: ReadSource, W: Write + Seek>(
        &self,
        files: &mut [R],
        mut out: W,
    ) -> Result<(), FqPackError> {
        // distribution pass: joint frequencies and per-file read geometry
        let mut builder = DistrBuilder::new(self.alphabet.size());
        let mut file_infos: Vec<FileInfo> = Vec::with_capacity(files.len());
        let mut total_reads = 0u64;
        for (file_idx, file) in files.iter_mut().enumerate() {
            file.reset()?;
            let mut read_length: Option<u64> = None;
            let mut reads_in_file = 0u64;
            while let Some((seq, qual)) = file.next_read()? {
                if seq.len() != qual.len() {
                    return Err(FqPackError::InvalidInput(
                        "sequence and quality lengths differ".into(),
                    ));
                }
                match read_length {
                    None => read_length = Some(seq.len() as u64),
                    Some(len) if len != seq.len() as u64 => {
                        return Err(FqPackError::InvalidInput(format!(
                            "reads in file {file_idx} have to be of equal length"
                        )));
                    }
                    _ => {}
                }
                builder.add(&self.alphabet, self.qrange, seq, qual)?;
                reads_in_file += 1;
            }
            let Some(read_length) = read_length else {
                return Err(FqPackError::EmptyInput);
            };
            total_reads += reads_in_file;
            file_infos.push(FileInfo {
                cumulative_reads: total_reads,
                read_length,
            });
        }
        let distr = builder.trim()?;
        let huffman = distr.build_huffman();
        log::debug!(
            "joint alphabet of {} symbols, {} coded",
            huffman.num_symbols(),
            huffman.num_coded_symbols()
        );

        // header: file table, distribution leaves, sampling slot
        header::write_file_table(&file_infos, &mut out)?;
        let leaves: Vec<LeafRecord> = huffman
            .leaves()
            .map(|(symbol, freq, _)| {
                let base = (symbol % distr.ncols) as u8;
                LeafRecord {
                    base_char: self.alphabet.decode(base).to_ascii_uppercase(),
                    quality_char: (symbol / distr.ncols) as u8 + distr.qual_offset,
                    freq,
                }
            })
            .collect();
        header::write_leaves(&leaves, &mut out)?;
        let samplingtab_slot = HeaderPlaceholder::reserve(&mut out)?;

        let header_end = out.stream_position()?;
        let start_of_encoding = crate::next_page_boundary(header_end, crate::page_size());
        out.seek(SeekFrom::Start(start_of_encoding))?;

        let mut sampling = match self.sampling {
            SamplingConfig::Regular(rate) => Sampling::new_regular(rate, start_of_encoding),
            SamplingConfig::Page(rate) => Sampling::new_page(rate, start_of_encoding),
            SamplingConfig::None => unreachable!("rejected in new()"),
        };

        // encoding pass
        let page_bits = crate::page_size() * 8;
        let mut bits_left_in_page = page_bits;
        let mut read_counter = 0u64;
        let mut page_counter = 0u64;
        let mut cur_read = 0u64;
        let mut total_symbols = 0u64;
        let mut bitstream = BitWriter::new(&mut out);
        for file in files.iter_mut() {
            file.reset()?;
            while let Some((seq, qual)) = file.next_read()? {
                // dry run: size the read for the sampling decision
                let mut read_bits = 0u64;
                for (&base, &q) in seq.iter().zip(qual.iter()) {
                    let symbol = self.symbol_of(distr.ncols, distr.qual_offset, base, q);
                    read_bits += huffman.encode(symbol).length as u64;
                }

                if sampling.is_next_sample(page_counter, read_counter, read_bits, bits_left_in_page)
                {
                    bitstream.flush_advance()?;
                    let position = bitstream.pos()?;
                    log::debug!("sampling read {cur_read} at offset {position}");
                    sampling.add_sample(position, cur_read);
                    read_counter = 0;
                    page_counter = 0;
                    bits_left_in_page = page_bits;
                }

                for (&base, &q) in seq.iter().zip(qual.iter()) {
                    let symbol = self.symbol_of(distr.ncols, distr.qual_offset, base, q);
                    let code = huffman.encode(symbol);
                    bitstream.append(code.code, code.length)?;
                }

                let mut pending = read_bits;
                while bits_left_in_page < pending {
                    page_counter += 1;
                    pending -= bits_left_in_page;
                    bits_left_in_page = page_bits;
                }
                bits_left_in_page -= pending;
                if page_counter == 0 {
                    page_counter = 1;
                }
                read_counter += 1;
                total_symbols += seq.len() as u64;
                cur_read += 1;
            }
        }
        debug_assert_eq!(cur_read, total_reads);

        bitstream.flush()?;
        let start_of_samplingtab = bitstream.pos()?;
        log::debug!(
            "encoded {total_reads} reads, {total_symbols} symbols, {} bits",
            bitstream.written_bits()
        );
        drop(bitstream);

        sampling.write_to(&mut out)?;
        samplingtab_slot.patch(&mut out, start_of_samplingtab as i64)?;
        Ok(())
    }

    /// Encode descriptions and reads side by side with the same sampling
    /// configuration.
    pub fn encode_paired<R, D, W1, W2>(
        &self,
        files: &mut [R],
        descs: &mut D,
        reads_out: W1,
        descs_out: W2,
    ) -> Result<(), FqPackError>
    where
        R: ReadSource,
        D: DescSource,
        W1: Write + Seek,
        W2: Write + Seek,
    {
        DescEncoder::with_sampling(self.sampling).encode(descs, descs_out)?;
        self.encode(files, reads_out)
    }
}

/// One decoded FASTQ record. `desc` is empty when the archive was opened
/// without a description archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRead {
    pub seq: String,
    pub qual: String,
    pub desc: String,
}

/// File-table key: ordered by the cumulative read count at the file's end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FileKey {
    cumulative_end: u64,
    read_length: u64,
}

/// Random-access reader over a read archive.
pub struct ReadDecoder<A: Alphabet> {
    alphabet: A,
    alphabet_size: u64,
    qual_offset: u8,
    file_infos: Vec<FileInfo>,
    file_table: RbTree<FileKey>,
    num_of_reads: u64,
    sampling: Sampling,
    decoder: StreamingDecoder<MmapChunkSource>,
    cur_read: u64,
    symbols: Vec<u64>,
    desc: Option<DescDecoder>,
}

impl<A: Alphabet> ReadDecoder<A> {
    /// Open a read archive. The alphabet must match the one used to encode.
    pub fn open(path: &Path, alphabet: A) -> Result<Self, FqPackError> {
        Self::open_inner(path, None, alphabet)
    }

    /// Open a read archive together with its description archive; decoded
    /// records then carry their original description.
    pub fn open_with_descs(path: &Path, desc_path: &Path, alphabet: A) -> Result<Self, FqPackError> {
        let desc = DescDecoder::open(desc_path)?;
        Self::open_inner(path, Some(desc), alphabet)
    }

    fn open_inner(path: &Path, desc: Option<DescDecoder>, alphabet: A) -> Result<Self, FqPackError> {
        let mut file = File::open(path)?;
        let file_infos = header::read_file_table(&mut file)?;
        let num_of_reads = file_infos.last().expect("nonempty file table").cumulative_reads;

        let leaves = header::read_leaves(&mut file)?;
        let alphabet_size = alphabet.size() as u64;
        let wildcard_idx = alphabet.size() as u8 - 1;
        let mut builder = DistrBuilder::new(alphabet.size());
        for leaf in &leaves {
            if leaf.quality_char > HIGHEST_QUAL {
                return Err(FqPackError::Inconsistent(
                    "quality character outside the ASCII range".into(),
                ));
            }
            let mut code = alphabet.encode(leaf.base_char);
            if code == WILDCARD {
                code = wildcard_idx;
            }
            builder.set(leaf.quality_char, code, leaf.freq);
        }
        let distr = builder.trim().map_err(|_| {
            FqPackError::Inconsistent("archive distribution is empty".into())
        })?;

        let start_of_samplingtab: i64 = file.read_le()?;
        if start_of_samplingtab <= 0 {
            return Err(FqPackError::Inconsistent("missing sampling table offset".into()));
        }
        let header_end = file.stream_position()?;
        let start_of_encoding = crate::next_page_boundary(header_end, crate::page_size());

        let huffman = distr.build_huffman();
        let qual_offset = distr.qual_offset;
        let source = MmapChunkSource::new(path, start_of_encoding, start_of_samplingtab as u64)?;
        let decoder = StreamingDecoder::new(huffman, source)?;

        file.seek(SeekFrom::Start(start_of_samplingtab as u64))?;
        let sampling = Sampling::read_from(&mut file)?;

        let mut file_table = RbTree::new();
        for info in &file_infos {
            file_table.insert(FileKey {
                cumulative_end: info.cumulative_reads,
                read_length: info.read_length,
            });
        }

        Ok(ReadDecoder {
            alphabet,
            alphabet_size,
            qual_offset,
            file_infos,
            file_table,
            num_of_reads,
            sampling,
            decoder,
            cur_read: 0,
            symbols: Vec::new(),
            desc,
        })
    }

    pub fn num_of_reads(&self) -> u64 {
        self.num_of_reads
    }

    pub fn num_of_files(&self) -> u64 {
        self.file_infos.len() as u64
    }

    /// Read length of all reads in input file `file_idx`.
    pub fn read_length(&self, file_idx: usize) -> u64 {
        self.file_infos[file_idx].read_length
    }

    pub fn has_desc_support(&self) -> bool {
        self.desc.is_some()
    }

    /// Decode the symbols of the read at `cur_read` into the scratch
    /// buffer, hopping to the next sampled page when the read is sampled.
    fn next_read_symbols(&mut self) -> Result<(), FqPackError> {
        debug_assert!(self.cur_read < self.num_of_reads);
        // the file covering this read is the first with a cumulative count
        // beyond it
        let probe = FileKey {
            cumulative_end: self.cur_read,
            read_length: u64::MAX,
        };
        let info = self
            .file_table
            .successor(&probe)
            .ok_or_else(|| FqPackError::Inconsistent("read beyond the file table".into()))?;
        let read_length = info.read_length;

        if self.sampling.peek_next_element() == Some(self.cur_read) {
            let (element, position) = self.sampling.advance_sample().expect("peeked sample");
            log::trace!("hopping to sampled read {element}");
            self.decoder.source_mut().seek(position);
            self.decoder.refill()?;
        }

        self.symbols.clear();
        if !self.decoder.next(&mut self.symbols, read_length)? {
            return Err(FqPackError::TruncatedStream);
        }
        self.cur_read += 1;
        Ok(())
    }

    fn symbols_to_strings(&self) -> (String, String) {
        let mut seq = String::with_capacity(self.symbols.len());
        let mut qual = String::with_capacity(self.symbols.len());
        for &symbol in &self.symbols {
            let base = (symbol % self.alphabet_size) as u8;
            let q = (symbol / self.alphabet_size) as u8 + self.qual_offset;
            seq.push(self.alphabet.decode(base).to_ascii_uppercase() as char);
            qual.push(q as char);
        }
        (seq, qual)
    }

    /// Decode read number `read_num`, seeking through the sampling index if
    /// it is not the next sequential read.
    pub fn decode(&mut self, read_num: u64) -> Result<FastqRead, FqPackError> {
        if read_num >= self.num_of_reads {
            return Err(FqPackError::OutOfRange(read_num, self.num_of_reads));
        }

        if self.cur_read != read_num {
            let (nearest, position) = self.sampling.get_page(read_num);
            if !(nearest <= self.cur_read && self.cur_read <= read_num) {
                log::trace!("seek to sampled read {nearest} at offset {position}");
                self.decoder.source_mut().seek(position);
                self.decoder.refill()?;
                self.cur_read = nearest;
            }
            while self.cur_read < read_num {
                self.next_read_symbols()?;
            }
        }
        self.next_read_symbols()?;
        let (seq, qual) = self.symbols_to_strings();

        let desc = match self.desc.as_mut() {
            Some(desc_decoder) => desc_decoder.decode(read_num)?,
            None => String::new(),
        };
        Ok(FastqRead { seq, qual, desc })
    }

    /// Decode reads `start..=end` and write them as FASTQ text. Without a
    /// description archive the read number stands in for the description.
    pub fn decode_range<W: Write>(
        &mut self,
        start: u64,
        end: u64,
        out: &mut W,
    ) -> Result<(), FqPackError> {
        debug_assert!(start <= end);
        for read_num in start..=end {
            let read = self.decode(read_num)?;
            if self.desc.is_some() {
                writeln!(out, "@{}", read.desc)?;
            }
            else {
                writeln!(out, "@{read_num}")?;
            }
            for chunk in read.seq.as_bytes().chunks(LINE_WIDTH) {
                out.write_all(chunk)?;
                out.write_all(b"\n")?;
            }
            writeln!(out, "+")?;
            for chunk in read.qual.as_bytes().chunks(LINE_WIDTH) {
                out.write_all(chunk)?;
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::DnaAlphabet;

    #[test]
    fn quality_clamping() {
        let qrange = QualRange {
            start: Some(b'#'),
            end: Some(b'I'),
        };
        assert_eq!(qrange.clamp(b'!'), b'#');
        assert_eq!(qrange.clamp(b'#'), b'#');
        assert_eq!(qrange.clamp(b'5'), b'5');
        assert_eq!(qrange.clamp(b'I'), b'I');
        assert_eq!(qrange.clamp(b'Z'), b'I');

        let open = QualRange::default();
        assert_eq!(open.clamp(b'!'), b'!');
    }

    #[test]
    fn degenerate_quality_range_is_rejected() {
        let qrange = QualRange {
            start: Some(b'5'),
            end: Some(b'5'),
        };
        assert!(matches!(
            ReadEncoder::new(DnaAlphabet, qrange, SamplingConfig::Regular(4)),
            Err(FqPackError::InvalidInput(_))
        ));
    }

    #[test]
    fn sampling_is_mandatory() {
        assert!(matches!(
            ReadEncoder::new(DnaAlphabet, QualRange::default(), SamplingConfig::None),
            Err(FqPackError::InvalidInput(_))
        ));
        assert!(matches!(
            ReadEncoder::new(DnaAlphabet, QualRange::default(), SamplingConfig::Page(0)),
            Err(FqPackError::InvalidInput(_))
        ));
    }

    #[test]
    fn joint_symbols_pack_base_and_quality() {
        let encoder =
            ReadEncoder::new(DnaAlphabet, QualRange::default(), SamplingConfig::Regular(4))
                .unwrap();
        let ncols = DnaAlphabet.size() as u64;
        // offset 33 ('!'): quality row 0
        assert_eq!(encoder.symbol_of(ncols, b'!', b'A', b'!'), 0);
        assert_eq!(encoder.symbol_of(ncols, b'!', b'G', b'!'), 2);
        assert_eq!(encoder.symbol_of(ncols, b'!', b'N', b'!'), ncols - 1);
        // one quality step up selects the next row
        assert_eq!(encoder.symbol_of(ncols, b'!', b'C', b'"'), ncols + 1);
    }
}
