mod common;

use std::fs::OpenOptions;
use std::path::Path;

use fqpack::alphabet::DnaAlphabet;
use fqpack::reads::{QualRange, ReadDecoder, ReadEncoder};
use fqpack::sampling::SamplingConfig;
use fqpack::sources::{SliceDescSource, SliceReadSource};
use fqpack::FqPackError;

use common::{init, read_corpus, scratch_dir};

fn encode_files(
    path: &Path,
    files: &[Vec<(Vec<u8>, Vec<u8>)>],
    qrange: QualRange,
    sampling: SamplingConfig,
) {
    let mut sources: Vec<SliceReadSource> =
        files.iter().map(|reads| SliceReadSource::new(reads.clone())).collect();
    let out = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .expect("create archive");
    ReadEncoder::new(DnaAlphabet, qrange, sampling)
        .unwrap()
        .encode(&mut sources, out)
        .expect("encode reads");
}

#[test]
fn two_file_archive_round_trips() {
    init();
    let scratch = scratch_dir();
    let path = scratch.path.join("twofiles.hcr");
    let file1 = vec![(b"ACGTN".to_vec(), b"!!!!!".to_vec())];
    let file2 = vec![
        (b"ACGT".to_vec(), b"ABCD".to_vec()),
        (b"GGGG".to_vec(), b"DCBA".to_vec()),
    ];
    encode_files(
        &path,
        &[file1, file2],
        QualRange::default(),
        SamplingConfig::Regular(2),
    );

    let mut decoder = ReadDecoder::open(&path, DnaAlphabet).unwrap();
    assert_eq!(decoder.num_of_reads(), 3);
    assert_eq!(decoder.num_of_files(), 2);
    assert_eq!(decoder.read_length(0), 5);
    assert_eq!(decoder.read_length(1), 4);
    assert!(!decoder.has_desc_support());

    let read = decoder.decode(0).unwrap();
    assert_eq!((read.seq.as_str(), read.qual.as_str(), read.desc.as_str()), ("ACGTN", "!!!!!", ""));
    let read = decoder.decode(2).unwrap();
    assert_eq!((read.seq.as_str(), read.qual.as_str()), ("GGGG", "DCBA"));
    let read = decoder.decode(1).unwrap();
    assert_eq!((read.seq.as_str(), read.qual.as_str()), ("ACGT", "ABCD"));
}

#[test]
fn mismatched_read_lengths_are_rejected() {
    init();
    let scratch = scratch_dir();
    let path = scratch.path.join("mismatch.hcr");
    let mut sources = vec![SliceReadSource::new(vec![
        (b"ACGT".to_vec(), b"!!!!".to_vec()),
        (b"ACGTA".to_vec(), b"!!!!!".to_vec()),
    ])];
    let out = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .unwrap();
    let result = ReadEncoder::new(DnaAlphabet, QualRange::default(), SamplingConfig::Regular(4))
        .unwrap()
        .encode(&mut sources, out);
    assert!(matches!(result, Err(FqPackError::InvalidInput(_))));
}

#[test]
fn quality_clamp_applies_on_both_ends() {
    init();
    let scratch = scratch_dir();
    let path = scratch.path.join("clamped.hcr");
    let reads = vec![
        (b"ACGT".to_vec(), b"!#IZ".to_vec()),
        (b"TGCA".to_vec(), b"ZZ!!".to_vec()),
    ];
    let qrange = QualRange {
        start: Some(b'#'),
        end: Some(b'I'),
    };
    encode_files(&path, &[reads], qrange, SamplingConfig::Regular(4));

    let mut decoder = ReadDecoder::open(&path, DnaAlphabet).unwrap();
    let read = decoder.decode(0).unwrap();
    assert_eq!(read.seq, "ACGT");
    assert_eq!(read.qual, "##II");
    let read = decoder.decode(1).unwrap();
    assert_eq!(read.qual, "II##");
}

#[test]
fn corpus_random_access_matches_sequential() {
    init();
    let scratch = scratch_dir();
    let path = scratch.path.join("corpus.hcr");
    let file1 = read_corpus(180, 50, 3);
    let file2 = read_corpus(140, 36, 4);
    encode_files(
        &path,
        &[file1.clone(), file2.clone()],
        QualRange::default(),
        SamplingConfig::Regular(16),
    );

    let all: Vec<&(Vec<u8>, Vec<u8>)> = file1.iter().chain(file2.iter()).collect();

    // sequential walk
    let mut decoder = ReadDecoder::open(&path, DnaAlphabet).unwrap();
    assert_eq!(decoder.num_of_reads(), 320);
    for (i, (seq, qual)) in all.iter().enumerate() {
        let read = decoder.decode(i as u64).unwrap();
        assert_eq!(read.seq.as_bytes(), &seq[..], "seq of read {i}");
        assert_eq!(read.qual.as_bytes(), &qual[..], "qual of read {i}");
    }

    // fresh decoders jumping straight to n
    for n in [319u64, 0, 179, 180, 200, 15, 16, 17] {
        let mut decoder = ReadDecoder::open(&path, DnaAlphabet).unwrap();
        let read = decoder.decode(n).unwrap();
        assert_eq!(read.seq.as_bytes(), &all[n as usize].0[..], "seq of read {n}");
        assert_eq!(read.qual.as_bytes(), &all[n as usize].1[..], "qual of read {n}");
    }

    // one decoder hopping around
    let mut decoder = ReadDecoder::open(&path, DnaAlphabet).unwrap();
    let mut rng = common::seeded_rng(9);
    use rand::Rng;
    for _ in 0..60 {
        let n = rng.gen_range(0..320u64);
        let read = decoder.decode(n).unwrap();
        assert_eq!(read.seq.as_bytes(), &all[n as usize].0[..], "seq of read {n}");
        assert_eq!(read.qual.as_bytes(), &all[n as usize].1[..], "qual of read {n}");
    }
}

#[test]
fn page_sampling_round_trips() {
    init();
    let scratch = scratch_dir();
    let path = scratch.path.join("pages.hcr");
    let reads = read_corpus(2500, 80, 7);
    encode_files(
        &path,
        &[reads.clone()],
        QualRange::default(),
        SamplingConfig::Page(1),
    );

    let mut decoder = ReadDecoder::open(&path, DnaAlphabet).unwrap();
    for n in [2499u64, 0, 1250, 900, 2400, 1] {
        let read = decoder.decode(n).unwrap();
        assert_eq!(read.seq.as_bytes(), &reads[n as usize].0[..], "seq of read {n}");
        assert_eq!(read.qual.as_bytes(), &reads[n as usize].1[..], "qual of read {n}");
    }
}

#[test]
fn paired_archives_carry_descriptions() {
    init();
    let scratch = scratch_dir();
    let reads_path = scratch.path.join("paired.hcr");
    let descs_path = scratch.path.join("paired.ede");

    let reads = read_corpus(60, 30, 13);
    let descs: Vec<String> = (0..60).map(|i| format!("read_{i} pos={}", 500 + 3 * i)).collect();

    let mut read_sources = vec![SliceReadSource::new(reads.clone())];
    let mut desc_source = SliceDescSource::new(descs.iter().cloned());
    let reads_out = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&reads_path)
        .unwrap();
    let descs_out = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&descs_path)
        .unwrap();
    ReadEncoder::new(DnaAlphabet, QualRange::default(), SamplingConfig::Regular(8))
        .unwrap()
        .encode_paired(&mut read_sources, &mut desc_source, reads_out, descs_out)
        .unwrap();

    let mut decoder = ReadDecoder::open_with_descs(&reads_path, &descs_path, DnaAlphabet).unwrap();
    assert!(decoder.has_desc_support());
    for n in [0u64, 42, 7, 59] {
        let read = decoder.decode(n).unwrap();
        assert_eq!(read.desc, descs[n as usize], "desc of read {n}");
        assert_eq!(read.seq.as_bytes(), &reads[n as usize].0[..]);
    }
}

#[test]
fn decode_range_formats_fastq() {
    init();
    let scratch = scratch_dir();
    let path = scratch.path.join("range.hcr");
    let reads = vec![
        (b"ACGT".to_vec(), b"IIII".to_vec()),
        (b"TTTT".to_vec(), b"!!!!".to_vec()),
        (b"NGCA".to_vec(), b"AB!I".to_vec()),
    ];
    encode_files(&path, &[reads], QualRange::default(), SamplingConfig::Regular(4));

    let mut decoder = ReadDecoder::open(&path, DnaAlphabet).unwrap();
    let mut out = Vec::new();
    decoder.decode_range(0, 2, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        "@0\nACGT\n+\nIIII\n@1\nTTTT\n+\n!!!!\n@2\nNGCA\n+\nAB!I\n"
    );

    // long reads wrap at 80 columns
    let long_path = scratch.path.join("long.hcr");
    let long_reads = vec![(vec![b'A'; 100], vec![b'I'; 100])];
    encode_files(&long_path, &[long_reads], QualRange::default(), SamplingConfig::Regular(4));
    let mut decoder = ReadDecoder::open(&long_path, DnaAlphabet).unwrap();
    let mut out = Vec::new();
    decoder.decode_range(0, 0, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "@0");
    assert_eq!(lines[1].len(), 80);
    assert_eq!(lines[2].len(), 20);
    assert_eq!(lines[3], "+");
    assert_eq!(lines[4].len(), 80);
    assert_eq!(lines[5].len(), 20);
}

#[test]
fn decode_out_of_range_errors() {
    init();
    let scratch = scratch_dir();
    let path = scratch.path.join("oob.hcr");
    let reads = vec![(b"ACGT".to_vec(), b"IIII".to_vec())];
    encode_files(&path, &[reads], QualRange::default(), SamplingConfig::Regular(4));

    let mut decoder = ReadDecoder::open(&path, DnaAlphabet).unwrap();
    assert!(matches!(decoder.decode(1), Err(FqPackError::OutOfRange(1, 1))));
}
