//! Loading and writing of whole reads, for the tools that keep them in memory
//! (queries of the environment finder, reads to classify).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use needletail::parse_fastx_file;
use needletail::parser::{write_fasta, write_fastq, LineEnding};

use crate::error::ReadsError;

/// Phred scores are stored with this ASCII offset.
pub const PHRED_OFFSET: u8 = 33;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Read {
    pub id: Vec<u8>,
    /// Upper-cased bases.
    pub seq: Vec<u8>,
    /// `None` for FASTA records.
    pub qual: Option<Vec<u8>>,
}

impl Read {
    pub fn new(id: &[u8], seq: &[u8], qual: Option<&[u8]>) -> Self {
        Self {
            id: id.to_vec(),
            seq: seq.to_ascii_uppercase(),
            qual: qual.map(|qual| qual.to_vec()),
        }
    }

    /// Stand-in for the missing mate of a single-end read.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Positions whose Phred quality is strictly below `min_quality`.
    /// Reads without qualities have none.
    pub fn low_quality_positions(&self, min_quality: u8) -> Vec<usize> {
        match &self.qual {
            None => Vec::new(),
            Some(qual) => qual
                .iter()
                .enumerate()
                .filter(|(_, q)| q.saturating_sub(PHRED_OFFSET) < min_quality)
                .map(|(i, _)| i)
                .collect(),
        }
    }
}

pub type ReadPair = (Read, Read);

fn parse_error(path: &Path) -> impl Fn(needletail::errors::ParseError) -> ReadsError + '_ {
    move |source| ReadsError::Parse {
        path: path.to_path_buf(),
        source,
    }
}

/// All records of a FASTA/FASTQ file (optionally compressed).
pub fn load_reads<P: AsRef<Path>>(path: P) -> Result<Vec<Read>, ReadsError> {
    let path = path.as_ref();
    let mut reader = parse_fastx_file(path).map_err(parse_error(path))?;
    let mut reads = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(parse_error(path))?;
        reads.push(Read::new(record.id(), &record.seq(), record.qual()));
    }
    info!("{} reads loaded from {}", reads.len(), path.display());
    Ok(reads)
}

/// Reads of `first` paired in order with those of `second`.
/// Without `second`, every read gets an empty mate.
pub fn load_pairs<P: AsRef<Path>>(first: P, second: Option<P>) -> Result<Vec<ReadPair>, ReadsError> {
    let first_reads = load_reads(&first)?;
    let second_reads = match &second {
        Some(path) => load_reads(path)?,
        None => return Ok(first_reads.into_iter().map(|read| (read, Read::empty())).collect()),
    };
    if first_reads.len() != second_reads.len() {
        return Err(ReadsError::UnpairedFiles {
            first: first.as_ref().to_path_buf(),
            second: second
                .map(|path| path.as_ref().to_path_buf())
                .unwrap_or_default(),
            first_len: first_reads.len(),
            second_len: second_reads.len(),
        });
    }
    Ok(first_reads.into_iter().zip(second_reads).collect())
}

/// Buffered FASTQ (or FASTA) output file.
pub struct ReadsWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: u64,
}

impl ReadsWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ReadsError> {
        let path = path.as_ref().to_path_buf();
        let out = BufWriter::new(File::create(&path)?);
        Ok(Self {
            path,
            out,
            written: 0,
        })
    }

    /// Writes a FASTQ record. Reads without qualities get a constant quality line.
    pub fn write_fastq(&mut self, read: &Read) -> Result<(), ReadsError> {
        write_fastq(
            &read.id,
            &read.seq,
            read.qual.as_deref(),
            &mut self.out,
            LineEnding::Unix,
        )
        .map_err(|source| ReadsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        self.written += 1;
        Ok(())
    }

    pub fn write_fasta(&mut self, id: &[u8], seq: &[u8]) -> Result<(), ReadsError> {
        write_fasta(id, seq, &mut self.out, LineEnding::Unix).map_err(|source| {
            ReadsError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64, ReadsError> {
        self.out.flush()?;
        Ok(self.written)
    }
}
