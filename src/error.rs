use std::path::PathBuf;

use thiserror::Error;

use crate::hashing::KmerHasher;
use crate::Count;

/// Problems with the command line or with the combination of inputs, detected before any work starts.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one of --max-kmers and --max-radius should be set")]
    NoTerminationRestriction,
    #[error("k-mer size {0} is not supported (expected 1..=63)")]
    InvalidK(usize),
    #[error("second k-mer size ({k2}) must be larger than the first one ({k})")]
    SecondKTooSmall { k: usize, k2: usize },
    #[error("the number of threads must be positive")]
    NoThreads,
    #[error("threshold {0} is not a percentage")]
    InvalidPercentage(u8),
    #[error("no environment given")]
    NoEnvironment,
    #[error("at most {max} environments can be combined, got {got}")]
    TooManyEnvironments { max: usize, got: usize },
    #[error("environments have different k-mer lengths ({0} and {1})")]
    MismatchingK(usize, usize),
    #[error("gene id {id} is out of range (the file has {count} sequences)")]
    GeneIdOutOfRange { id: usize, count: usize },
    #[error("either reads or a dumped index must be given")]
    NoKmerSource,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("could not read {path}: {source}")]
    Parse {
        path: PathBuf,
        source: needletail::errors::ParseError,
    },
    #[error("could not start the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("index construction was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("k-mer {0} is not in the index")]
    MissingKmer(String),
    #[error("could not access the index file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not (de)serialize the index: {0}")]
    Serde(#[from] bincode::Error),
    #[error("the dumped index was built with {found:?}, but {expected:?} was requested")]
    HasherMismatch {
        expected: KmerHasher,
        found: KmerHasher,
    },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    /// None of the query windows reaches the minimum number of occurrences.
    #[error("could not find any k-mers of the target sequence with at least {min_occurrences} occurrences")]
    NoSeed { min_occurrences: Count },
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Error, Debug)]
pub enum ReadsError {
    #[error("could not read {path}: {source}")]
    Parse {
        path: PathBuf,
        source: needletail::errors::ParseError,
    },
    #[error("{first} and {second} do not hold the same number of reads ({first_len} vs {second_len})")]
    UnpairedFiles {
        first: PathBuf,
        second: PathBuf,
        first_len: usize,
        second_len: usize,
    },
    #[error("could not write reads: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum GraphFileError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}, line {line}: expected `KMER COUNT`")]
    Malformed { path: PathBuf, line: usize },
}

/// Failure while writing the outputs of one environment.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Graph(#[from] GraphFileError),
    #[error(transparent)]
    Reads(#[from] ReadsError),
    #[error("could not create the output directory: {0}")]
    Io(#[from] std::io::Error),
}
