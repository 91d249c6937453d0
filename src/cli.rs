use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::classifier::ClassifierConfig;
use crate::environment::{Direction, ExtractionConfig};
use crate::error::ConfigError;
use crate::hashing::{HashFunction, KmerHasher};
use crate::index::computation::CountingConfig;
use crate::termination::TerminationPolicy;
use crate::Count;

/// Largest supported k-mer size.
pub const MAX_K: usize = 63;

#[derive(Parser, Debug)]
#[command(name = "envfinder")]
#[command(
    about = "Environments of sequences in the k-mer graph of reads, and classification of reads against such graphs",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count the k-mers of read files and dump them
    Count(CountArgs),
    /// Extract, compact and write the environment of every query sequence
    Environment(EnvironmentArgs),
    /// Combine environments of the same gene into one coloured graph
    MultiEnvironment(MultiEnvironmentArgs),
    /// Keep the reads that share enough k-mers with an environment
    FilterReads(FilterReadsArgs),
    /// Sort pairs of reads by whether they belong to a k-mer graph
    Classify(ClassifyArgs),
    /// Sort pairs of reads into found, half found and not found with two k-mer sizes
    TripleClassify(TripleClassifyArgs),
    /// Depth and breadth of sequences in several bins of reads
    SeqCov(SeqCovArgs),
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// How k-mers are read and keyed.
#[derive(Args, Debug, Clone)]
pub struct KmerArgs {
    /// k-mer size
    #[arg(short = 'k', long, value_name = "INT")]
    pub k: usize,

    /// Hash function for k > 31 (or with --force-hash)
    #[arg(long, value_enum, default_value_t = HashFunction::Polynomial)]
    pub hash: HashFunction,

    /// Hash k-mers even when they fit in 64 bits
    #[arg(long)]
    pub force_hash: bool,

    /// Number of worker threads
    #[arg(short = 't', long, value_name = "INT", default_value_t = default_threads())]
    pub threads: usize,

    /// Reads shorter than this are ignored when counting
    #[arg(long, value_name = "INT", default_value_t = 0)]
    pub min_length: usize,
}

impl KmerArgs {
    pub fn hasher_for(&self, k: usize) -> Result<KmerHasher, ConfigError> {
        if k == 0 || k > MAX_K {
            return Err(ConfigError::InvalidK(k));
        }
        Ok(KmerHasher::new(k, self.hash, self.force_hash))
    }

    pub fn counting_config(&self, k: usize) -> Result<CountingConfig, ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        Ok(CountingConfig {
            hasher: self.hasher_for(k)?,
            min_sequence_length: self.min_length,
            threads: self.threads,
        })
    }
}

/// Where the k-mer counts come from: reads, or an index dumped by `count`.
#[derive(Args, Debug, Clone)]
pub struct KmerSource {
    /// FASTA/FASTQ files of reads to count k-mers from
    #[arg(short = 'i', long, value_name = "FILES", num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Index dumped by `count`, used instead of the reads
    #[arg(long, value_name = "FILE", conflicts_with = "input")]
    pub index: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CountArgs {
    #[command(flatten)]
    pub kmers: KmerArgs,

    /// FASTA/FASTQ files of reads
    #[arg(short = 'i', long = "input", value_name = "FILES", num_args = 1.., required = true)]
    pub reads: Vec<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, value_name = "DIR", default_value = "kmers")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct EnvironmentArgs {
    #[command(flatten)]
    pub kmers: KmerArgs,

    #[command(flatten)]
    pub source: KmerSource,

    /// FASTA file with the query sequences
    #[arg(short = 's', long = "seq", value_name = "FILE")]
    pub queries: PathBuf,

    /// Output directory, with a subdirectory per query when there are several
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: PathBuf,

    /// Maximum number of k-mers in an environment
    #[arg(long, value_name = "INT")]
    pub max_kmers: Option<usize>,

    /// Maximum distance, in k-mers, from the query
    #[arg(long, value_name = "INT")]
    pub max_radius: Option<usize>,

    /// Minimum number of occurrences of a k-mer in the reads
    #[arg(long, value_name = "INT", default_value_t = 1)]
    pub coverage: Count,

    /// Neighbours followed by the search
    #[arg(long, value_enum, default_value_t = Direction::BothSeparately)]
    pub direction: Direction,

    /// Drop the branches not stopped by --max-kmers or --max-radius
    #[arg(long)]
    pub trim: bool,

    /// Minimum length of the nodes written to seqs.fasta
    #[arg(long, value_name = "INT", default_value_t = 1)]
    pub chunk_length: usize,

    /// Search the environment of all queries at once
    #[arg(long)]
    pub merge_queries: bool,

    /// Keep only the nodes connected to the query
    #[arg(long)]
    pub seed_component_only: bool,

    /// Colour nodes after two environments (graph.txt files)
    #[arg(long, value_names = ["FIRST", "SECOND"], num_args = 2)]
    pub colour_by: Option<Vec<PathBuf>>,
}

impl EnvironmentArgs {
    pub fn extraction_config(&self) -> Result<ExtractionConfig, ConfigError> {
        Ok(ExtractionConfig {
            min_occurrences: self.coverage,
            direction: self.direction,
            policy: TerminationPolicy::from_limits(self.max_kmers, self.max_radius)?,
            trim_paths: self.trim,
        })
    }
}

#[derive(Args, Debug)]
pub struct MultiEnvironmentArgs {
    /// Environments to combine (graph.txt files)
    #[arg(long = "env", value_name = "FILES", num_args = 1.., required = true)]
    pub environments: Vec<PathBuf>,

    /// FASTA file with the gene
    #[arg(short = 's', long = "seq", value_name = "FILE")]
    pub genes: PathBuf,

    /// 1-based index of the gene in the FASTA file
    #[arg(short = 'g', long, value_name = "INT", default_value_t = 1)]
    pub gene_id: usize,

    /// Minimum length of the nodes written to seqs.fasta
    #[arg(long, value_name = "INT", default_value_t = 1)]
    pub chunk_length: usize,

    /// Output directory
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct FilterReadsArgs {
    /// Environment written by `environment` (graph.txt)
    #[arg(long = "env", value_name = "FILE")]
    pub environment: PathBuf,

    /// FASTA/FASTQ files of reads to filter
    #[arg(short = 'r', long = "reads", value_name = "FILES", num_args = 1.., required = true)]
    pub reads: Vec<PathBuf>,

    /// Minimum share of the windows of a read found in the environment, in percents
    #[arg(short = 'f', long, value_name = "INT", default_value_t = 1)]
    pub percent: u8,

    /// Number of worker threads
    #[arg(short = 't', long, value_name = "INT", default_value_t = default_threads())]
    pub threads: usize,

    /// Output directory, with one FASTA file per reads file
    #[arg(short = 'o', long, value_name = "DIR", default_value = "filtered_reads")]
    pub output_dir: PathBuf,
}

/// Thresholds shared by both classifiers.
#[derive(Args, Debug, Clone)]
pub struct ClassifierArgs {
    /// Reads to classify: one file, or the two files of a paired library
    #[arg(short = 'r', long = "reads", value_name = "FILES", num_args = 1..=2, required = true)]
    pub reads: Vec<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, value_name = "DIR", default_value = "reads_classifier")]
    pub output_dir: PathBuf,

    /// Try the four bases at the position of reads with a single low quality base
    #[arg(long)]
    pub correction: bool,

    /// Phred score under which a base is low quality
    #[arg(long, value_name = "INT", default_value_t = 10)]
    pub min_quality: u8,

    /// Use a 95% interval instead of a ~68% one
    #[arg(long)]
    pub interval95: bool,

    /// Minimum coverage breadth of a found read, in percents
    #[arg(long, value_name = "INT", default_value_t = 90)]
    pub found_threshold: u8,

    /// Minimum coverage breadth of a half found read, in percents
    #[arg(long, value_name = "INT", default_value_t = 40)]
    pub half_threshold: u8,
}

impl ClassifierArgs {
    pub fn config(&self) -> Result<ClassifierConfig, ConfigError> {
        ClassifierConfig::new(
            self.found_threshold,
            self.half_threshold,
            self.interval95,
            self.correction,
            self.min_quality,
        )
    }
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub kmers: KmerArgs,

    #[command(flatten)]
    pub source: KmerSource,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

#[derive(Args, Debug)]
pub struct TripleClassifyArgs {
    #[command(flatten)]
    pub kmers: KmerArgs,

    /// Second k-mer size, larger than k
    #[arg(long, value_name = "INT")]
    pub k2: usize,

    #[command(flatten)]
    pub source: KmerSource,

    /// Index dumped by `count` with k2, used instead of the reads for the second pass
    #[arg(long, value_name = "FILE")]
    pub index2: Option<PathBuf>,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

/// A named bin of reads, given as `NAME=FILE[,FILE...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadsBin {
    pub name: String,
    pub files: Vec<PathBuf>,
}

pub fn parse_bin(value: &str) -> Result<ReadsBin, String> {
    let (name, files) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=FILE[,FILE...], got `{}`", value))?;
    if name.is_empty() || files.is_empty() {
        return Err(format!("expected NAME=FILE[,FILE...], got `{}`", value));
    }
    Ok(ReadsBin {
        name: name.to_string(),
        files: files.split(',').map(PathBuf::from).collect(),
    })
}

#[derive(Args, Debug)]
pub struct SeqCovArgs {
    #[command(flatten)]
    pub kmers: KmerArgs,

    /// Bins of reads, as NAME=FILE[,FILE...]
    #[arg(long = "bin", value_name = "NAME=FILES", value_parser = parse_bin, required = true)]
    pub bins: Vec<ReadsBin>,

    /// FASTA file with the sequences
    #[arg(short = 's', long = "seq", value_name = "FILE")]
    pub sequences: PathBuf,

    /// Output directory
    #[arg(short = 'o', long, value_name = "DIR", default_value = "sequence_coverage")]
    pub output_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_environment_arguments() {
        let cli = Cli::try_parse_from([
            "envfinder",
            "environment",
            "-k",
            "21",
            "-i",
            "reads_1.fq",
            "reads_2.fq",
            "--seq",
            "gene.fasta",
            "-o",
            "out",
            "--max-radius",
            "100",
        ])
        .unwrap();
        let Command::Environment(args) = cli.command else {
            panic!("expected the environment command");
        };
        assert_eq!(args.source.input.len(), 2);
        assert_eq!(args.coverage, 1);
        assert_eq!(args.direction, Direction::BothSeparately);
        let config = args.extraction_config().unwrap();
        assert_eq!(
            config.policy,
            TerminationPolicy::from_limits(None, Some(100)).unwrap()
        );
        assert!(args.kmers.hasher_for(args.kmers.k).unwrap().is_exact());
    }

    #[test]
    fn test_missing_restriction() {
        let cli = Cli::try_parse_from([
            "envfinder", "environment", "-k", "21", "-i", "r.fq", "-s", "g.fa", "-o", "out",
        ])
        .unwrap();
        let Command::Environment(args) = cli.command else {
            panic!("expected the environment command");
        };
        assert_eq!(
            args.extraction_config().unwrap_err(),
            ConfigError::NoTerminationRestriction
        );
    }

    #[test]
    fn test_hasher_choice() {
        let cli = Cli::try_parse_from([
            "envfinder", "count", "-k", "41", "--hash", "fnv1a", "-i", "r.fq",
        ])
        .unwrap();
        let Command::Count(args) = cli.command else {
            panic!("expected the count command");
        };
        assert_eq!(
            args.kmers.hasher_for(args.kmers.k).unwrap(),
            KmerHasher::Hashed {
                k: 41,
                function: HashFunction::Fnv1a
            }
        );
        assert_eq!(args.kmers.hasher_for(64), Err(ConfigError::InvalidK(64)));
    }

    #[test]
    fn test_filter_reads_arguments() {
        let cli = Cli::try_parse_from([
            "envfinder", "filter-reads", "--env", "out/graph.txt", "-r", "a.fq", "b.fq",
        ])
        .unwrap();
        let Command::FilterReads(args) = cli.command else {
            panic!("expected the filter-reads command");
        };
        assert_eq!(args.reads.len(), 2);
        assert_eq!(args.percent, 1);
        assert_eq!(args.output_dir, PathBuf::from("filtered_reads"));
    }

    #[test]
    fn test_parse_bin() {
        assert_eq!(
            parse_bin("donor=a.fq,b.fq").unwrap(),
            ReadsBin {
                name: "donor".to_string(),
                files: vec![PathBuf::from("a.fq"), PathBuf::from("b.fq")],
            }
        );
        assert!(parse_bin("donor").is_err());
        assert!(parse_bin("=a.fq").is_err());
    }
}
