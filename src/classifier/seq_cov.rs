//! Depth and breadth of known sequences in several bins of reads.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::index::{Built, KmerIndex};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SequenceCoverage {
    /// Mean count of the windows.
    pub depth: f64,
    /// Fraction of the windows with a positive count.
    pub breadth: f64,
}

impl SequenceCoverage {
    /// Sequences shorter than k have no window, and no coverage.
    pub fn of(index: &KmerIndex<Built>, sequence: &[u8]) -> Self {
        let counts = index.window_counts(sequence);
        if counts.is_empty() {
            return Self::default();
        }
        let windows = counts.len() as f64;
        let sum: u64 = counts.iter().map(|&count| count as u64).sum();
        let covered = counts.iter().filter(|&&count| count > 0).count();
        Self {
            depth: sum as f64 / windows,
            breadth: covered as f64 / windows,
        }
    }
}

/// Coverages of every sequence in one bin.
pub struct BinCoverage {
    pub name: String,
    pub coverages: Vec<SequenceCoverage>,
}

impl BinCoverage {
    pub fn new<S: AsRef<[u8]>>(name: &str, index: &KmerIndex<Built>, sequences: &[S]) -> Self {
        Self {
            name: name.to_string(),
            coverages: sequences
                .iter()
                .map(|sequence| SequenceCoverage::of(index, sequence.as_ref()))
                .collect(),
        }
    }
}

/// CSV with a line per sequence: `name,<bin>_depth,<bin>_breadth,...`.
pub fn write_csv<P: AsRef<Path>>(
    path: P,
    names: &[String],
    bins: &[BinCoverage],
) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "name")?;
    for bin in bins {
        write!(out, ",{}_depth,{}_breadth", bin.name, bin.name)?;
    }
    writeln!(out)?;
    for (i, name) in names.iter().enumerate() {
        write!(out, "{}", name)?;
        for bin in bins {
            let coverage = bin.coverages[i];
            write!(out, ",{},{}", coverage.depth, coverage.breadth)?;
        }
        writeln!(out)?;
    }
    out.flush()
}
