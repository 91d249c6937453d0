use std::path::Path;

use log::info;
use rayon::prelude::*;

use super::Classifier;
use crate::error::ReadsError;
use crate::reads::{ReadPair, ReadsWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairBin {
    BothFound,
    FirstOnly,
    SecondOnly,
    NoneFound,
}

impl PairBin {
    pub fn of(found_first: bool, found_second: bool) -> Self {
        match (found_first, found_second) {
            (true, true) => PairBin::BothFound,
            (true, false) => PairBin::FirstOnly,
            (false, true) => PairBin::SecondOnly,
            (false, false) => PairBin::NoneFound,
        }
    }
}

impl Classifier<'_> {
    pub fn classify_pair(&self, (first, second): &ReadPair) -> PairBin {
        let (found_first, found_second) = self.is_pair_found(first, second);
        PairBin::of(found_first, found_second)
    }

    /// Bins of all pairs, in order. Runs on the current rayon pool.
    pub fn classify_pairs(&self, pairs: &[ReadPair]) -> Vec<PairBin> {
        pairs
            .par_iter()
            .map(|pair| self.classify_pair(pair))
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PairStats {
    pub both_found: u64,
    pub first_only: u64,
    pub second_only: u64,
    pub none_found: u64,
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

impl PairStats {
    pub fn from_bins(bins: &[PairBin]) -> Self {
        let mut stats = Self::default();
        for bin in bins {
            match bin {
                PairBin::BothFound => stats.both_found += 1,
                PairBin::FirstOnly => stats.first_only += 1,
                PairBin::SecondOnly => stats.second_only += 1,
                PairBin::NoneFound => stats.none_found += 1,
            }
        }
        stats
    }

    fn split(&self) -> u64 {
        self.first_only + self.second_only
    }

    pub fn total(&self) -> u64 {
        2 * (self.both_found + self.split() + self.none_found)
    }

    /// Reads whose mate got the same verdict.
    pub fn paired(&self) -> u64 {
        2 * (self.both_found + self.none_found)
    }

    pub fn found(&self) -> u64 {
        2 * self.both_found + self.split()
    }

    pub fn not_found(&self) -> u64 {
        2 * self.none_found + self.split()
    }

    pub fn log(&self) {
        let total = self.total();
        info!("|\tTotal: {} reads", total);
        info!("|\tPaired: {} reads", self.paired());
        info!(
            "|\tTotal quality: {:.2} %",
            percentage(self.paired(), total)
        );
        info!("|\tFound: {} reads", self.found());
        info!(
            "|\tPercent of found reads: {:.2} %",
            percentage(self.found(), total)
        );
        info!(
            "|\tQuality of found bin: {:.2} %",
            percentage(2 * self.both_found, self.found())
        );
        info!("|\tNot found: {} reads", self.not_found());
        info!(
            "|\tPercent of not found reads: {:.2} %",
            percentage(self.not_found(), total)
        );
        info!(
            "|\tQuality of not found bin: {:.2} %",
            percentage(2 * self.none_found, self.not_found())
        );
    }
}

/// Writes the six bins into `output_dir`: `found_{1,2}` and `not_found_{1,2}` for pairs
/// whose mates agree, `found_s` and `not_found_s` for the mates of the other pairs.
/// Empty mates are never written.
pub fn write_pair_bins<P: AsRef<Path>>(
    output_dir: P,
    pairs: &[ReadPair],
    bins: &[PairBin],
) -> Result<PairStats, ReadsError> {
    let dir = output_dir.as_ref();
    let mut found_1 = ReadsWriter::create(dir.join("found_1.fastq"))?;
    let mut found_2 = ReadsWriter::create(dir.join("found_2.fastq"))?;
    let mut not_found_1 = ReadsWriter::create(dir.join("not_found_1.fastq"))?;
    let mut not_found_2 = ReadsWriter::create(dir.join("not_found_2.fastq"))?;
    let mut found_s = ReadsWriter::create(dir.join("found_s.fastq"))?;
    let mut not_found_s = ReadsWriter::create(dir.join("not_found_s.fastq"))?;

    for ((first, second), bin) in pairs.iter().zip(bins) {
        let (first_out, second_out) = match bin {
            PairBin::BothFound => (&mut found_1, &mut found_2),
            PairBin::NoneFound => (&mut not_found_1, &mut not_found_2),
            PairBin::FirstOnly => (&mut found_s, &mut not_found_s),
            PairBin::SecondOnly => (&mut not_found_s, &mut found_s),
        };
        if !first.is_empty() {
            first_out.write_fastq(first)?;
        }
        if !second.is_empty() {
            second_out.write_fastq(second)?;
        }
    }

    for writer in [found_1, found_2, not_found_1, not_found_2, found_s, not_found_s] {
        writer.finish()?;
    }
    Ok(PairStats::from_bins(bins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reads::{load_reads, Read};

    fn read(id: &str, seq: &str) -> Read {
        Read::new(id.as_bytes(), seq.as_bytes(), Some(&vec![b'I'; seq.len()]))
    }

    #[test]
    fn test_bin_of() {
        assert_eq!(PairBin::of(true, true), PairBin::BothFound);
        assert_eq!(PairBin::of(true, false), PairBin::FirstOnly);
        assert_eq!(PairBin::of(false, true), PairBin::SecondOnly);
        assert_eq!(PairBin::of(false, false), PairBin::NoneFound);
    }

    #[test]
    fn test_stats() {
        let stats = PairStats::from_bins(&[
            PairBin::BothFound,
            PairBin::BothFound,
            PairBin::FirstOnly,
            PairBin::NoneFound,
        ]);
        assert_eq!(stats.total(), 8);
        assert_eq!(stats.paired(), 6);
        assert_eq!(stats.found(), 5);
        assert_eq!(stats.not_found(), 3);
    }

    #[test]
    fn test_write_bins() {
        let dir = tempfile::tempdir().unwrap();
        let pairs = vec![
            (read("a/1", "ACGT"), read("a/2", "TTGA")),
            (read("b/1", "CCCC"), read("b/2", "GGGG")),
            (read("c/1", "AAAA"), Read::empty()),
        ];
        let bins = [PairBin::BothFound, PairBin::SecondOnly, PairBin::FirstOnly];
        let stats = write_pair_bins(dir.path(), &pairs, &bins).unwrap();
        assert_eq!(stats.both_found, 1);

        let ids = |name: &str| -> Vec<Vec<u8>> {
            load_reads(dir.path().join(name))
                .unwrap()
                .into_iter()
                .map(|read| read.id)
                .collect()
        };
        assert_eq!(ids("found_1.fastq"), vec![b"a/1".to_vec()]);
        assert_eq!(ids("found_2.fastq"), vec![b"a/2".to_vec()]);
        assert_eq!(ids("found_s.fastq"), vec![b"b/2".to_vec(), b"c/1".to_vec()]);
        assert_eq!(ids("not_found_s.fastq"), vec![b"b/1".to_vec()]);
        assert!(std::fs::read(dir.path().join("not_found_1.fastq"))
            .unwrap()
            .is_empty());
    }
}
