//! Decides whether a read belongs to the reads an index was built from.
//!
//! The per-window counts of the read give its mean depth and the breadth of its coverage.
//! Under a Poisson model a depth `m` should cover a fraction `1 - e^-m` of the read;
//! a read is found when its breadth is high enough and close enough to that expectation.

mod pairs;
pub mod seq_cov;
mod triple;

pub use pairs::{write_pair_bins, PairStats};
pub use triple::{check_k_order, write_triple_bins};

use crate::error::ConfigError;
use crate::index::{Built, KmerIndex};
use crate::reads::Read;
use crate::two_bits::NUCLEOTIDES;
use crate::Count;

/// z-score of a ~68% normal interval.
pub const Z_DEFAULT: f64 = 1.0;
/// z-score of a 95% normal interval.
pub const Z_95: f64 = 1.96;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Minimum breadth of a found read, in `[0, 1]`.
    pub found_threshold: f64,
    /// Minimum breadth of a half found read (three-way classification).
    pub half_threshold: f64,
    pub z: f64,
    /// Try the four bases at the single low quality position of a read.
    pub correction: bool,
    /// Phred scores below this are low quality.
    pub min_quality: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            found_threshold: 0.9,
            half_threshold: 0.4,
            z: Z_DEFAULT,
            correction: false,
            min_quality: 10,
        }
    }
}

fn fraction(percentage: u8) -> Result<f64, ConfigError> {
    if percentage > 100 {
        return Err(ConfigError::InvalidPercentage(percentage));
    }
    Ok(percentage as f64 / 100.0)
}

impl ClassifierConfig {
    /// Thresholds are given in percents.
    pub fn new(
        found_threshold: u8,
        half_threshold: u8,
        interval95: bool,
        correction: bool,
        min_quality: u8,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            found_threshold: fraction(found_threshold)?,
            half_threshold: fraction(half_threshold)?,
            z: if interval95 { Z_95 } else { Z_DEFAULT },
            correction,
            min_quality,
        })
    }
}

/// Depth and breadth of the coverage of a read by the windows of an index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageProfile {
    pub mean_depth: f64,
    pub breadth: f64,
    pub length: usize,
}

impl CoverageProfile {
    /// `counts` are the counts of the `length - k + 1` windows of the read.
    /// The last window stands for the `k - 1` bases no other window starts at.
    /// `None` when the read is shorter than `k`.
    pub fn new(counts: &[Count], length: usize, k: usize) -> Option<Self> {
        let last = *counts.last()?;
        let sum: u64 = counts.iter().map(|&count| count as u64).sum();
        let covered = counts.iter().filter(|&&count| count > 0).count();
        let closing = if last > 0 { k - 1 } else { 0 };
        Some(Self {
            mean_depth: (sum + last as u64 * (k as u64 - 1)) as f64 / length as f64,
            breadth: (covered + closing) as f64 / length as f64,
            length,
        })
    }

    pub fn theoretical_breadth(&self) -> f64 {
        1.0 - (-self.mean_depth).exp()
    }

    /// Whether the breadth lies in the normal approximation interval around the theoretical breadth.
    /// A full breadth is always accepted, an empty one never.
    pub fn fits_model(&self, z: f64) -> bool {
        if self.breadth == 1.0 {
            return true;
        }
        if self.breadth == 0.0 {
            return false;
        }
        let uncovered = (-self.mean_depth).exp();
        let deviation = z * (uncovered * (1.0 - uncovered) / self.length as f64).sqrt();
        (self.breadth - self.theoretical_breadth()).abs() <= deviation
    }

    pub fn is_found(&self, found_threshold: f64, z: f64) -> bool {
        self.breadth >= found_threshold && self.fits_model(z)
    }
}

pub struct Classifier<'a> {
    index: &'a KmerIndex<Built>,
    config: &'a ClassifierConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(index: &'a KmerIndex<Built>, config: &'a ClassifierConfig) -> Self {
        Self { index, config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        self.config
    }

    pub fn profile(&self, sequence: &[u8]) -> Option<CoverageProfile> {
        CoverageProfile::new(
            &self.index.window_counts(sequence),
            sequence.len(),
            self.index.k(),
        )
    }

    /// 0 for sequences shorter than k.
    pub fn breadth(&self, sequence: &[u8]) -> f64 {
        self.profile(sequence)
            .map(|profile| profile.breadth)
            .unwrap_or(0.0)
    }

    fn is_sequence_found(&self, sequence: &[u8]) -> bool {
        self.profile(sequence).is_some_and(|profile| {
            profile.is_found(self.config.found_threshold, self.config.z)
        })
    }

    /// With correction enabled, a read with exactly one low quality base is found
    /// if one of the four bases at that position makes it found.
    pub fn is_found(&self, read: &Read) -> bool {
        if read.len() < self.index.k() {
            return false;
        }
        if !self.config.correction {
            return self.is_sequence_found(&read.seq);
        }
        match read.low_quality_positions(self.config.min_quality).as_slice() {
            &[position] => {
                let mut corrected = read.seq.clone();
                NUCLEOTIDES.iter().any(|&nucleotide| {
                    corrected[position] = nucleotide;
                    self.is_sequence_found(&corrected)
                })
            }
            _ => self.is_sequence_found(&read.seq),
        }
    }

    /// Verdicts of both mates. An empty mate gets the opposite verdict of the first read.
    pub fn is_pair_found(&self, first: &Read, second: &Read) -> (bool, bool) {
        let found_first = self.is_found(first);
        let found_second = if second.is_empty() {
            !found_first
        } else {
            self.is_found(second)
        };
        (found_first, found_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::{HashFunction, KmerHasher};
    use crate::index::Building;
    use approx::assert_relative_eq;

    const READ: &[u8] = b"GATTACAGGCTTCAGCATCGGTACCGTTAGCAAGTCCTGAACGTTGCAGT";

    fn index_of(sequences: &[&[u8]], k: usize) -> KmerIndex<Built> {
        let index = KmerIndex::<Building>::new(KmerHasher::new(k, HashFunction::Polynomial, false));
        index.count_sequences(sequences);
        index.freeze()
    }

    fn read_with_error(position: usize, low_quality: &[usize]) -> Read {
        let mut seq = READ.to_vec();
        seq[position] = if seq[position] == b'A' { b'C' } else { b'A' };
        let mut qual = vec![b'I'; seq.len()];
        for &i in low_quality {
            qual[i] = b'#';
        }
        Read::new(b"read", &seq, Some(&qual))
    }

    #[test]
    fn test_profile() {
        let profile = CoverageProfile::new(&[1, 2, 3], 5, 3).unwrap();
        assert_relative_eq!(profile.mean_depth, 2.4);
        assert_relative_eq!(profile.breadth, 1.0);
        assert_relative_eq!(profile.theoretical_breadth(), 1.0 - (-2.4f64).exp());

        let profile = CoverageProfile::new(&[2, 0, 0], 5, 3).unwrap();
        assert_relative_eq!(profile.mean_depth, 0.4);
        assert_relative_eq!(profile.breadth, 0.2);

        assert_eq!(CoverageProfile::new(&[], 2, 3), None);
    }

    #[test]
    fn test_full_breadth_is_always_found() {
        let profile = CoverageProfile::new(&[1, 1, 1], 5, 3).unwrap();
        assert_relative_eq!(profile.breadth, 1.0);
        assert!(profile.is_found(0.9, Z_DEFAULT));
        let profile = CoverageProfile::new(&[1000, 1000, 1000], 5, 3).unwrap();
        assert!(profile.is_found(0.9, Z_DEFAULT));
    }

    #[test]
    fn test_no_coverage_is_not_found() {
        let profile = CoverageProfile::new(&[0; 48], 50, 3).unwrap();
        assert_relative_eq!(profile.mean_depth, 0.0);
        assert_relative_eq!(profile.theoretical_breadth(), 0.0);
        assert!(!profile.fits_model(Z_DEFAULT));
        assert!(!profile.is_found(0.0, Z_DEFAULT));
    }

    #[test]
    fn test_breadth_close_to_the_model() {
        // depth 2.3 explains a breadth of 0.9
        let mut counts = vec![0; 10];
        counts.extend([3; 50]);
        counts.extend([2; 38]);
        let profile = CoverageProfile::new(&counts, 100, 3).unwrap();
        assert_relative_eq!(profile.mean_depth, 2.3);
        assert_relative_eq!(profile.breadth, 0.9);
        assert!(profile.is_found(0.9, Z_DEFAULT));
        assert!(!profile.is_found(0.95, Z_DEFAULT));
    }

    #[test]
    fn test_wider_interval() {
        // depth 1.8 predicts 0.83 instead of 0.9
        let mut counts = vec![0; 10];
        counts.extend([2; 88]);
        let profile = CoverageProfile::new(&counts, 100, 3).unwrap();
        assert!(!profile.is_found(0.9, Z_DEFAULT));
        assert!(profile.is_found(0.9, Z_95));
    }

    #[test]
    fn test_uniform_coverage_is_found() {
        let index = index_of(&[READ; 5], 21);
        let config = ClassifierConfig::default();
        let classifier = Classifier::new(&index, &config);
        let profile = classifier.profile(READ).unwrap();
        assert_relative_eq!(profile.mean_depth, 5.0);
        assert_relative_eq!(profile.breadth, 1.0);
        assert!(classifier.is_found(&Read::new(b"r", READ, None)));
        assert!(!classifier.is_found(&Read::new(b"r", &READ[..20], None)));
        assert!(!classifier.is_found(&Read::new(b"r", b"ACGTTTGACCAGTAGGACCATTAAGGCA", None)));
    }

    #[test]
    fn test_correction() {
        let index = index_of(&[READ; 5], 21);
        let config = ClassifierConfig::default();
        let classifier = Classifier::new(&index, &config);
        let read = read_with_error(25, &[25]);
        assert!(!classifier.is_found(&read));

        let config = ClassifierConfig {
            correction: true,
            ..ClassifierConfig::default()
        };
        let classifier = Classifier::new(&index, &config);
        assert!(classifier.is_found(&read));
        // only reads with a single low quality base are corrected
        assert!(!classifier.is_found(&read_with_error(25, &[25, 40])));
        assert!(!classifier.is_found(&read_with_error(25, &[])));
    }

    #[test]
    fn test_empty_mate() {
        let index = index_of(&[READ; 5], 21);
        let config = ClassifierConfig::default();
        let classifier = Classifier::new(&index, &config);
        let found = Read::new(b"r", READ, None);
        let not_found = Read::new(b"r", b"ACGTTTGACCAGTAGGACCATTAAGGCA", None);
        assert_eq!(classifier.is_pair_found(&found, &Read::empty()), (true, false));
        assert_eq!(classifier.is_pair_found(&not_found, &Read::empty()), (false, true));
        assert_eq!(classifier.is_pair_found(&found, &found), (true, true));
    }

    #[test]
    fn test_thresholds_are_percentages() {
        assert_eq!(
            ClassifierConfig::new(101, 40, false, false, 10),
            Err(ConfigError::InvalidPercentage(101))
        );
        let config = ClassifierConfig::new(80, 30, true, false, 10).unwrap();
        assert_relative_eq!(config.found_threshold, 0.8);
        assert_relative_eq!(config.z, Z_95);
    }
}
