//! Three-way classification of pairs, from two indexes built with `k < k2`.
//!
//! The first pass runs with `k` and remembers, for every read, whether it was found,
//! half found (breadth above the half threshold) or not found. The second pass runs with
//! `k2` and combines its verdict with the remembered one.

use std::path::Path;

use log::info;
use rayon::prelude::*;

use super::Classifier;
use crate::error::{ConfigError, ReadsError};
use crate::reads::{Read, ReadPair, ReadsWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Found,
    HalfFound,
    NotFound,
}

/// Verdict of the second pass: `found` and `breadth` with `k2`, `at_k` from the first pass.
pub fn combine_presences(found: bool, breadth: f64, at_k: Presence, half_threshold: f64) -> Presence {
    match (found, at_k) {
        (true, Presence::Found) => Presence::Found,
        (true, _) | (_, Presence::Found) => Presence::HalfFound,
        (false, Presence::HalfFound) if breadth >= half_threshold => Presence::HalfFound,
        _ => Presence::NotFound,
    }
}

pub fn check_k_order(k: usize, k2: usize) -> Result<(), ConfigError> {
    if k2 <= k {
        return Err(ConfigError::SecondKTooSmall { k, k2 });
    }
    Ok(())
}

impl Classifier<'_> {
    fn first_pass_presence(&self, read: &Read, found: bool) -> Presence {
        if found {
            Presence::Found
        } else if self.breadth(&read.seq) >= self.config().half_threshold {
            Presence::HalfFound
        } else {
            Presence::NotFound
        }
    }

    /// Presences of the mates of every pair with this classifier's k.
    pub fn first_pass(&self, pairs: &[ReadPair]) -> Vec<(Presence, Presence)> {
        pairs
            .par_iter()
            .map(|(first, second)| {
                let (found_first, found_second) = self.is_pair_found(first, second);
                (
                    self.first_pass_presence(first, found_first),
                    self.first_pass_presence(second, found_second),
                )
            })
            .collect()
    }

    /// Final presences, from this classifier's k2 and the presences of the first pass.
    pub fn second_pass(
        &self,
        pairs: &[ReadPair],
        at_k: &[(Presence, Presence)],
    ) -> Vec<(Presence, Presence)> {
        let half_threshold = self.config().half_threshold;
        pairs
            .par_iter()
            .zip(at_k.par_iter())
            .map(|((first, second), &(first_at_k, second_at_k))| {
                let (found_first, found_second) = self.is_pair_found(first, second);
                (
                    combine_presences(found_first, self.breadth(&first.seq), first_at_k, half_threshold),
                    combine_presences(found_second, self.breadth(&second.seq), second_at_k, half_threshold),
                )
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TripleStats {
    pub both_found: u64,
    pub both_half_found: u64,
    pub both_not_found: u64,
    pub single_found: u64,
    pub single_half_found: u64,
    pub single_not_found: u64,
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

impl TripleStats {
    pub fn total(&self) -> u64 {
        2 * (self.both_found + self.both_half_found + self.both_not_found)
            + self.single_found
            + self.single_half_found
            + self.single_not_found
    }

    pub fn paired(&self) -> u64 {
        2 * (self.both_found + self.both_half_found + self.both_not_found)
    }

    pub fn found(&self) -> u64 {
        2 * self.both_found + self.single_found
    }

    pub fn half_found(&self) -> u64 {
        2 * self.both_half_found + self.single_half_found
    }

    pub fn not_found(&self) -> u64 {
        2 * self.both_not_found + self.single_not_found
    }

    pub fn log(&self) {
        let total = self.total();
        info!("|\tTotal: {} reads", total);
        info!("|\tPaired: {} reads", self.paired());
        info!("|\tTotal quality: {:.2} %", percentage(self.paired(), total));
        let bins = [
            ("found", self.found(), self.both_found),
            ("half found", self.half_found(), self.both_half_found),
            ("not found", self.not_found(), self.both_not_found),
        ];
        for (name, reads, pairs) in bins {
            info!("|\t{}: {} reads", name, reads);
            info!(
                "|\tPercent of {} reads: {:.2} %",
                name,
                percentage(reads, total)
            );
            info!(
                "|\tQuality of {} bin: {:.2} %",
                name,
                percentage(2 * pairs, reads)
            );
        }
    }
}

/// Writes `found_{1,2}`, `half_found_{1,2}` and `not_found_{1,2}` for pairs whose mates
/// agree, and `found_s`, `half_found_s`, `not_found_s` for the mates of the other pairs.
/// Empty mates are never written.
pub fn write_triple_bins<P: AsRef<Path>>(
    output_dir: P,
    pairs: &[ReadPair],
    presences: &[(Presence, Presence)],
) -> Result<TripleStats, ReadsError> {
    let dir = output_dir.as_ref();
    let create = |name: &str| ReadsWriter::create(dir.join(format!("{}.fastq", name)));
    // indexed by presence: paired first mates, paired second mates, singles
    let mut paired_first = [create("found_1")?, create("half_found_1")?, create("not_found_1")?];
    let mut paired_second = [create("found_2")?, create("half_found_2")?, create("not_found_2")?];
    let mut singles = [create("found_s")?, create("half_found_s")?, create("not_found_s")?];
    let slot = |presence: Presence| match presence {
        Presence::Found => 0,
        Presence::HalfFound => 1,
        Presence::NotFound => 2,
    };

    fn write(writer: &mut ReadsWriter, read: &Read) -> Result<(), ReadsError> {
        if !read.is_empty() {
            writer.write_fastq(read)?;
        }
        Ok(())
    }

    let mut stats = TripleStats::default();
    for ((first, second), &(first_presence, second_presence)) in pairs.iter().zip(presences) {
        if first_presence == second_presence {
            let i = slot(first_presence);
            write(&mut paired_first[i], first)?;
            write(&mut paired_second[i], second)?;
            match first_presence {
                Presence::Found => stats.both_found += 1,
                Presence::HalfFound => stats.both_half_found += 1,
                Presence::NotFound => stats.both_not_found += 1,
            }
        } else {
            for (read, presence) in [(first, first_presence), (second, second_presence)] {
                write(&mut singles[slot(presence)], read)?;
                match presence {
                    Presence::Found => stats.single_found += 1,
                    Presence::HalfFound => stats.single_half_found += 1,
                    Presence::NotFound => stats.single_not_found += 1,
                }
            }
        }
    }

    for writer in paired_first.into_iter().chain(paired_second).chain(singles) {
        writer.finish()?;
    }
    Ok(stats)
}
