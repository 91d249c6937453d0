//! Breadth-first extraction of the neighbourhood of query sequences in the k-mer graph of the reads.
//!
//! The search starts from every query window present in the index, walks the implicit
//! de Bruijn graph of the index until the termination policy stops it, optionally trims
//! the branches that never reached the boundary, then extends the result along
//! unambiguous single neighbours.

mod filter;
mod subgraph;

pub use filter::ReadsFilter;
pub use subgraph::Subgraph;

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use clap::ValueEnum;
use log::{debug, info};

use crate::error::ExtractionError;
use crate::index::{Built, KmerIndex};
use crate::termination::TerminationPolicy;
use crate::two_bits::{all_neighbors, canonical, left_neighbors, right_neighbors};
use crate::Count;

/// Which neighbours the search follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Direction {
    /// right extensions only
    Forward,
    /// left extensions only
    Backward,
    /// left and right extensions in a single search
    Both,
    /// a backward search, then an independent forward search from the same seeds
    #[default]
    BothSeparately,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Left,
    Right,
    Any,
}

impl Step {
    fn neighbors(&self, kmer: &[u8]) -> Vec<Vec<u8>> {
        match self {
            Step::Left => left_neighbors(kmer).into(),
            Step::Right => right_neighbors(kmer).into(),
            Step::Any => all_neighbors(kmer),
        }
    }

    fn opposite(&self) -> Step {
        match self {
            Step::Left => Step::Right,
            Step::Right => Step::Left,
            Step::Any => Step::Any,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// K-mers seen fewer times in the reads are ignored.
    pub min_occurrences: Count,
    pub direction: Direction,
    pub policy: TerminationPolicy,
    /// Drop the branches that were not stopped by the policy.
    pub trim_paths: bool,
}

pub struct EnvironmentExtractor<'a> {
    index: &'a KmerIndex<Built>,
    config: &'a ExtractionConfig,
}

impl<'a> EnvironmentExtractor<'a> {
    pub fn new(index: &'a KmerIndex<Built>, config: &'a ExtractionConfig) -> Self {
        Self { index, config }
    }

    fn is_solid(&self, kmer: &[u8]) -> bool {
        self.index.get_or_zero(kmer) >= self.config.min_occurrences
    }

    /// Environment of `queries`, searched as a single seed set.
    pub fn extract<Q: AsRef<[u8]>>(&self, queries: &[Q]) -> Result<Subgraph, ExtractionError> {
        let mut subgraph = Subgraph::new(self.index.k());
        match self.config.direction {
            Direction::Forward => self.run_bfs(queries, Step::Right, &mut subgraph)?,
            Direction::Backward => self.run_bfs(queries, Step::Left, &mut subgraph)?,
            Direction::Both => self.run_bfs(queries, Step::Any, &mut subgraph)?,
            Direction::BothSeparately => {
                self.run_bfs(queries, Step::Left, &mut subgraph)?;
                self.run_bfs(queries, Step::Right, &mut subgraph)?;
            }
        }
        let added = self.extend(&mut subgraph)?;
        info!("extending endings by {} k-mers", added);
        Ok(subgraph)
    }

    fn seeds<Q: AsRef<[u8]>>(&self, queries: &[Q]) -> Vec<Vec<u8>> {
        let k = self.index.k();
        let mut seen = AHashSet::new();
        queries
            .iter()
            .flat_map(|query| query.as_ref().windows(k))
            .filter(|window| self.is_solid(window))
            .filter(|window| seen.insert(window.to_vec()))
            .map(|window| window.to_vec())
            .collect()
    }

    fn run_bfs<Q: AsRef<[u8]>>(
        &self,
        queries: &[Q],
        step: Step,
        subgraph: &mut Subgraph,
    ) -> Result<(), ExtractionError> {
        let seeds = self.seeds(queries);
        if seeds.is_empty() {
            return Err(ExtractionError::NoSeed {
                min_occurrences: self.config.min_occurrences,
            });
        }
        let mut distances: AHashMap<Vec<u8>, usize> =
            seeds.iter().map(|seed| (seed.clone(), 0)).collect();
        let mut queue: VecDeque<Vec<u8>> = seeds.into();
        let mut last_kmers: AHashSet<Vec<u8>> = AHashSet::new();

        while let Some(kmer) = queue.pop_front() {
            let distance = distances[&kmer];
            for neighbor in step.neighbors(&kmer) {
                if !self.is_solid(&neighbor) {
                    continue;
                }
                if self
                    .config
                    .policy
                    .allows_addition(&distances, &neighbor, distance + 1)
                {
                    distances.insert(neighbor.clone(), distance + 1);
                    queue.push_back(neighbor);
                } else {
                    last_kmers.insert(kmer.clone());
                }
            }
        }
        debug!(
            "search {:?} visited {} k-mers, {} on the boundary",
            step,
            distances.len(),
            last_kmers.len()
        );

        if self.config.trim_paths {
            trim_paths(&last_kmers, &mut distances, step);
        }
        for kmer in distances.keys() {
            subgraph.insert(kmer, self.index.get(kmer)?);
        }
        Ok(())
    }

    /// Follows, from every k-mer of the subgraph, the chain of unique solid neighbours
    /// not yet in the subgraph. Returns the number of k-mers added.
    fn extend(&self, subgraph: &mut Subgraph) -> Result<usize, ExtractionError> {
        let starts: Vec<Vec<u8>> = subgraph
            .sorted_kmers()
            .into_iter()
            .map(|kmer| kmer.to_vec())
            .collect();
        let mut additions: AHashSet<Vec<u8>> = AHashSet::new();

        for start in starts {
            let mut kmer = start;
            loop {
                let mut candidates: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
                for neighbor in all_neighbors(&kmer) {
                    let key = canonical(&neighbor);
                    if subgraph.contains(&key)
                        || additions.contains(&key)
                        || candidates.iter().any(|(other, _)| *other == key)
                    {
                        continue;
                    }
                    if self.is_solid(&neighbor) {
                        candidates.push((key, neighbor));
                    }
                }
                match candidates.pop() {
                    Some((key, neighbor)) if candidates.is_empty() => {
                        additions.insert(key);
                        kmer = neighbor;
                    }
                    _ => break,
                }
            }
        }

        let added = additions.len();
        for kmer in additions {
            subgraph.insert(&kmer, self.index.get(&kmer)?);
        }
        Ok(added)
    }
}

/// Keeps only the visited k-mers reachable backwards from a k-mer where the policy stopped the search.
fn trim_paths(last_kmers: &AHashSet<Vec<u8>>, distances: &mut AHashMap<Vec<u8>, usize>, step: Step) {
    let mut reached: AHashSet<Vec<u8>> = last_kmers.clone();
    let mut queue: VecDeque<Vec<u8>> = last_kmers.iter().cloned().collect();
    while let Some(kmer) = queue.pop_front() {
        for neighbor in step.opposite().neighbors(&kmer) {
            if distances.contains_key(&neighbor) && !reached.contains(&neighbor) {
                reached.insert(neighbor.clone());
                queue.push_back(neighbor);
            }
        }
    }
    distances.retain(|kmer, _| reached.contains(kmer));
}
