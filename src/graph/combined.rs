//! One graph over several environments of the same gene.

use bitvec::vec::BitVec;
use itertools::Itertools;

use super::{Graph, NodeTags, SeedSet};
use crate::environment::Subgraph;
use crate::error::ConfigError;

/// A mask has one bit per environment.
pub const MAX_ENVIRONMENTS: usize = 64;

pub fn check_environments(environments: &[Subgraph]) -> Result<usize, ConfigError> {
    let first = environments.first().ok_or(ConfigError::NoEnvironment)?;
    if environments.len() > MAX_ENVIRONMENTS {
        return Err(ConfigError::TooManyEnvironments {
            max: MAX_ENVIRONMENTS,
            got: environments.len(),
        });
    }
    if let Some(other) = environments
        .iter()
        .find(|environment| !environment.is_empty() && environment.k() != first.k())
    {
        return Err(ConfigError::MismatchingK(first.k(), other.k()));
    }
    Ok(first.k())
}

/// Environments containing `kmer`.
pub fn membership(environments: &[Subgraph], kmer: &[u8]) -> BitVec<u64> {
    environments
        .iter()
        .map(|environment| environment.contains(kmer))
        .collect()
}

/// Sum of the counts of `kmer` in all environments.
pub fn summed_count(environments: &[Subgraph], kmer: &[u8]) -> u64 {
    environments
        .iter()
        .filter_map(|environment| environment.get(kmer))
        .map(u64::from)
        .sum()
}

/// Graph of the union of the k-mers of `environments`. Nodes are tagged with their
/// membership mask and with whether they occur in `gene`, so that compaction only merges
/// k-mers shared by the same environments.
pub fn combine(environments: &[Subgraph], gene: &[u8]) -> Result<Graph, ConfigError> {
    let k = check_environments(environments)?;
    let seeds = SeedSet::new(&[gene], k);
    let kmers: Vec<&[u8]> = environments
        .iter()
        .flat_map(|environment| environment.iter().map(|(kmer, _)| kmer))
        .sorted_unstable()
        .dedup()
        .collect();
    Ok(Graph::from_kmers(k, &kmers, |kmer| NodeTags {
        is_seed: seeds.contains(kmer),
        color: None,
        mask: membership(environments, kmer),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitvec::prelude::*;

    fn environment(sequences: &[&[u8]], k: usize, count: u16) -> Subgraph {
        let mut subgraph = Subgraph::new(k);
        for sequence in sequences {
            for kmer in sequence.windows(k) {
                subgraph.insert(kmer, count);
            }
        }
        subgraph
    }

    #[test]
    fn test_checks() {
        assert_eq!(check_environments(&[]), Err(ConfigError::NoEnvironment));
        let too_many = vec![Subgraph::new(3); 65];
        assert_eq!(
            check_environments(&too_many),
            Err(ConfigError::TooManyEnvironments { max: 64, got: 65 })
        );
        let mismatching = [environment(&[b"ACGT"], 3, 1), environment(&[b"ACGT"], 4, 1)];
        assert_eq!(
            check_environments(&mismatching),
            Err(ConfigError::MismatchingK(3, 4))
        );
    }

    #[test]
    fn test_masks_split_unitigs() {
        let k = 5;
        let first = environment(&[b"ACGGTCATTG"], k, 2);
        let second = environment(&[b"ACGGTCA"], k, 3);
        let environments = [first, second];
        assert_eq!(membership(&environments, b"ACGGT"), bitvec![u64, Lsb0; 1, 1]);
        assert_eq!(membership(&environments, b"CATTG"), bitvec![u64, Lsb0; 1, 0]);
        assert_eq!(summed_count(&environments, b"ACGGT"), 5);
        assert_eq!(summed_count(&environments, b"CATTG"), 2);

        let mut graph = combine(&environments, b"TTTTT").unwrap();
        assert_eq!(graph.len(), 6);
        graph.compact();
        // shared part, then the part of the first environment only
        assert_eq!(graph.len(), 2);
        let reports = graph.reports(|kmer| summed_count(&environments, kmer));
        let lengths: Vec<usize> = reports.iter().map(|report| report.length()).sorted().collect();
        assert_eq!(lengths, vec![7, 7]);
        assert!(reports.iter().all(|report| !report.is_seed));
    }
}
