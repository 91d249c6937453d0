//! Stopping rules consulted while the breadth-first search grows an environment.

use ahash::AHashMap;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restriction {
    /// No addition once this many k-mers have been visited.
    MaxKmers(usize),
    /// No k-mer further than this many edges from the closest seed.
    MaxRadius(usize),
}

/// Conjunction of restrictions. An addition is allowed only if every restriction allows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationPolicy {
    restrictions: Vec<Restriction>,
}

impl TerminationPolicy {
    pub fn new(restrictions: Vec<Restriction>) -> Result<Self, ConfigError> {
        if restrictions.is_empty() {
            return Err(ConfigError::NoTerminationRestriction);
        }
        Ok(Self { restrictions })
    }

    pub fn from_limits(
        max_kmers: Option<usize>,
        max_radius: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let restrictions = max_kmers
            .map(Restriction::MaxKmers)
            .into_iter()
            .chain(max_radius.map(Restriction::MaxRadius))
            .collect();
        Self::new(restrictions)
    }

    /// Whether `candidate`, at `distance` from the seeds, may join the visited k-mers.
    pub fn allows_addition(
        &self,
        distances: &AHashMap<Vec<u8>, usize>,
        candidate: &[u8],
        distance: usize,
    ) -> bool {
        if distances.contains_key(candidate) {
            return false;
        }
        self.restrictions.iter().all(|restriction| match restriction {
            Restriction::MaxKmers(max) => distances.len() < *max,
            Restriction::MaxRadius(max) => distance <= *max,
        })
    }
}
