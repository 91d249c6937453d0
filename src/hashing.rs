//! Maps k-mer windows to 64-bit keys.
//!
//! For `k <= 31` the key is the exact 2-bit packing of the canonical k-mer.
//! Larger k-mers (or forced hashing) go through a strand-symmetric hash:
//! the forward and reverse complement encodings are accumulated side by side
//! and the smaller one is kept, so a k-mer and its reverse complement always
//! share a key. Collisions are accepted.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::two_bits::{encode_canonical, ENCODING_TAB_MASKED, MAX_PACKED_K};

const FNV_OFFSET_BASIS: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;
const POLYNOMIAL_BASE: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum HashFunction {
    /// polynomial rolling hash, base 5
    #[value(name = "poly")]
    Polynomial,
    /// FNV-1a, one xor-multiply round per base
    #[value(name = "fnv1a")]
    Fnv1a,
}

impl HashFunction {
    fn hash_window(&self, window: &[u8]) -> u64 {
        match self {
            HashFunction::Polynomial => polynomial_hash(window),
            HashFunction::Fnv1a => fnv1a_hash(window),
        }
    }
}

fn polynomial_hash(window: &[u8]) -> u64 {
    let (mut forward, mut reverse) = (1u64, 1u64);
    for i in 0..window.len() {
        forward = forward.wrapping_mul(POLYNOMIAL_BASE);
        reverse = reverse.wrapping_mul(POLYNOMIAL_BASE);
        forward = forward.wrapping_add(nuc_id(window[i]));
        reverse = reverse.wrapping_add(3 ^ nuc_id(window[window.len() - 1 - i]));
    }
    forward.min(reverse)
}

fn fnv1a_hash(window: &[u8]) -> u64 {
    let (mut forward, mut reverse) = (FNV_OFFSET_BASIS, FNV_OFFSET_BASIS);
    for i in 0..window.len() {
        forward ^= nuc_id(window[i]);
        reverse ^= 3 ^ nuc_id(window[window.len() - 1 - i]);
        forward = forward.wrapping_mul(FNV_PRIME);
        reverse = reverse.wrapping_mul(FNV_PRIME);
    }
    forward.min(reverse)
}

#[inline]
fn nuc_id(base: u8) -> u64 {
    u64::from(ENCODING_TAB_MASKED[base as usize])
}

/// Key strategy for one tool invocation, injected into the index builder,
/// the environment extractor and the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KmerHasher {
    TwoBits { k: usize },
    Hashed { k: usize, function: HashFunction },
}

impl KmerHasher {
    /// Direct packing whenever `k` allows it, unless `force_hashing` is set.
    pub fn new(k: usize, function: HashFunction, force_hashing: bool) -> Self {
        if k <= MAX_PACKED_K && !force_hashing {
            KmerHasher::TwoBits { k }
        } else {
            KmerHasher::Hashed { k, function }
        }
    }

    pub fn k(&self) -> usize {
        match self {
            KmerHasher::TwoBits { k } | KmerHasher::Hashed { k, .. } => *k,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, KmerHasher::TwoBits { .. })
    }

    /// Key of a whole k-mer.
    pub fn hash(&self, kmer: &[u8]) -> u64 {
        debug_assert_eq!(kmer.len(), self.k());
        match self {
            KmerHasher::TwoBits { .. } => encode_canonical(kmer),
            KmerHasher::Hashed { function, .. } => function.hash_window(kmer),
        }
    }

    /// Keys of every k-long window of `sequence`, in order.
    pub fn window_keys<'a>(&'a self, sequence: &'a [u8]) -> impl Iterator<Item = u64> + 'a {
        sequence.windows(self.k()).map(move |window| self.hash(window))
    }
}
