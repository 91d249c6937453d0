pub mod computation;

use std::collections::BTreeMap;
use std::io::Write;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::buckets::{bucket_of, Buckets, NB_BUCKETS};
use crate::error::IndexError;
use crate::hashing::KmerHasher;
use crate::two_bits::{acgt_fragments, is_acgt};
use crate::Count;

/// Counts saturate here instead of wrapping.
pub const MAX_COUNT: Count = i16::MAX as Count;

// -- type state pattern
pub trait IndexState: Sync + Send {}

/// Under construction: shards are behind locks and may be incremented from several threads.
pub struct Building {
    counts: Buckets<AHashMap<u64, Count>>,
}

/// Frozen: plain shards, read without any locking.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct Built {
    shards: Vec<AHashMap<u64, Count>>,
}

impl IndexState for Building {}
impl IndexState for Built {}

/// K-mer -> occurrence count table.
/// The key of a k-mer is given by `hasher`, so that a k-mer and its reverse complement share an entry.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct KmerIndex<S> {
    hasher: KmerHasher,
    state: S,
}

impl<S: IndexState> KmerIndex<S> {
    pub fn hasher(&self) -> &KmerHasher {
        &self.hasher
    }

    pub fn k(&self) -> usize {
        self.hasher.k()
    }
}

/// Keys of every window of `sequence` made only of ACGT bases.
pub fn countable_keys(hasher: &KmerHasher, sequence: &[u8], keys: &mut Vec<u64>) {
    for fragment in acgt_fragments(sequence) {
        keys.extend(hasher.window_keys(fragment));
    }
}

impl KmerIndex<Building> {
    pub fn new(hasher: KmerHasher) -> Self {
        Self {
            hasher,
            state: Building {
                counts: Buckets::new(AHashMap::new),
            },
        }
    }

    /// Increments the count of each key (once per occurrence in `keys`).
    /// Keys are grouped by bucket first so that each lock is taken once.
    pub fn count_keys(&self, keys: &[u64]) {
        let mut batches: Vec<Vec<u64>> = vec![Vec::new(); NB_BUCKETS];
        for key in keys {
            batches[bucket_of(*key)].push(*key);
        }
        for (bucket, batch) in batches.iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let mut counts = self.state.counts.write_bucket(bucket);
            for key in batch {
                let count = counts.entry(*key).or_insert(0);
                if *count < MAX_COUNT {
                    *count += 1;
                }
            }
        }
    }

    pub fn count_sequences<S: AsRef<[u8]>>(&self, sequences: &[S]) {
        let mut keys = Vec::new();
        for sequence in sequences {
            countable_keys(&self.hasher, sequence.as_ref(), &mut keys);
        }
        self.count_keys(&keys);
    }

    pub fn freeze(self) -> KmerIndex<Built> {
        KmerIndex {
            hasher: self.hasher,
            state: Built {
                shards: self.state.counts.take_all(),
            },
        }
    }
}

impl KmerIndex<Built> {
    #[inline]
    pub fn get_key(&self, key: u64) -> Count {
        self.state.shards[bucket_of(key)]
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    /// Count of `kmer`, 0 when it is absent or contains a base other than ACGT.
    pub fn get_or_zero(&self, kmer: &[u8]) -> Count {
        if !is_acgt(kmer) {
            return 0;
        }
        self.get_key(self.hasher.hash(kmer))
    }

    /// Count of a k-mer the caller expects to be indexed.
    pub fn get(&self, kmer: &[u8]) -> Result<Count, IndexError> {
        match self.get_or_zero(kmer) {
            0 => Err(IndexError::MissingKmer(
                String::from_utf8_lossy(kmer).into_owned(),
            )),
            count => Ok(count),
        }
    }

    /// Count of every k-long window of `sequence`, in order.
    pub fn window_counts(&self, sequence: &[u8]) -> Vec<Count> {
        sequence
            .windows(self.k())
            .map(|window| self.get_or_zero(window))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.shards.iter().map(|shard| shard.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, Count)> + '_ {
        self.state
            .shards
            .iter()
            .flat_map(|shard| shard.iter().map(|(key, count)| (*key, *count)))
    }

    /// Number of distinct k-mers for each count value.
    pub fn histogram(&self) -> BTreeMap<Count, u64> {
        let mut histogram = BTreeMap::new();
        for (_key, count) in self.iter() {
            *histogram.entry(count).or_insert(0) += 1;
        }
        histogram
    }

    pub fn write_histogram<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for (count, number) in self.histogram() {
            writeln!(out, "{}\t{}", count, number)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashFunction;
    use crate::two_bits::reverse_complement;

    fn build(k: usize, sequences: &[&[u8]]) -> KmerIndex<Built> {
        let index = KmerIndex::<Building>::new(KmerHasher::new(k, HashFunction::Polynomial, false));
        index.count_sequences(sequences);
        index.freeze()
    }

    #[test]
    fn test_empty_index() {
        let index = build(5, &[]);
        assert!(index.is_empty());
        assert_eq!(index.get_or_zero(b"ACGTA"), 0);
        assert!(matches!(
            index.get(b"ACGTA"),
            Err(IndexError::MissingKmer(kmer)) if kmer == "ACGTA"
        ));
    }

    #[test]
    fn test_counts_are_canonical() {
        let read = b"ACGTTGCATG";
        let rc = reverse_complement(read);
        let index = build(4, &[read.as_slice(), rc.as_slice()]);
        for window in read.windows(4) {
            assert_eq!(index.get_or_zero(window), index.get_or_zero(&reverse_complement(window)));
            assert!(index.get_or_zero(window) >= 2);
        }
        assert_eq!(index.get(b"ACGT").unwrap(), index.get_or_zero(b"ACGT"));
    }

    #[test]
    fn test_windows_with_n_are_skipped() {
        let index = build(3, &[b"AACNGTT"]);
        assert_eq!(index.get_or_zero(b"AAC"), 2); // AAC and its reverse complement GTT
        assert_eq!(index.get_or_zero(b"ACN"), 0);
        assert_eq!(index.len(), 1);
        assert_eq!(index.window_counts(b"AACN"), vec![2, 0]);
    }

    #[test]
    fn test_counts_saturate() {
        let index = KmerIndex::<Building>::new(KmerHasher::new(3, HashFunction::Fnv1a, true));
        let key = index.hasher().hash(b"ACG");
        let keys = vec![key; MAX_COUNT as usize + 10];
        index.count_keys(&keys);
        index.count_keys(&[key]);
        let index = index.freeze();
        assert_eq!(index.get_or_zero(b"ACG"), MAX_COUNT);
    }

    #[test]
    fn test_histogram() {
        let index = build(3, &[b"AAAA", b"CCGCC"]);
        // AAA twice, then CCG, CGC and GCC once each
        let histogram = index.histogram();
        assert_eq!(histogram.get(&2), Some(&1));
        assert_eq!(histogram.get(&1), Some(&3));
        let mut out = Vec::new();
        index.write_histogram(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\t3\n2\t1\n");
        assert_eq!(index.iter().count(), index.len());
    }
}
