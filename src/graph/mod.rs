//! Double-stranded node graph built from a set of canonical k-mers, and its compaction into unitigs.
//!
//! Nodes live in an arena. Node `2i` holds the i-th k-mer and node `2i + 1` its reverse
//! complement; each node knows the index of its partner through `rc`, which stays a
//! pairing after merges. `neighbors` of a node `x` are the nodes `y` such that the
//! sequence of `rc(x)` is followed by the sequence of `y` with a `k - 1` overlap.
//! The relation is symmetric: `y` is a neighbour of `x` iff `x` is a neighbour of `y`.

pub mod coloring;
pub mod combined;
mod report;

pub use report::{Edge, NodeReport};

use ahash::AHashSet;
use bitvec::vec::BitVec;
use log::debug;
use mashmap::MashMap;

use crate::two_bits::{canonical, reverse_complement};
use coloring::Color;

/// Canonical windows of the query sequences.
pub struct SeedSet {
    kmers: AHashSet<Vec<u8>>,
}

impl SeedSet {
    pub fn new<Q: AsRef<[u8]>>(queries: &[Q], k: usize) -> Self {
        let kmers = queries
            .iter()
            .flat_map(|query| query.as_ref().windows(k))
            .map(canonical)
            .collect();
        Self { kmers }
    }

    /// Whether `kmer` or its reverse complement occurs in a query.
    pub fn contains(&self, kmer: &[u8]) -> bool {
        self.kmers.contains(canonical(kmer).as_slice())
    }
}

/// Per k-mer attributes fixed at construction. Two nodes merge only if these are equal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeTags {
    pub is_seed: bool,
    pub color: Option<Color>,
    /// Environments containing the k-mer, when several are combined.
    pub mask: BitVec<u64>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub sequence: Vec<u8>,
    pub id: usize,
    pub tags: NodeTags,
    pub deleted: bool,
    pub neighbors: Vec<usize>,
    pub rc: usize,
}

pub struct Graph {
    k: usize,
    nodes: Vec<Node>,
}

/// `a` followed by `b`, which must overlap by `k - 1` bases.
///
/// # Panics
/// if the overlap does not match, which means the adjacency is broken.
pub fn merge_labels(a: &[u8], b: &[u8], k: usize) -> Vec<u8> {
    let overlap = k - 1;
    if a.len() < overlap || b.len() < overlap || a[a.len() - overlap..] != b[..overlap] {
        panic!(
            "labels should be merged, but can not: {} and {}",
            String::from_utf8_lossy(a),
            String::from_utf8_lossy(b)
        );
    }
    let mut merged = Vec::with_capacity(a.len() + b.len() - overlap);
    merged.extend_from_slice(a);
    merged.extend_from_slice(&b[overlap..]);
    merged
}

impl Graph {
    /// Two nodes per k-mer, linked through their `k - 1` overlaps.
    /// `kmers` are expected canonical and distinct; ids follow their order.
    pub fn from_kmers<K, F>(k: usize, kmers: &[K], tags: F) -> Self
    where
        K: AsRef<[u8]>,
        F: Fn(&[u8]) -> NodeTags,
    {
        let mut nodes = Vec::with_capacity(2 * kmers.len());
        for kmer in kmers {
            let kmer = kmer.as_ref();
            let node_tags = tags(kmer);
            let id = nodes.len();
            nodes.push(Node {
                sequence: kmer.to_vec(),
                id,
                tags: node_tags.clone(),
                deleted: false,
                neighbors: Vec::new(),
                rc: id + 1,
            });
            nodes.push(Node {
                sequence: reverse_complement(kmer),
                id: id + 1,
                tags: node_tags,
                deleted: false,
                neighbors: Vec::new(),
                rc: id,
            });
        }

        let mut by_prefix: MashMap<Vec<u8>, usize> = MashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            by_prefix.insert(node.sequence[..k - 1].to_vec(), i);
        }
        for i in 0..nodes.len() {
            let suffix = nodes[i].sequence[1..].to_vec();
            let mut followers: Vec<usize> = by_prefix.get_iter(&suffix).copied().collect();
            followers.sort_unstable();
            let rc = nodes[i].rc;
            nodes[rc].neighbors.extend(followers);
        }

        Self { k, nodes }
    }

    /// Nodes still alive, one per strand.
    pub fn live_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| !node.deleted)
    }

    /// Number of live strand pairs.
    pub fn len(&self) -> usize {
        self.live_nodes().count() / 2
    }

    fn mergeable(&self, i: usize) -> Option<usize> {
        let node = &self.nodes[i];
        if node.deleted || node.neighbors.len() != 1 {
            return None;
        }
        let other = node.neighbors[0];
        // hairpins and palindromic overlaps
        if other == i || other == node.rc {
            return None;
        }
        let other_node = &self.nodes[other];
        if other_node.neighbors.len() != 1 || other_node.tags != node.tags {
            return None;
        }
        Some(other)
    }

    /// `first_plus` has `second_minus` as single neighbour (and conversely):
    /// `rc(second_minus)` is followed by `first_plus`. The two survivors are
    /// `rc(second_minus)` extended by `first_plus`, and its reverse complement.
    fn merge_nodes(&mut self, first_plus: usize, second_minus: usize) {
        let first_minus = self.nodes[first_plus].rc;
        let second_plus = self.nodes[second_minus].rc;

        let sequence = merge_labels(
            &self.nodes[second_plus].sequence,
            &self.nodes[first_plus].sequence,
            self.k,
        );
        let sequence_rc = merge_labels(
            &self.nodes[first_minus].sequence,
            &self.nodes[second_minus].sequence,
            self.k,
        );

        self.nodes[second_plus].sequence = sequence;
        self.nodes[first_minus].sequence = sequence_rc;
        self.nodes[second_plus].rc = first_minus;
        self.nodes[first_minus].rc = second_plus;

        self.nodes[first_plus].deleted = true;
        self.nodes[second_minus].deleted = true;
    }

    /// Merges linear chains until no merge is possible. Returns the number of merges.
    pub fn compact(&mut self) -> usize {
        let mut merges = 0;
        loop {
            let mut acted = false;
            for i in 0..self.nodes.len() {
                if let Some(other) = self.mergeable(i) {
                    self.merge_nodes(i, other);
                    merges += 1;
                    acted = true;
                }
            }
            if !acted {
                break;
            }
        }
        debug!("{} merges, {} nodes left", merges, self.len());
        merges
    }

    /// Keeps only the nodes connected to a seed node, on either strand.
    /// Returns the number of removed strand pairs.
    pub fn retain_seed_components(&mut self) -> usize {
        let mut kept = vec![false; self.nodes.len()];
        let mut stack = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if !node.deleted && node.tags.is_seed && !kept[i] {
                kept[i] = true;
                kept[node.rc] = true;
                stack.push(i);
                stack.push(node.rc);
            }
        }
        while let Some(current) = stack.pop() {
            for &neighbor in &self.nodes[current].neighbors {
                if kept[neighbor] || self.nodes[neighbor].deleted {
                    continue;
                }
                let rc = self.nodes[neighbor].rc;
                kept[neighbor] = true;
                kept[rc] = true;
                stack.push(neighbor);
                stack.push(rc);
            }
        }
        let mut removed = 0;
        for (node, kept) in self.nodes.iter_mut().zip(kept) {
            if !node.deleted && !kept {
                node.deleted = true;
                removed += 1;
            }
        }
        removed / 2
    }
}
