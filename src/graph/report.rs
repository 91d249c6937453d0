use std::collections::BTreeSet;

use bitvec::vec::BitVec;

use super::coloring::Color;
use super::{Graph, Node};

/// A surviving strand pair, as seen by the writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    /// 1-based id of the pair.
    pub id: usize,
    /// `id`, suffixed with `_start` for seed nodes.
    pub label: String,
    pub sequence: Vec<u8>,
    pub is_seed: bool,
    pub color: Option<Color>,
    pub mask: BitVec<u64>,
    /// Pairs adjacent on either strand, without this one.
    pub neighbor_ids: BTreeSet<usize>,
    /// Sum of the counts of the k-long windows.
    pub kmer_coverage: u64,
    /// `kmer_coverage` plus `k - 1` times the count of the last window.
    pub coverage: u64,
}

impl NodeReport {
    pub fn length(&self) -> usize {
        self.sequence.len()
    }
}

/// Link between two oriented pairs, overlapping by `k - 1` bases.
/// A pair is forward when its reported sequence is read as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub source_forward: bool,
    pub target: String,
    pub target_forward: bool,
}

impl Edge {
    /// `-` prefixed label for reverse orientations.
    pub fn signed_source(&self) -> String {
        signed(&self.source, self.source_forward)
    }

    pub fn signed_target(&self) -> String {
        signed(&self.target, self.target_forward)
    }
}

fn signed(label: &str, forward: bool) -> String {
    if forward {
        label.to_string()
    } else {
        format!("-{}", label)
    }
}

impl Graph {
    fn is_reported(&self, node: &Node) -> bool {
        node.id < self.nodes[node.rc].id
    }

    fn pair_id(&self, node: &Node) -> usize {
        node.id.min(self.nodes[node.rc].id) + 1
    }

    fn label(&self, node: &Node) -> String {
        if node.tags.is_seed {
            format!("{}_start", self.pair_id(node))
        } else {
            self.pair_id(node).to_string()
        }
    }

    /// One report per live strand pair, in arena order. `count_of` gives the count of a k-mer.
    pub fn reports<F: Fn(&[u8]) -> u64>(&self, count_of: F) -> Vec<NodeReport> {
        let k = self.k;
        self.live_nodes()
            .filter(|node| self.is_reported(node))
            .map(|node| {
                let id = self.pair_id(node);
                let neighbor_ids = node
                    .neighbors
                    .iter()
                    .chain(&self.nodes[node.rc].neighbors)
                    .map(|&neighbor| self.pair_id(&self.nodes[neighbor]))
                    .filter(|&neighbor_id| neighbor_id != id)
                    .collect();
                let counts: Vec<u64> = node.sequence.windows(k).map(&count_of).collect();
                let kmer_coverage = counts.iter().sum();
                let last = counts.last().copied().unwrap_or(0);
                NodeReport {
                    id,
                    label: self.label(node),
                    sequence: node.sequence.clone(),
                    is_seed: node.tags.is_seed,
                    color: node.tags.color,
                    mask: node.tags.mask.clone(),
                    neighbor_ids,
                    kmer_coverage,
                    coverage: kmer_coverage + last * (k as u64 - 1),
                }
            })
            .collect()
    }

    /// Every link once. A neighbour `y` of `x` stands for `rc(x)` followed by `y`.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.deleted {
                continue;
            }
            let source = &self.nodes[node.rc];
            for &j in node.neighbors.iter().filter(|&&j| i <= j) {
                let target = &self.nodes[j];
                edges.push(Edge {
                    source: self.label(source),
                    source_forward: self.is_reported(source),
                    target: self.label(target),
                    target_forward: self.is_reported(target),
                });
            }
        }
        edges
    }
}
