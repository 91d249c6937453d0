use std::path::Path;

use itertools::Itertools;

use crate::error::ReadsError;
use crate::graph::NodeReport;
use crate::reads::ReadsWriter;

/// Nodes at least `min_length` long, headed `> Id<N> Length:<L> Neighbors:[a, b]`.
/// Returns the number of written sequences.
pub fn write_sequences<P: AsRef<Path>>(
    path: P,
    nodes: &[NodeReport],
    min_length: usize,
) -> Result<u64, ReadsError> {
    let mut writer = ReadsWriter::create(path)?;
    for node in nodes.iter().filter(|node| node.length() >= min_length) {
        let header = format!(
            " Id{} Length:{} Neighbors:[{}]",
            node.id,
            node.length(),
            node.neighbor_ids.iter().join(", ")
        );
        writer.write_fasta(header.as_bytes(), &node.sequence)?;
    }
    writer.finish()
}
