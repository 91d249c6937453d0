use std::io::Write;
use std::path::Path;

use crate::error::GraphFileError;
use crate::graph::{Edge, NodeReport};

/// `id length coverage seq`, one node per line.
pub fn write_nodes<P: AsRef<Path>>(path: P, nodes: &[NodeReport]) -> Result<(), GraphFileError> {
    let path = path.as_ref();
    let io_error = super::io_error(path);
    let mut out = super::create(path)?;
    writeln!(out, "id\tlength\tcoverage\tseq").map_err(&io_error)?;
    for node in nodes {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            node.label,
            node.length(),
            node.coverage,
            String::from_utf8_lossy(&node.sequence)
        )
        .map_err(&io_error)?;
    }
    out.flush().map_err(io_error)
}

/// `source target`, with `-` before the ids of reversed nodes.
pub fn write_edges<P: AsRef<Path>>(path: P, edges: &[Edge]) -> Result<(), GraphFileError> {
    let path = path.as_ref();
    let io_error = super::io_error(path);
    let mut out = super::create(path)?;
    writeln!(out, "source\ttarget").map_err(&io_error)?;
    for edge in edges {
        writeln!(out, "{}\t{}", edge.signed_source(), edge.signed_target()).map_err(&io_error)?;
    }
    out.flush().map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_write_tables() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = [NodeReport {
            id: 2,
            label: "2".to_string(),
            sequence: b"ACGTA".to_vec(),
            is_seed: false,
            color: None,
            mask: Default::default(),
            neighbor_ids: BTreeSet::from([1]),
            kmer_coverage: 3,
            coverage: 5,
        }];
        let edges = [Edge {
            source: "1_start".to_string(),
            source_forward: false,
            target: "2".to_string(),
            target_forward: true,
        }];
        write_nodes(dir.path().join("nodes.tsv"), &nodes).unwrap();
        write_edges(dir.path().join("edges.tsv"), &edges).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nodes.tsv")).unwrap(),
            "id\tlength\tcoverage\tseq\n2\t5\t5\tACGTA\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("edges.tsv")).unwrap(),
            "source\ttarget\n-1_start\t2\n"
        );
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nodes.tsv");
        assert!(matches!(
            write_nodes(&path, &[]),
            Err(GraphFileError::Io { .. })
        ));
    }
}
