//! GFA 1 output of a compacted graph.

use std::io::Write;
use std::path::Path;

use crate::error::GraphFileError;
use crate::graph::{Edge, NodeReport};

fn orientation(forward: bool) -> char {
    if forward {
        '+'
    } else {
        '-'
    }
}

/// One `S` line per node and one `L` line per edge.
/// `color_of` may attach a colour, written as both `CL` and `C2` tags.
pub fn write_gfa<P, F>(
    path: P,
    nodes: &[NodeReport],
    edges: &[Edge],
    k: usize,
    color_of: F,
) -> Result<(), GraphFileError>
where
    P: AsRef<Path>,
    F: Fn(&NodeReport) -> Option<String>,
{
    let path = path.as_ref();
    let io_error = super::io_error(path);
    let mut out = super::create(path)?;
    for node in nodes {
        write!(
            out,
            "S\t{}\t{}\tLN:i:{}\tKC:i:{}",
            node.label,
            String::from_utf8_lossy(&node.sequence),
            node.length(),
            node.kmer_coverage
        )
        .map_err(&io_error)?;
        if let Some(color) = color_of(node) {
            write!(out, "\tCL:z:{}\tC2:z:{}", color, color).map_err(&io_error)?;
        }
        writeln!(out).map_err(&io_error)?;
    }
    for edge in edges {
        writeln!(
            out,
            "L\t{}\t{}\t{}\t{}\t{}M",
            edge.source,
            orientation(edge.source_forward),
            edge.target,
            orientation(edge.target_forward),
            k - 1
        )
        .map_err(&io_error)?;
    }
    out.flush().map_err(io_error)
}
