use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;

use crate::error::GraphFileError;
use crate::two_bits::canonical;
use crate::Count;

/// Canonical k-mer -> number of occurrences in the reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subgraph {
    k: usize,
    kmers: AHashMap<Vec<u8>, Count>,
}

impl Subgraph {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            kmers: AHashMap::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.kmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }

    /// Stores `kmer` under its canonical form.
    pub fn insert(&mut self, kmer: &[u8], count: Count) {
        debug_assert_eq!(kmer.len(), self.k);
        self.kmers.insert(canonical(kmer), count);
    }

    pub fn contains(&self, kmer: &[u8]) -> bool {
        self.kmers.contains_key(canonical(kmer).as_slice())
    }

    /// Count of `kmer` in either orientation.
    pub fn get(&self, kmer: &[u8]) -> Option<Count> {
        self.kmers.get(canonical(kmer).as_slice()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], Count)> {
        self.kmers
            .iter()
            .map(|(kmer, count)| (kmer.as_slice(), *count))
    }

    /// Canonical k-mers in lexicographic order.
    pub fn sorted_kmers(&self) -> Vec<&[u8]> {
        let mut kmers: Vec<&[u8]> = self.kmers.keys().map(|kmer| kmer.as_slice()).collect();
        kmers.sort_unstable();
        kmers
    }

    /// Writes one `KMER COUNT` line per k-mer, sorted.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), GraphFileError> {
        let path = path.as_ref();
        let io_error = |source| GraphFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut out = BufWriter::new(File::create(path).map_err(io_error)?);
        for kmer in self.sorted_kmers() {
            out.write_all(kmer).map_err(io_error)?;
            writeln!(out, " {}", self.kmers[kmer]).map_err(io_error)?;
        }
        out.flush().map_err(io_error)
    }

    /// Reads a file written by [`Subgraph::write`]. `k` is the length of the first k-mer.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, GraphFileError> {
        let path = path.as_ref();
        let io_error = |source| GraphFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        let malformed = |line| GraphFileError::Malformed {
            path: path.to_path_buf(),
            line,
        };
        let reader = BufReader::new(File::open(path).map_err(io_error)?);
        let mut subgraph = Subgraph::new(0);
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(io_error)?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (kmer, count) = match (fields.next(), fields.next(), fields.next()) {
                (Some(kmer), Some(count), None) => (kmer.as_bytes(), count),
                _ => return Err(malformed(i + 1)),
            };
            let count: Count = count.parse().map_err(|_| malformed(i + 1))?;
            if subgraph.is_empty() {
                subgraph.k = kmer.len();
            } else if kmer.len() != subgraph.k {
                return Err(malformed(i + 1));
            }
            subgraph.insert(&kmer.to_ascii_uppercase(), count);
        }
        Ok(subgraph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kmers_are_canonical() {
        let mut subgraph = Subgraph::new(3);
        subgraph.insert(b"TTT", 4);
        assert!(subgraph.contains(b"AAA"));
        assert_eq!(subgraph.get(b"TTT"), Some(4));
        assert_eq!(subgraph.sorted_kmers(), vec![b"AAA".as_slice()]);
        subgraph.insert(b"AAA", 5);
        assert_eq!(subgraph.len(), 1);
        assert_eq!(subgraph.get(b"AAA"), Some(5));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.txt");
        let mut subgraph = Subgraph::new(4);
        subgraph.insert(b"ACGT", 3);
        subgraph.insert(b"TTGA", 12);
        subgraph.write(&path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "ACGT 3\nTCAA 12\n"
        );
        assert_eq!(Subgraph::read(&path).unwrap(), subgraph);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.txt");
        std::fs::write(&path, "ACGT 3\nACG 2\n").unwrap();
        assert!(matches!(
            Subgraph::read(&path),
            Err(GraphFileError::Malformed { line: 2, .. })
        ));
        std::fs::write(&path, "ACGT three\n").unwrap();
        assert!(matches!(
            Subgraph::read(&path),
            Err(GraphFileError::Malformed { line: 1, .. })
        ));
    }
}
