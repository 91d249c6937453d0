use std::path::Path;

use rayon::prelude::*;

use crate::environment::Subgraph;
use crate::error::{ConfigError, ReadsError};
use crate::reads::{load_reads, ReadsWriter};

/// Keeps the reads sharing at least `percent`% of their windows with an environment.
pub struct ReadsFilter<'a> {
    subgraph: &'a Subgraph,
    percent: u8,
}

impl<'a> ReadsFilter<'a> {
    pub fn new(subgraph: &'a Subgraph, percent: u8) -> Result<Self, ConfigError> {
        if percent == 0 || percent > 100 {
            return Err(ConfigError::InvalidPercentage(percent));
        }
        Ok(Self { subgraph, percent })
    }

    /// Windows of a read of `length` bases that must be in the environment, at least one.
    fn required_hits(&self, length: usize) -> usize {
        let windows = (length + 1).saturating_sub(self.subgraph.k());
        (windows * self.percent as usize / 100).max(1)
    }

    pub fn accepts(&self, seq: &[u8]) -> bool {
        let k = self.subgraph.k();
        if self.subgraph.is_empty() || seq.len() < k {
            return false;
        }
        let required = self.required_hits(seq.len());
        seq.windows(k)
            .filter(|window| self.subgraph.contains(window))
            .take(required)
            .count()
            == required
    }

    /// Copies the accepted reads of `input` into the FASTA file `output`.
    /// Returns the number of reads read and the number written.
    pub fn filter_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<(usize, u64), ReadsError> {
        let reads = load_reads(input)?;
        let accepted: Vec<bool> = reads.par_iter().map(|read| self.accepts(&read.seq)).collect();
        let mut out = ReadsWriter::create(output)?;
        for (read, _) in reads.iter().zip(accepted).filter(|(_, accepted)| *accepted) {
            out.write_fasta(&read.id, &read.seq)?;
        }
        Ok((reads.len(), out.finish()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment(k: usize, sequence: &[u8]) -> Subgraph {
        let mut subgraph = Subgraph::new(k);
        for window in sequence.windows(k) {
            subgraph.insert(window, 1);
        }
        subgraph
    }

    #[test]
    fn test_invalid_percentage() {
        let subgraph = environment(3, b"ACGT");
        assert!(matches!(
            ReadsFilter::new(&subgraph, 0),
            Err(ConfigError::InvalidPercentage(0))
        ));
        assert!(matches!(
            ReadsFilter::new(&subgraph, 101),
            Err(ConfigError::InvalidPercentage(101))
        ));
    }

    #[test]
    fn test_required_hits() {
        let subgraph = environment(5, b"GATTACA");
        let filter = ReadsFilter::new(&subgraph, 50).unwrap();
        assert_eq!(filter.required_hits(14), 5);
        assert_eq!(filter.required_hits(5), 1);
        assert_eq!(filter.required_hits(3), 1);
    }

    #[test]
    fn test_accepts() {
        let subgraph = environment(5, b"GATTACAGGC");
        let one_hit = ReadsFilter::new(&subgraph, 1).unwrap();
        // a single shared window is enough at 1%
        assert!(one_hit.accepts(b"TTTTTTTGATTA"));
        // the environment is strand-free
        assert!(one_hit.accepts(b"GCCTGTAATC"));
        assert!(!one_hit.accepts(b"TTTTTTTTTT"));
        assert!(!one_hit.accepts(b"GATT"));

        // 2 of the 8 windows are shared
        let read = b"GATTACCCCCCC";
        assert!(ReadsFilter::new(&subgraph, 25).unwrap().accepts(read));
        assert!(!ReadsFilter::new(&subgraph, 40).unwrap().accepts(read));
    }

    #[test]
    fn test_empty_environment_accepts_nothing() {
        let subgraph = Subgraph::new(0);
        let filter = ReadsFilter::new(&subgraph, 100).unwrap();
        assert!(!filter.accepts(b"ACGT"));
    }

    #[test]
    fn test_filter_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reads.fastq");
        let output = dir.path().join("filtered.fasta");
        std::fs::write(
            &input,
            "@kept\nTTGATTACAG\n+\nIIIIIIIIII\n@dropped\nCCCCCCCCCC\n+\nIIIIIIIIII\n",
        )
        .unwrap();
        let subgraph = environment(5, b"GATTACAGGC");
        let filter = ReadsFilter::new(&subgraph, 50).unwrap();
        assert_eq!(filter.filter_file(&input, &output).unwrap(), (2, 1));
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            ">kept\nTTGATTACAG\n"
        );
    }
}
