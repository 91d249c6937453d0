use crate::{
    error::BuildError,
    hashing::KmerHasher,
    index::{Building, Built, KmerIndex},
};

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

mod reads_iter;

use reads_iter::ReadsIter;

use log::{debug, info};
use needletail::parse_fastx_file;

/// Number of reads handed to a worker at once.
pub const READS_WORK_RANGE_SIZE: usize = 1 << 15;

pub struct CountingConfig {
    pub hasher: KmerHasher,
    /// Shorter sequences are skipped.
    pub min_sequence_length: usize,
    pub threads: usize,
}

/// Shared stop flag. Once cancelled, workers stop picking up reads and the build fails.
#[derive(Clone, Default, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadingStats {
    pub total_sequences: u64,
    pub total_length: u64,
    pub good_sequences: u64,
    pub good_length: u64,
}

impl LoadingStats {
    fn merge(&mut self, other: &LoadingStats) {
        self.total_sequences += other.total_sequences;
        self.total_length += other.total_length;
        self.good_sequences += other.good_sequences;
        self.good_length += other.good_length;
    }

    fn log(&self, what: &str) {
        debug!(
            "{}: {}/{} good sequences ({:.1}%), {}/{} good bases ({:.1}%)",
            what,
            self.good_sequences,
            self.total_sequences,
            percentage(self.good_sequences, self.total_sequences),
            self.good_length,
            self.total_length,
            percentage(self.good_length, self.total_length),
        );
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Builds the index of all k-mers of the reads in `paths`.
///
/// Files are processed one after the other. Within a file, the main thread reads ranges of
/// [`READS_WORK_RANGE_SIZE`] sequences and hands each range to a worker of the pool.
/// A parsing error, or a cancellation through `token`, aborts the whole build.
pub fn build_index<P: AsRef<Path>>(
    paths: &[P],
    config: &CountingConfig,
    token: &CancellationToken,
) -> Result<(KmerIndex<Built>, LoadingStats), BuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()?;
    let index = KmerIndex::<Building>::new(config.hasher);
    let mut stats = LoadingStats::default();

    for path in paths {
        let path = path.as_ref();
        let start = Instant::now();
        info!("loading k-mers from {}", path.display());
        let file_stats = count_file(path, &index, config, &pool, token)?;
        if token.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        info!(
            "{} sequences loaded from {} in {:.2?}",
            file_stats.total_sequences,
            path.display(),
            start.elapsed()
        );
        file_stats.log(&path.display().to_string());
        stats.merge(&file_stats);
    }
    stats.log("total");

    let index = index.freeze();
    info!("index holds {} k-mers", index.len());
    Ok((index, stats))
}

fn count_file(
    path: &Path,
    index: &KmerIndex<Building>,
    config: &CountingConfig,
    pool: &rayon::ThreadPool,
    token: &CancellationToken,
) -> Result<LoadingStats, BuildError> {
    let parse_error = |source| BuildError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let reader = parse_fastx_file(path).map_err(parse_error)?;
    let mut reads = ReadsIter::new(reader);
    let mut stats = LoadingStats::default();

    pool.in_place_scope(|s| {
        while !token.is_cancelled() {
            let mut range = Vec::with_capacity(READS_WORK_RANGE_SIZE);
            let mut consumed = 0;
            for read in reads.by_ref().take(READS_WORK_RANGE_SIZE) {
                consumed += 1;
                let read = match read {
                    Ok(read) => read,
                    Err(error) => {
                        // siblings must not keep counting into an index that will be dropped
                        token.cancel();
                        return Err(parse_error(error));
                    }
                };
                stats.total_sequences += 1;
                stats.total_length += read.len() as u64;
                if read.len() >= config.min_sequence_length {
                    stats.good_sequences += 1;
                    stats.good_length += read.len() as u64;
                    range.push(read);
                }
            }
            if consumed == 0 {
                break;
            }
            if !range.is_empty() {
                s.spawn(move |_| {
                    if !token.is_cancelled() {
                        index.count_sequences(&range);
                    }
                });
            }
        }
        Ok(())
    })?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashFunction;
    use rand::Rng;
    use std::io::Write;

    fn config(k: usize, threads: usize) -> CountingConfig {
        CountingConfig {
            hasher: KmerHasher::new(k, HashFunction::Polynomial, false),
            min_sequence_length: k,
            threads,
        }
    }

    fn write_fasta(dir: &tempfile::TempDir, name: &str, reads: &[Vec<u8>]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for (i, read) in reads.iter().enumerate() {
            writeln!(file, ">read_{}", i).unwrap();
            file.write_all(read).unwrap();
            writeln!(file).unwrap();
        }
        path
    }

    #[test]
    fn test_build_from_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let reads = vec![
            b"ACGTACGTTGCA".to_vec(),
            b"acgtacgttgca".to_vec(),
            b"ACG".to_vec(),
        ];
        let path = write_fasta(&dir, "reads.fa", &reads);
        let (index, stats) = build_index(&[&path], &config(5, 2), &CancellationToken::new()).unwrap();
        assert_eq!(
            stats,
            LoadingStats {
                total_sequences: 3,
                total_length: 27,
                good_sequences: 2,
                good_length: 24,
            }
        );
        // lower case reads are upper-cased before counting
        assert!(index.get_or_zero(b"TTGCA") >= 2);
        assert_eq!(index.get_or_zero(b"AAAAA"), 0);
    }

    #[test]
    fn test_thread_count_does_not_change_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = rand::thread_rng();
        let reads: Vec<Vec<u8>> = (0..500)
            .map(|_| (0..80).map(|_| b"ACGTN"[rng.gen_range(0..5)]).collect())
            .collect();
        let first = write_fasta(&dir, "first.fa", &reads[..250]);
        let second = write_fasta(&dir, "second.fa", &reads[250..]);

        let (single, _) =
            build_index(&[&first, &second], &config(9, 1), &CancellationToken::new()).unwrap();
        let (multi, _) =
            build_index(&[&first, &second], &config(9, 4), &CancellationToken::new()).unwrap();
        assert!(single == multi);
        assert!(!single.is_empty());
    }

    #[test]
    fn test_cancelled_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(&dir, "reads.fa", &[b"ACGTACGTTGCA".to_vec()]);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            build_index(&[&path], &config(5, 2), &token),
            Err(BuildError::Cancelled)
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_index(
            &[dir.path().join("missing.fq")],
            &config(5, 1),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(BuildError::Parse { .. })));
    }
}
