use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::classifier::seq_cov::{self, BinCoverage};
use crate::classifier::{
    check_k_order, write_pair_bins, write_triple_bins, Classifier, PairStats,
};
use crate::cli::{
    ClassifyArgs, Cli, Command, CountArgs, EnvironmentArgs, FilterReadsArgs, KmerArgs,
    MultiEnvironmentArgs, SeqCovArgs, TripleClassifyArgs,
};
use crate::environment::{EnvironmentExtractor, ExtractionConfig, ReadsFilter, Subgraph};
use crate::error::{ConfigError, ExtractionError, OutputError};
use crate::graph::coloring::{self, membership_color, Color};
use crate::graph::{combined, Graph, NodeTags, SeedSet};
use crate::index::computation::{build_index, CancellationToken};
use crate::index::{Built, KmerIndex};
use crate::reads::{load_pairs, load_reads, Read, ReadsWriter};
use crate::two_bits::{shorten_label, MAX_PACKED_K};

mod buckets;
mod classifier;
mod cli;
mod environment;
mod error;
mod graph;
mod hashing;
mod index;
mod reads;
mod serde;
mod termination;
mod two_bits;

/// Number of occurrences of a k-mer. Saturates at [`index::MAX_COUNT`].
pub type Count = u16;

/// Share of the possible k-mers above which the k-mer size is probably too small.
const ALMOST_ALL_KMERS: f64 = 0.99;

fn thread_pool(threads: usize) -> Result<rayon::ThreadPool, Box<dyn Error>> {
    if threads == 0 {
        return Err(ConfigError::NoThreads.into());
    }
    Ok(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?)
}

/// Index of `k`-mers, loaded from `dump` when given, built from `reads` otherwise.
fn load_index(
    kmers: &KmerArgs,
    reads: &[PathBuf],
    dump: Option<&Path>,
    k: usize,
) -> Result<KmerIndex<Built>, Box<dyn Error>> {
    let config = kmers.counting_config(k)?;
    if let Some(path) = dump {
        let start = Instant::now();
        let index = serde::bin::load(path, &config.hasher)?;
        info!(
            "index of {} k-mers loaded from {} in {:.2?}",
            index.len(),
            path.display(),
            start.elapsed()
        );
        return Ok(index);
    }
    if reads.is_empty() {
        return Err(ConfigError::NoKmerSource.into());
    }
    let (index, _) = build_index(reads, &config, &CancellationToken::new())?;
    Ok(index)
}

/// Name of a dataset: the file name up to its first dot.
fn dataset_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split('.').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "kmers".to_string(),
    }
}

/// First word of a FASTA header.
fn record_name(read: &Read) -> String {
    String::from_utf8_lossy(&read.id)
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn count(args: &CountArgs) -> Result<(), Box<dyn Error>> {
    let k = args.kmers.k;
    let config = args.kmers.counting_config(k)?;
    if config.hasher.is_exact() {
        info!("k-mers are packed on 2 bits");
    } else {
        info!("using the {:?} hash function", args.kmers.hash);
    }
    let (index, _) = build_index(&args.reads, &config, &CancellationToken::new())?;
    info!("hashtable size: {} k-mers", index.len());

    if index.is_empty() {
        warn!("no k-mers found in the reads; the files may be empty or k too large");
    } else if k <= MAX_PACKED_K {
        let possible = (1u64 << (2 * k - 1)) as f64;
        let found = index.len() as f64;
        if found >= possible {
            warn!("all possible k-mers were found in the reads; consider increasing k");
        } else if found >= ALMOST_ALL_KMERS * possible {
            warn!("almost all possible k-mers were found in the reads; consider increasing k");
        }
    }

    fs::create_dir_all(&args.output_dir)?;
    let name = dataset_name(&args.reads[0]);
    let dump_path = args.output_dir.join(format!("{}.kmers.bin", name));
    let stat_path = args.output_dir.join(format!("{}.stat.txt", name));
    serde::bin::dump(&index, &dump_path)?;
    index.write_histogram(std::io::BufWriter::new(fs::File::create(&stat_path)?))?;
    info!(
        "index written to {}, statistics to {}",
        dump_path.display(),
        stat_path.display()
    );
    Ok(())
}

type ColorOf<'a> = dyn Fn(&[u8]) -> Option<Color> + Send + Sync + 'a;

/// Everything shared by the searches of one `environment` run.
struct EnvironmentContext<'a> {
    index: &'a KmerIndex<Built>,
    config: &'a ExtractionConfig,
    args: &'a EnvironmentArgs,
    color_of: Option<&'a ColorOf<'a>>,
}

impl EnvironmentContext<'_> {
    /// Extracts, compacts and writes the environment of `queries` into `dir`.
    /// A query without any solid k-mer is reported and skipped.
    fn process<Q: AsRef<[u8]>>(&self, queries: &[Q], dir: &Path) -> Result<(), OutputError> {
        let k = self.index.k();
        for query in queries {
            info!("finding environment for {}", shorten_label(query.as_ref(), k));
        }
        let start = Instant::now();
        let subgraph = match EnvironmentExtractor::new(self.index, self.config).extract(queries) {
            Ok(subgraph) => subgraph,
            Err(ExtractionError::NoSeed { min_occurrences }) => {
                warn!(
                    "could not find any k-mers of the target gene (minimum count {})",
                    min_occurrences
                );
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        info!(
            "environment of {} k-mers found in {:.2?}",
            subgraph.len(),
            start.elapsed()
        );

        fs::create_dir_all(dir.join("tsvs"))?;
        subgraph.write(dir.join("graph.txt"))?;

        let seeds = SeedSet::new(queries, k);
        let mut graph = Graph::from_kmers(k, &subgraph.sorted_kmers(), |kmer| NodeTags {
            is_seed: seeds.contains(kmer),
            color: self.color_of.and_then(|color_of| color_of(kmer)),
            ..NodeTags::default()
        });
        graph.compact();
        if self.args.seed_component_only {
            let removed = graph.retain_seed_components();
            debug!("{} nodes not connected to the query removed", removed);
        }
        info!("{} nodes after compaction", graph.len());

        let nodes = graph.reports(|kmer| subgraph.get(kmer).map(u64::from).unwrap_or(0));
        let edges = graph.edges();
        serde::gfa::write_gfa(dir.join("graph.gfa"), &nodes, &edges, k, |node| {
            node.color.map(|color| color.hex().to_string())
        })?;
        serde::tsv::write_nodes(dir.join("tsvs").join("nodes.tsv"), &nodes)?;
        serde::tsv::write_edges(dir.join("tsvs").join("edges.tsv"), &edges)?;
        serde::fasta::write_sequences(dir.join("seqs.fasta"), &nodes, self.args.chunk_length)?;
        Ok(())
    }
}

fn environment(args: &EnvironmentArgs) -> Result<(), Box<dyn Error>> {
    let k = args.kmers.k;
    let config = args.extraction_config()?;
    let pool = thread_pool(args.kmers.threads)?;
    let colour_sources = match &args.colour_by {
        Some(paths) => Some((Subgraph::read(&paths[0])?, Subgraph::read(&paths[1])?)),
        None => None,
    };
    let queries: Vec<Vec<u8>> = load_reads(&args.queries)?
        .into_iter()
        .map(|read| read.seq)
        .collect();
    let index = load_index(&args.kmers, &args.source.input, args.source.index.as_deref(), k)?;

    let color_of = colour_sources
        .as_ref()
        .map(|(first, second)| coloring::by_membership(first, second));
    let context = EnvironmentContext {
        index: &index,
        config: &config,
        args,
        color_of: color_of.as_deref(),
    };

    let start = Instant::now();
    if args.merge_queries || queries.len() <= 1 {
        context.process(&queries, &args.output)?;
    } else {
        let results: Vec<Result<(), OutputError>> = pool.install(|| {
            queries
                .par_iter()
                .enumerate()
                .map(|(i, query)| {
                    context.process(&[query], &args.output.join((i + 1).to_string()))
                })
                .collect()
        });
        // one failing query does not cost the others their outputs
        let mut failed = 0;
        for (i, result) in results.into_iter().enumerate() {
            if let Err(err) = result {
                error!("environment of query {} not written: {}", i + 1, err);
                failed += 1;
            }
        }
        if failed > 0 {
            warn!("{} of {} queries failed", failed, queries.len());
        }
    }
    info!(
        "environments of {} queries written to {} in {:.2?}",
        queries.len(),
        args.output.display(),
        start.elapsed()
    );
    Ok(())
}

fn multi_environment(args: &MultiEnvironmentArgs) -> Result<(), Box<dyn Error>> {
    let environments = args
        .environments
        .iter()
        .map(Subgraph::read)
        .collect::<Result<Vec<_>, _>>()?;
    let k = combined::check_environments(&environments)?;
    let genes = load_reads(&args.genes)?;
    let gene = args
        .gene_id
        .checked_sub(1)
        .and_then(|i| genes.get(i))
        .ok_or(ConfigError::GeneIdOutOfRange {
            id: args.gene_id,
            count: genes.len(),
        })?;

    let mut graph = combined::combine(&environments, &gene.seq)?;
    let kmers = graph.len();
    graph.compact();
    info!(
        "{} k-mers of {} environments compacted into {} nodes",
        kmers,
        environments.len(),
        graph.len()
    );

    fs::create_dir_all(&args.output)?;
    let nodes = graph.reports(|kmer| combined::summed_count(&environments, kmer));
    let edges = graph.edges();
    serde::gfa::write_gfa(args.output.join("graph.gfa"), &nodes, &edges, k, |node| {
        Some(membership_color(&node.mask, node.is_seed))
    })?;
    serde::fasta::write_sequences(args.output.join("seqs.fasta"), &nodes, args.chunk_length)?;
    let mut gene_out = ReadsWriter::create(args.output.join("gene.fasta"))?;
    gene_out.write_fasta(&gene.id, &gene.seq)?;
    gene_out.finish()?;
    Ok(())
}

fn filter_reads(args: &FilterReadsArgs) -> Result<(), Box<dyn Error>> {
    let pool = thread_pool(args.threads)?;
    let subgraph = Subgraph::read(&args.environment)?;
    if subgraph.is_empty() {
        warn!("{} holds no k-mers, no read will be kept", args.environment.display());
    }
    let filter = ReadsFilter::new(&subgraph, args.percent)?;

    fs::create_dir_all(&args.output_dir)?;
    for path in &args.reads {
        let start = Instant::now();
        let output = args
            .output_dir
            .join(format!("{}.filtered.fasta", dataset_name(path)));
        let (read, kept) = pool.install(|| filter.filter_file(path, &output))?;
        info!(
            "{} of {} reads of {} kept in {} ({:.2?})",
            kept,
            read,
            path.display(),
            output.display(),
            start.elapsed()
        );
    }
    Ok(())
}

fn classify(args: &ClassifyArgs) -> Result<(), Box<dyn Error>> {
    let config = args.classifier.config()?;
    let pool = thread_pool(args.kmers.threads)?;
    let reads = &args.classifier.reads;
    let pairs = load_pairs(&reads[0], reads.get(1))?;
    let index = load_index(
        &args.kmers,
        &args.source.input,
        args.source.index.as_deref(),
        args.kmers.k,
    )?;

    let start = Instant::now();
    let classifier = Classifier::new(&index, &config);
    let bins = pool.install(|| classifier.classify_pairs(&pairs));
    info!("{} pairs classified in {:.2?}", pairs.len(), start.elapsed());

    fs::create_dir_all(&args.classifier.output_dir)?;
    let stats: PairStats = write_pair_bins(&args.classifier.output_dir, &pairs, &bins)?;
    stats.log();
    Ok(())
}

fn triple_classify(args: &TripleClassifyArgs) -> Result<(), Box<dyn Error>> {
    check_k_order(args.kmers.k, args.k2)?;
    args.kmers.hasher_for(args.k2)?;
    let config = args.classifier.config()?;
    let pool = thread_pool(args.kmers.threads)?;
    let reads = &args.classifier.reads;
    let pairs = load_pairs(&reads[0], reads.get(1))?;

    let start = Instant::now();
    let at_k = {
        let index = load_index(
            &args.kmers,
            &args.source.input,
            args.source.index.as_deref(),
            args.kmers.k,
        )?;
        let classifier = Classifier::new(&index, &config);
        pool.install(|| classifier.first_pass(&pairs))
    };
    info!("first pass (k = {}) done in {:.2?}", args.kmers.k, start.elapsed());

    let start = Instant::now();
    let index = load_index(&args.kmers, &args.source.input, args.index2.as_deref(), args.k2)?;
    let classifier = Classifier::new(&index, &config);
    let presences = pool.install(|| classifier.second_pass(&pairs, &at_k));
    info!("second pass (k = {}) done in {:.2?}", args.k2, start.elapsed());

    fs::create_dir_all(&args.classifier.output_dir)?;
    let stats = write_triple_bins(&args.classifier.output_dir, &pairs, &presences)?;
    stats.log();
    Ok(())
}

fn sequence_coverage(args: &SeqCovArgs) -> Result<(), Box<dyn Error>> {
    let k = args.kmers.k;
    let config = args.kmers.counting_config(k)?;
    let records = load_reads(&args.sequences)?;
    let names: Vec<String> = records.iter().map(record_name).collect();
    let sequences: Vec<&[u8]> = records.iter().map(|record| record.seq.as_slice()).collect();

    let mut bins = Vec::with_capacity(args.bins.len());
    for bin in &args.bins {
        let start = Instant::now();
        let (index, _) = build_index(&bin.files, &config, &CancellationToken::new())?;
        bins.push(BinCoverage::new(&bin.name, &index, &sequences));
        info!("coverage in bin {} computed in {:.2?}", bin.name, start.elapsed());
    }

    fs::create_dir_all(&args.output_dir)?;
    let path = args.output_dir.join("seq_cov.csv");
    seq_cov::write_csv(&path, &names, &bins)?;
    info!("coverages written to {}", path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let start = Instant::now();
    match &cli.command {
        Command::Count(args) => count(args)?,
        Command::Environment(args) => environment(args)?,
        Command::MultiEnvironment(args) => multi_environment(args)?,
        Command::FilterReads(args) => filter_reads(args)?,
        Command::Classify(args) => classify(args)?,
        Command::TripleClassify(args) => triple_classify(args)?,
        Command::SeqCov(args) => sequence_coverage(args)?,
    }
    info!("done in {:.2?}", start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_dataset_name() {
        assert_eq!(dataset_name(Path::new("data/reads_1.fastq.gz")), "reads_1");
        assert_eq!(dataset_name(Path::new("reads")), "reads");
        assert_eq!(dataset_name(Path::new(".hidden")), "kmers");
    }

    #[test]
    fn test_record_name() {
        let read = Read::new(b"gene_1 some description", b"ACGT", None);
        assert_eq!(record_name(&read), "gene_1");
    }

    const GENE: &[u8] = b"GATTACAGGCTTCAGCATCGGTACCGTTAGCAAGTCCTGAACGTTGCAGT";

    /// Three copies of the gene as reads, `queries` as the query file, k = 11.
    fn environment_args(dir: &Path, queries: &[&[u8]], output: &Path) -> EnvironmentArgs {
        let reads = dir.join("reads.fasta");
        let mut content = Vec::new();
        for i in 0..3 {
            content.extend(format!(">r{}\n", i).as_bytes());
            content.extend(GENE);
            content.push(b'\n');
        }
        fs::write(&reads, content).unwrap();
        let query_file = dir.join("query.fasta");
        let mut content = Vec::new();
        for (i, query) in queries.iter().enumerate() {
            content.extend(format!(">q{}\n", i).as_bytes());
            content.extend(*query);
            content.push(b'\n');
        }
        fs::write(&query_file, content).unwrap();

        let cli = Cli::try_parse_from([
            OsString::from("envfinder"),
            "environment".into(),
            "-k".into(),
            "11".into(),
            "-t".into(),
            "2".into(),
            "-i".into(),
            reads.into_os_string(),
            "-s".into(),
            query_file.into_os_string(),
            "-o".into(),
            output.as_os_str().to_owned(),
            "--max-radius".into(),
            "100".into(),
        ])
        .unwrap();
        let Command::Environment(args) = cli.command else {
            panic!("expected the environment command");
        };
        args
    }

    #[test]
    fn test_environment_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let args = environment_args(dir.path(), &[&GENE[10..40]], &output);
        environment(&args).unwrap();

        let subgraph = Subgraph::read(output.join("graph.txt")).unwrap();
        assert_eq!(subgraph.len(), GENE.len() - 11 + 1);
        // left flank, query, right flank
        let gfa = fs::read_to_string(output.join("graph.gfa")).unwrap();
        let segments: Vec<&str> = gfa.lines().filter(|line| line.starts_with("S\t")).collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(
            segments.iter().filter(|line| line.contains("_start\t")).count(),
            1
        );
        assert!(output.join("tsvs").join("nodes.tsv").exists());
        assert!(output.join("seqs.fasta").exists());
    }

    #[test]
    fn test_failing_query_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let args = environment_args(dir.path(), &[&GENE[..20], &GENE[25..]], &output);
        // the second query cannot get its output directory
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("2"), "not a directory").unwrap();

        environment(&args).unwrap();
        assert!(output.join("1").join("graph.gfa").exists());
        assert!(output.join("1").join("seqs.fasta").exists());
        assert!(!output.join("2").is_dir());
    }

    #[test]
    fn test_filter_reads_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let environment_file = dir.path().join("graph.txt");
        let mut subgraph = Subgraph::new(11);
        for window in GENE[..30].windows(11) {
            subgraph.insert(window, 3);
        }
        subgraph.write(&environment_file).unwrap();
        let reads = dir.path().join("sample.fasta");
        fs::write(
            &reads,
            [b">near\n".as_slice(), &GENE[5..45], b"\n>far\nCCCCCCCCCCCCCCCCCCCC\n"].concat(),
        )
        .unwrap();
        let output = dir.path().join("filtered");

        let cli = Cli::try_parse_from([
            OsString::from("envfinder"),
            "filter-reads".into(),
            "--env".into(),
            environment_file.into_os_string(),
            "-r".into(),
            reads.into_os_string(),
            "-f".into(),
            "20".into(),
            "-t".into(),
            "1".into(),
            "-o".into(),
            output.clone().into_os_string(),
        ])
        .unwrap();
        let Command::FilterReads(args) = cli.command else {
            panic!("expected the filter-reads command");
        };
        filter_reads(&args).unwrap();

        let kept = load_reads(output.join("sample.filtered.fasta")).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, b"near");
    }
}
