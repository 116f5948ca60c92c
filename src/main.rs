use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use bogtig::best_overlap::BestOverlapGraph;
use bogtig::parser::{BogParser, ParserTolerance};
use bogtig::reads::{ReadInfo, ReadMetadata};
use bogtig::{UnitigConfig, UnitigGraph};

/// Build unitigs from a best-overlap graph
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Best-overlap input with R, E, and C records
    input: PathBuf,

    /// Layout output; numbered suffixes are added when partitioning
    #[arg(short, long)]
    output: PathBuf,

    /// Take read lengths from a binary read store instead of R records
    #[arg(long)]
    read_store: Option<PathBuf>,

    /// Save the read lengths as a binary read store
    #[arg(long)]
    save_read_store: Option<PathBuf>,

    /// JSON config file; requires the serde1 feature
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 500)]
    min_break_length: i64,

    #[arg(long, default_value_t = 1)]
    min_break_frags: usize,

    /// Skip splitting unitigs at discordant best edges
    #[arg(long)]
    no_break: bool,

    /// Skip joining unitigs through mutual best edges
    #[arg(long)]
    no_merge: bool,

    /// Genome size used for the global arrival rate
    #[arg(long)]
    genome_size: Option<u64>,

    /// Reads per layout file (0 writes a single file)
    #[arg(long, default_value_t = 0)]
    fragment_count_target: usize,

    /// Print the break points of each unitig before splitting
    #[arg(long)]
    print_breaks: bool,

    /// Fail on any malformed input line
    #[arg(long)]
    pedantic: bool,

    /// Verbose/info output
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Debug output
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn unitig_config(&self) -> Result<UnitigConfig> {
        if let Some(path) = &self.config {
            return load_config(path);
        }

        Ok(UnitigConfig {
            min_break_length: self.min_break_length,
            min_break_frags: self.min_break_frags,
            break_unitigs: !self.no_break,
            merge_unitigs: !self.no_merge,
            genome_size: self.genome_size,
            fragment_count_target: self.fragment_count_target,
        })
    }
}

#[cfg(feature = "serde1")]
fn load_config(path: &Path) -> Result<UnitigConfig> {
    UnitigConfig::load_json(path)
        .with_context(|| format!("loading config {}", path.display()))
}

#[cfg(not(feature = "serde1"))]
fn load_config(_path: &Path) -> Result<UnitigConfig> {
    anyhow::bail!("--config needs a build with the serde1 feature")
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level),
    )
    .init();

    let config = args.unitig_config()?;

    let tolerance = if args.pedantic {
        ParserTolerance::Pedantic
    } else {
        ParserTolerance::Safe
    };
    let records = BogParser::with_tolerance(tolerance)
        .parse_file(&args.input)
        .with_context(|| format!("parsing {}", args.input.display()))?;

    let reads = match &args.read_store {
        Some(path) => ReadInfo::load_store(path)?,
        None => ReadInfo::from_records(&records),
    };
    debug!(
        "{} reads, {} bases, {} bytes of read metadata",
        reads.num_reads(),
        reads.num_bases(),
        reads.memory_usage()
    );
    if let Some(path) = &args.save_read_store {
        reads.save_store(path)?;
    }

    let bog = BestOverlapGraph::from_records(&records, reads.num_reads());

    let mut graph = UnitigGraph::new(&bog, &reads, config)?;
    if args.print_breaks {
        graph.build()?;
        for (id, breaks) in graph.print_unitig_breaks() {
            for b in breaks {
                println!("{}\t{}", id, b);
            }
        }
    }
    graph.run()?;

    let paths = graph.write_layouts_to(&args.output)?;
    for path in paths {
        info!("layouts in {}", path.display());
    }

    Ok(())
}
