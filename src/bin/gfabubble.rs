use clap::Parser;
use gfabubble::annotation::Annotation;
use gfabubble::{Dataset, FilterConfig, GenomeId, MetadataTable, OrderedGraph, Result};
use log::info;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gfabubble")]
#[command(about = "Simplify a variation graph into nested bubbles and lay it out.", long_about = None)]
struct Args {
    /// Load the variation graph in GFA format from this FILE.
    #[arg(short = 'i', long = "gfa", value_name = "FILE")]
    gfa: PathBuf,

    // Genome selection
    /// Show only these genomes (comma separated).
    #[arg(short = 'g', long = "genomes", value_name = "NAMES", value_delimiter = ',', conflicts_with = "top")]
    genomes: Vec<String>,

    /// Compare these genomes (comma separated) against --bottom.
    #[arg(long = "top", value_name = "NAMES", value_delimiter = ',', requires = "bottom")]
    top: Vec<String>,

    /// The lower side of a comparison.
    #[arg(long = "bottom", value_name = "NAMES", value_delimiter = ',', requires = "top")]
    bottom: Vec<String>,

    /// Genome metadata table (TSV, first column the genome name).
    #[arg(short = 'm', long = "metadata", value_name = "FILE")]
    metadata: Option<PathBuf>,

    /// Show only the genomes whose metadata FIELD equals VALUE.
    #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE", requires = "metadata", conflicts_with_all = ["genomes", "top"])]
    select: Option<String>,

    /// Place the annotations of this FILE (genome, start, end, label) on the nodes.
    #[arg(short = 'a', long = "annotations", value_name = "FILE")]
    annotations: Option<PathBuf>,

    // View options
    /// Zoom into these bubbles, in order.
    #[arg(short = 'z', long = "zoom", value_name = "ID", value_delimiter = ',', allow_negative_numbers = true)]
    zoom: Vec<i64>,

    /// Shortest unbranched run collapsed into a straight-sequence bubble.
    #[arg(long = "min-straight-run", value_name = "N", default_value_t = 3)]
    min_straight_run: usize,

    /// Do not collapse point mutations, indels or straight runs.
    #[arg(long = "no-mutation-bubbles")]
    no_mutation_bubbles: bool,

    // Threading
    /// Number of threads to use for parallel operations.
    #[arg(short = 't', long = "threads", value_name = "N")]
    threads: Option<usize>,

    // Logging
    /// Verbosity level (0 = error, 1 = info, 2 = debug).
    #[arg(short = 'v', long = "verbose", value_name = "N", default_value_t = 1)]
    verbose: u8,
}

impl Args {
    fn filter_config(&self) -> FilterConfig {
        let mutations = !self.no_mutation_bubbles;
        FilterConfig {
            min_straight_run: self.min_straight_run,
            point_mutations: mutations,
            indels: mutations,
            straight_sequences: mutations,
        }
    }
}

fn write_view(out: &mut impl Write, side: &str, view: &OrderedGraph) -> io::Result<()> {
    for node in view.nodes() {
        let kind = node.bubble_kind().map_or("sequence", |k| k.name());
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{:.6}\t{}",
            side,
            node.id,
            kind,
            node.level,
            node.base_pairs(),
            node.genomes.len(),
            node.layout.relative_y,
            node.layout.max_height,
            node.layout.overlapping
        )?;
    }
    Ok(())
}

fn zoom(view: &mut OrderedGraph, ids: &[i64]) -> Result<()> {
    for &id in ids {
        if view.node(id).is_some() {
            let order = gfabubble::zoom_in(view, id)?;
            info!("Zoomed into {}, {} nodes shown", id, order.len());
        }
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let mut dataset = Dataset::load_gfa(&args.gfa, args.filter_config())?;

    if let Some(path) = &args.metadata {
        let table = MetadataTable::read_tsv(BufReader::new(File::open(path)?), dataset.registry())?;
        dataset.set_metadata(table);
    }

    let annotations = match &args.annotations {
        Some(path) => Annotation::read_tsv(BufReader::new(File::open(path)?), dataset.registry())?,
        None => Vec::new(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "#side\tid\tkind\tlevel\tbp\tgenomes\trelative_y\tmax_height\toverlapping"
    )?;

    let mut views: Vec<(&str, OrderedGraph)> = Vec::new();
    if !args.top.is_empty() {
        let top = dataset.genome_ids(args.top.iter().map(String::as_str))?;
        let bottom = dataset.genome_ids(args.bottom.iter().map(String::as_str))?;
        let (mut top_view, mut bottom_view) = dataset.compare(&top, &bottom)?;
        zoom(&mut top_view, &args.zoom)?;
        zoom(&mut bottom_view, &args.zoom)?;
        views.push(("top", top_view));
        views.push(("bottom", bottom_view));
    } else {
        let genomes: BTreeSet<GenomeId> = if let Some(select) = &args.select {
            let (field, value) = select.split_once('=').unwrap_or((select.as_str(), ""));
            dataset.genomes_where(field, value)
        } else if !args.genomes.is_empty() {
            dataset.genome_ids(args.genomes.iter().map(String::as_str))?
        } else {
            dataset.registry().all()
        };
        let mut view = dataset.align_one(&genomes)?;
        zoom(&mut view, &args.zoom)?;
        views.push(("main", view));
    }

    for (side, view) in &views {
        write_view(&mut out, side, view)?;
        for mapped in dataset.annotate(view, &annotations) {
            let nodes: Vec<String> = mapped.nodes.iter().map(|id| id.to_string()).collect();
            writeln!(out, "#annotation\t{}\t{}\t{}", side, mapped.annotation.label, nodes.join(","))?;
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Some(threads) = args.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            eprintln!("Error setting up {} threads: {}", threads, e);
            std::process::exit(1);
        }
    }

    info!("Starting simplification...");

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    info!("Done.");
}
