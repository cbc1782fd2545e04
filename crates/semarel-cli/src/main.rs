//! Semarel CLI
//!
//! Thin argument plumbing over the library crates:
//! - building a pairwise similarity matrix from a document collection dump
//! - transposing a matrix for column-access consumers
//! - querying single rows out of a matrix

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use semarel_graph::{CategoryGraph, CategorySimilarity, Document, VecCollection};
use semarel_matrix::{transpose, MatrixReader, OpenMode};
use semarel_pipeline::{run_pairwise, PairwiseConfig};

#[derive(Parser)]
#[command(name = "semarel")]
#[command(author, version, about = "Pairwise semantic-relatedness matrices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a category graph from a JSON document dump and compute the
    /// pairwise top-K similarity matrix.
    BuildMatrix {
        /// JSON array of documents (articles and category pages).
        #[arg(long)]
        docs: PathBuf,
        /// Output matrix path.
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 4)]
        threads: usize,
        /// Neighbors persisted per entity.
        #[arg(long, default_value_t = 20)]
        top_k: usize,
        /// Entities collected per BFS before the result cap cuts off.
        #[arg(long, default_value_t = 10_000)]
        search_cap: usize,
        #[arg(long, default_value_t = 65_536)]
        page_bytes: usize,
    },

    /// Write the transpose of a matrix (column-major view).
    Transpose {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// External-merge bucket count.
        #[arg(long, default_value_t = 16)]
        fanout: usize,
    },

    /// Print one row of a matrix.
    Query {
        #[arg(long)]
        matrix: PathBuf,
        #[arg(long)]
        id: u32,
        /// Print at most this many entries.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::BuildMatrix {
            docs,
            out,
            threads,
            top_k,
            search_cap,
            page_bytes,
        } => cmd_build_matrix(&docs, &out, threads, top_k, search_cap, page_bytes),
        Commands::Transpose { input, out, fanout } => cmd_transpose(&input, &out, fanout),
        Commands::Query { matrix, id, limit } => cmd_query(&matrix, id, limit),
    }
}

fn cmd_build_matrix(
    docs: &Path,
    out: &Path,
    threads: usize,
    top_k: usize,
    search_cap: usize,
    page_bytes: usize,
) -> Result<()> {
    let raw = fs::read_to_string(docs)
        .with_context(|| format!("reading document dump {}", docs.display()))?;
    let documents: Vec<Document> =
        serde_json::from_str(&raw).context("parsing document dump JSON")?;
    let collection = VecCollection::new(documents);

    let graph = CategoryGraph::build(&collection)?;
    let strategy = CategorySimilarity::with_search_cap(&graph, search_cap);
    let ids: Vec<u32> = graph.entities().iter().collect();

    let report = run_pairwise(
        &ids,
        &strategy,
        out,
        &PairwiseConfig {
            threads,
            top_k,
            max_page_bytes: page_bytes,
        },
        None,
        None,
    )?;

    println!(
        "wrote {} rows to {} ({} failures)",
        report.rows_written,
        out.display(),
        report.failures
    );
    Ok(())
}

fn cmd_transpose(input: &Path, out: &Path, fanout: usize) -> Result<()> {
    let reader = MatrixReader::open(input, OpenMode::Lazy, 64)
        .with_context(|| format!("opening matrix {}", input.display()))?;
    transpose(&reader, out, fanout)?;
    println!("transposed {} into {}", input.display(), out.display());
    Ok(())
}

fn cmd_query(matrix: &Path, id: u32, limit: usize) -> Result<()> {
    let reader = MatrixReader::open(matrix, OpenMode::Lazy, 64)
        .with_context(|| format!("opening matrix {}", matrix.display()))?;
    let row = reader.get_row(id)?;
    for &(col, score) in row.entries().iter().take(limit) {
        println!("{col}\t{score:.4}");
    }
    Ok(())
}
