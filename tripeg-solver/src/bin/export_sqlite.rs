//! Export a binary opening book to SQLite.
//!
//! Usage: export_sqlite [input.bin] [output.db]
//!
//! Converts the binary book format to a SQLite database for on-demand
//! lookups by the API server.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tripeg_solver::{MemoryBook, OpeningBook, SqliteBook};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(default_value = "data/book.bin")]
    input: PathBuf,
    #[arg(default_value = "data/book.db")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let start = Instant::now();
    let book = MemoryBook::load(&args.input)
        .with_context(|| format!("Failed to load book {}", args.input.display()))?;
    info!(
        entries = book.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded binary book"
    );

    let start = Instant::now();
    let rows = SqliteBook::export(&book, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(
        rows,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "inserted book lines"
    );

    // Verify every entry reads back identically
    let sqlite = SqliteBook::open(&args.output)?;
    for entry in book.entries() {
        let lines = sqlite.lookup(&entry.history)?;
        ensure!(
            lines.as_ref() == Some(&entry.lines),
            "Lines mismatch for history {:?}",
            tripeg_core::history_key(&entry.history)
        );
    }
    info!("verification passed");

    // Report file sizes
    let input_size = std::fs::metadata(&args.input).map(|m| m.len()).unwrap_or(0);
    let output_size = std::fs::metadata(&args.output).map(|m| m.len()).unwrap_or(0);
    println!("Binary: {:.1} KB", input_size as f64 / 1024.0);
    println!("SQLite: {:.1} KB", output_size as f64 / 1024.0);
    println!("Database created at {}", args.output.display());
    Ok(())
}
