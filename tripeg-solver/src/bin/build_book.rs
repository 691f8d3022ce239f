//! Build the opening book.
//!
//! Usage: build_book [--depth N] [--output data/book.bin]
//!
//! Solves every position up to the given depth and records the best lines
//! for each.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tripeg_solver::{build_book, BOOK_DEPTH};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Longest history to record
    #[arg(long, default_value_t = BOOK_DEPTH)]
    depth: usize,
    /// Output file
    #[arg(long, default_value = "data/book.bin")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Set up SIGINT handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    info!(depth = args.depth, output = %args.output.display(), "building opening book");
    let start = Instant::now();
    let Some(book) = build_book(args.depth, &running) else {
        bail!("Interrupted before the book was complete; nothing written");
    };

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let count = book
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        entries = count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "book written"
    );
    Ok(())
}
