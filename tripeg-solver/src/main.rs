//! Triangular peg solitaire command line.
//!
//! Solves positions, lists legal jumps and queries opening books.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tripeg_core::{history_key, parse_history, Board, Hole, APEX};
use tripeg_solver::{book, Solver};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the fewest pegs reachable and a line that reaches it
    Solve {
        /// Jumps already played, e.g. "(2,4)+(2,4) (0,0)+(2,4)"
        #[arg(long, default_value = "")]
        history: String,
        /// Search every path without the occupancy cache
        #[arg(long)]
        exhaustive: bool,
        /// Print the path for every reachable peg count
        #[arg(long)]
        all: bool,
    },
    /// List legal jumps after a history
    Moves {
        #[arg(long, default_value = "")]
        history: String,
    },
    /// Look up a history in an opening book file
    Book {
        /// Book file (.db for SQLite, otherwise binary)
        path: PathBuf,
        #[arg(long, default_value = "")]
        history: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Solve {
            history,
            exhaustive,
            all,
        } => do_solve(history, *exhaustive, *all),
        Commands::Moves { history } => {
            let board = replay(history)?;
            print_board(&board);
            let moves = board.legal_moves();
            if moves.is_empty() {
                println!("No legal jumps: {} pegs left", board.peg_count());
            }
            for jump in moves.jumps() {
                println!("{}", jump);
            }
            Ok(())
        }
        Commands::Book { path, history } => {
            let board = replay(history)?;
            let book = book::open(path)
                .with_context(|| format!("Failed to open book {}", path.display()))?;
            match book.lookup(&board.history())? {
                Some(lines) => {
                    for line in lines {
                        println!("{}", history_key(&line));
                    }
                }
                None => println!("No entry for {:?}", history_key(&board.history())),
            }
            Ok(())
        }
    }
}

fn do_solve(history: &str, exhaustive: bool, all: bool) -> Result<()> {
    let board = replay(history)?;

    // Set up SIGINT handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let mut solver = if exhaustive {
        Solver::exhaustive()
    } else {
        Solver::new()
    };

    print_board(&board);
    let start = Instant::now();
    let outcome = solver
        .solve(&board, &running)
        .ok_or_else(|| anyhow!("Solve was interrupted before completion"))?;

    println!(
        "Best score: {} peg(s) in {:.2}s ({} positions, {} cache hits)",
        outcome.best_score,
        start.elapsed().as_secs_f64(),
        solver.stats.positions_evaluated,
        solver.stats.cache_hits,
    );
    match outcome.best_move() {
        Ok(jump) => println!("Best move: {}", jump),
        Err(e) => println!("{}", e),
    }
    println!("Line: {}", history_key(outcome.continuation()));

    if all {
        for (pegs, path) in &outcome.paths {
            println!("{:>2}: {}", pegs, history_key(&path[board.history_len()..]));
        }
    }
    Ok(())
}

fn replay(history: &str) -> Result<Board> {
    let mut board = Board::standard();
    for jump in parse_history(history)? {
        board
            .apply_jump(jump)
            .with_context(|| format!("Cannot replay {}", history_key(&board.history())))?;
    }
    Ok(board)
}

/// Draw the triangle, apex on top: `o` peg, `.` empty.
fn print_board(board: &Board) {
    for y in (0..=8).rev().step_by(2) {
        let row: String = (0..=8)
            .map(|x| {
                let hole = Hole(x, y);
                if hole.index().is_none() {
                    ' '
                } else if board.is_occupied(hole) {
                    'o'
                } else {
                    '.'
                }
            })
            .collect();
        println!("  {}", row.trim_end());
    }
    println!(
        "  {} pegs, {} jumps played{}",
        board.peg_count(),
        board.history_len(),
        if board.is_occupied(APEX) { "" } else { ", apex open" }
    );
}
