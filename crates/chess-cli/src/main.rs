//! Command line driver for the chess engine.
//!
//! Searches a position, counts perft nodes, runs EPD test suites and
//! analyses until a time limit or a key press.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use chess_core::{EpdRecord, FenParser};
use chess_engine::{
    line_to_san, perft, perft_divide, Engine, EngineConfig, MoveBuffer, Position, SearchLimits,
    SearchMode, SearchReport,
};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chess-cli")]
#[command(about = "Alpha-beta chess engine driver")]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Limits shared by the searching subcommands.
#[derive(Args, Debug, Clone, Default)]
struct LimitArgs {
    /// Iteration depth limit
    #[arg(short, long)]
    depth: Option<usize>,
    /// Time limit per search in milliseconds
    #[arg(short = 't', long)]
    movetime: Option<u64>,
    /// Node budget per search
    #[arg(short, long)]
    nodes: Option<u64>,
}

impl LimitArgs {
    fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_depth: self.depth,
            move_time: self.movetime.map(Duration::from_millis),
            nodes: self.nodes,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search a position for the best move
    Search {
        /// Position to search (defaults to the start position)
        #[arg(short, long)]
        fen: Option<String>,
        /// Moves to play first, in coordinate notation or SAN
        #[arg(short, long, num_args = 1..)]
        moves: Vec<String>,
        /// Ponder on the expected reply after the search
        #[arg(long)]
        ponder: bool,
        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Count leaf nodes of the legal move tree
    Perft {
        #[arg(short, long)]
        fen: Option<String>,
        #[arg(short, long, default_value = "4")]
        depth: u32,
        /// Print the count below every root move
        #[arg(long)]
        divide: bool,
    },
    /// Run a file of EPD test positions
    Epd {
        /// EPD file, one record per line
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Analyse a position until the limits are hit or Enter is pressed
    Analyze {
        #[arg(short, long)]
        fen: Option<String>,
        #[command(flatten)]
        limits: LimitArgs,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Search {
            fen,
            moves,
            ponder,
            limits,
        } => run_search(config, fen.as_deref(), &moves, ponder, &limits),
        Commands::Perft { fen, depth, divide } => run_perft(fen.as_deref(), depth, divide),
        Commands::Epd { file, limits } => run_epd(config, &file, &limits),
        Commands::Analyze { fen, limits } => run_analyze(config, fen.as_deref(), &limits),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn engine_at(config: EngineConfig, fen: Option<&str>) -> anyhow::Result<Engine> {
    let mut engine = Engine::new(config).context("creating engine")?;
    if let Some(fen) = fen {
        engine
            .set_position(fen)
            .with_context(|| format!("setting up position {fen}"))?;
    }
    Ok(engine)
}

fn run_search(
    config: EngineConfig,
    fen: Option<&str>,
    moves: &[String],
    ponder: bool,
    limits: &LimitArgs,
) -> anyhow::Result<()> {
    let mut engine = engine_at(config, fen)?;
    for m in moves {
        engine
            .make_root_move_text(m)
            .with_context(|| format!("playing {m}"))?;
    }
    let draw = engine.draw_by_repetition();
    if draw != chess_engine::Repetition::None {
        info!(?draw, "position is already drawn");
    }

    let root = engine.position().clone();
    let report = engine.search(limits.limits(), SearchMode::Search);
    print_report(&root, &report);

    if ponder {
        let Some(mut best) = report.best_move else {
            bail!("no legal move to play before pondering");
        };
        engine.make_root_move(&mut best)?;
        match engine.ponder(limits.limits()) {
            Some(pondered) => {
                let expected = pondered.ponder_move.map(|m| m.to_uci());
                println!("ponder {}", expected.as_deref().unwrap_or("-"));
                let line: Vec<String> = pondered.pv.iter().map(|m| m.to_uci()).collect();
                println!(
                    "ponder line {} (score {}, depth {})",
                    line.join(" "),
                    pondered.score,
                    pondered.depth
                );
            }
            None => println!("ponder -"),
        }
    }
    Ok(())
}

fn print_report(root: &Position, report: &SearchReport) {
    let san = line_to_san(root, &report.pv);
    let secs = report.elapsed.as_secs_f64();
    let total = report.nodes + report.qnodes;
    let nps = if secs > 0.0 { total as f64 / secs } else { 0.0 };

    println!(
        "bestmove {}",
        report.best_move.map(|m| m.to_uci()).as_deref().unwrap_or("(none)")
    );
    println!("score {} depth {} ({:?})", report.score, report.depth, report.termination);
    println!("pv {}", san.join(" "));
    println!(
        "nodes {} qnodes {} time {:.3}s nps {:.0}",
        report.nodes, report.qnodes, secs, nps
    );
    let stats = &report.stats;
    println!(
        "evals {} full {} tt hits {} pawn hits {}/{}",
        stats.evals,
        stats.full_evals,
        stats.tt_hits,
        stats.pawn_hits,
        stats.pawn_hits + stats.pawn_misses
    );
}

fn run_perft(fen: Option<&str>, depth: u32, divide: bool) -> anyhow::Result<()> {
    let fen = fen.unwrap_or(FenParser::STARTPOS);
    let mut pos = Position::from_fen(fen).with_context(|| format!("parsing {fen}"))?;
    let started = Instant::now();

    let total = if divide {
        let counts = perft_divide(&mut pos, depth);
        for (mv, nodes) in &counts {
            println!("{mv}: {nodes}");
        }
        counts.iter().map(|(_, n)| n).sum()
    } else {
        let mut buf = MoveBuffer::new();
        perft(&mut pos, &mut buf, 0, depth)
    };

    println!("perft({depth}) = {total} in {:.3}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn run_epd(config: EngineConfig, file: &Path, limits: &LimitArgs) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let mut engine = Engine::new(config).context("creating engine")?;

    let mut total = 0usize;
    let mut solved = 0usize;
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record = match EpdRecord::parse(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed record");
                continue;
            }
        };
        let outcome = engine
            .solve_epd(&record, limits.limits())
            .with_context(|| format!("line {}", lineno + 1))?;

        total += 1;
        if outcome.correct {
            solved += 1;
        }
        println!(
            "{:<16} {:<8} {} {}",
            outcome.id.as_deref().unwrap_or("-"),
            outcome
                .report
                .best_move
                .map(|m| m.to_uci())
                .as_deref()
                .unwrap_or("-"),
            if outcome.correct { "ok" } else { "FAIL" },
            outcome.report.score
        );
    }

    println!("solved {solved}/{total}");
    Ok(())
}

fn run_analyze(config: EngineConfig, fen: Option<&str>, limits: &LimitArgs) -> anyhow::Result<()> {
    let mut engine = engine_at(config, fen)?;
    let stop = engine.stop_handle();

    // Enter (or end of input) stops the analysis. The reader thread is left
    // blocked on stdin if the search ends first; it dies with the process.
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        stop.store(true, Ordering::Relaxed);
    });

    let root = engine.position().clone();
    let report = engine.search(limits.limits(), SearchMode::Analyze);
    print_report(&root, &report);
    Ok(())
}
