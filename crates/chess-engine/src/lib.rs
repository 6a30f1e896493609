//! Alpha-beta chess engine on a 0x88 board.
//!
//! This crate provides:
//! - [`Position`] - board of piece-list indices with per-ply flags, Zobrist
//!   keys and incremental material
//! - Move generation, static exchange evaluation and make/undo
//! - [`Engine`] - position, game history and hash tables behind one API,
//!   with search, ponder and analysis modes
//! - SAN parsing and formatting, perft
//!
//! # Architecture
//!
//! Squares are indices into a 128 entry board where `sq & 0x88 != 0` marks
//! the off-board half. Each board square holds an index into a piece list
//! partitioned by colour into officers (king first) and pawns.
//!
//! The search works on a single position. Moves for all plies share one
//! buffer; every frame owns the range it generated into and clears it
//! before returning.
//!
//! # Example
//!
//! ```
//! use chess_engine::{Engine, EngineConfig, SearchLimits, SearchMode};
//!
//! let config = EngineConfig { tt_bits: 12, pawn_bits: 9, ..EngineConfig::default() };
//! let mut engine = Engine::new(config).unwrap();
//! engine.make_root_move_text("e4").unwrap();
//! engine.make_root_move_text("e7e5").unwrap();
//!
//! let report = engine.search(SearchLimits::depth(3), SearchMode::Search);
//! println!("best move: {:?}", report.best_move.map(|m| m.to_uci()));
//! ```

mod config;
mod engine;
mod error;
mod evaluate;
mod execute;
mod material;
pub mod movegen;
mod order;
mod pawns;
mod position;
mod repetition;
pub mod san;
mod search;
mod tables;
mod tt;
mod zobrist;

/// Deepest ply the search tables are sized for.
pub const MAX_SEARCH_DEPTH: usize = 70;
/// Capacity of the shared move buffer.
pub const MAX_MOVE_ARRAY: usize = 1800;
/// Slots in the per-ply flag array.
pub const MAX_MOVE_FLAGS: usize = 300;

pub use config::{ConfigError, EngineConfig, EngineOptions};
pub use engine::{Engine, EpdOutcome};
pub use error::EngineError;
pub use evaluate::GamePhase;
pub use material::Material;
pub use movegen::perft::{perft, perft_divide};
pub use movegen::{generate_captures, generate_moves, legal_moves, MoveBuffer};
pub use position::{CastlingRights, PlyFlags, Position};
pub use repetition::Repetition;
pub use san::{line_to_san, move_to_san, parse_san, SanError};
pub use search::{
    MaxDepthReason, SearchLimits, SearchMode, SearchReport, SearchState, SearchStats, Termination,
};
