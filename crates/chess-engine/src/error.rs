//! Errors raised at the engine boundary.
//!
//! Inside the search nothing is reported through `Result`: an illegal move is
//! a `false` from `make_move`, an abort is a flag. These errors cover setup,
//! root moves and configuration.

use chess_core::{Color, FenError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::san::SanError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Fen(#[from] FenError),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error(transparent)]
    San(#[from] SanError),

    #[error("no move to take back")]
    NothingToUnmake,

    #[error("{0} king missing from position")]
    MissingKing(Color),

    #[error("{0} has too many pieces for the piece list")]
    TooManyPieces(Color),

    #[error("could not allocate hash table with {bits} index bits")]
    TableAllocation { bits: u32 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
