//! Core types for chess.
//!
//! This crate provides the fundamental types used across the engine:
//! - [`Piece`] and [`Color`] for piece representation
//! - [`Square`], [`File`], and [`Rank`] for 0x88 board coordinates
//! - [`Move`] and [`Special`] for move representation
//! - FEN parsing and EPD test records

mod color;
mod epd;
mod fen;
mod mov;
mod piece;
mod square;

pub use color::Color;
pub use epd::{strip_san, EpdError, EpdRecord};
pub use fen::{FenError, FenParser};
pub use mov::{Move, Special};
pub use piece::Piece;
pub use square::{File, Rank, Square};
