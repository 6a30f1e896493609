//! Zobrist hashing for position identification.
//!
//! A position key is the XOR of:
//! - one key per (piece, color, square), with squares in 0x88 numbering
//! - the side key when black is to move
//! - one key per castling right held
//! - the en passant key of the target file, when a target is set
//!
//! The pawn key folds only the pawn terms, so it identifies the pawn
//! structure independent of everything else.

use chess_core::{Color, Piece, Square};

use crate::position::CastlingRights;

/// Zobrist hash keys.
///
/// Generated from a fixed seed so keys are identical across runs.
pub struct ZobristKeys {
    /// Keys for pieces: [piece][color][0x88 square]
    pub pieces: [[[u64; 128]; 2]; 6],
    /// XORed into the key when black is to move.
    pub black_to_move: u64,
    pub castling: [u64; 4],
    /// Keys for the en passant file.
    pub en_passant: [u64; 8],
}

impl ZobristKeys {
    /// Initializes the keys with a xorshift64 generator.
    pub const fn new() -> Self {
        const fn next_random(state: u64) -> u64 {
            let mut x = state;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            x
        }

        let mut state = 0x9E3779B97F4A7C15u64;
        let mut pieces = [[[0u64; 128]; 2]; 6];
        let mut castling = [0u64; 4];
        let mut en_passant = [0u64; 8];

        let mut piece = 0;
        while piece < 6 {
            let mut color = 0;
            while color < 2 {
                let mut square = 0;
                while square < 128 {
                    if square & 0x88 == 0 {
                        state = next_random(state);
                        pieces[piece][color][square] = state;
                    }
                    square += 1;
                }
                color += 1;
            }
            piece += 1;
        }

        state = next_random(state);
        let black_to_move = state;

        let mut i = 0;
        while i < 4 {
            state = next_random(state);
            castling[i] = state;
            i += 1;
        }

        let mut i = 0;
        while i < 8 {
            state = next_random(state);
            en_passant[i] = state;
            i += 1;
        }

        ZobristKeys {
            pieces,
            black_to_move,
            castling,
            en_passant,
        }
    }

    /// Returns the key for a piece on a square.
    #[inline]
    pub const fn piece_key(&self, piece: Piece, color: Color, square: Square) -> u64 {
        self.pieces[piece.index()][color.index()][square.index()]
    }

    /// XOR of the keys of every right in `rights`.
    ///
    /// Applied to `old ^ new` this gives the incremental update for a change
    /// of rights.
    #[inline]
    pub const fn castling_key(&self, rights: CastlingRights) -> u64 {
        let bits = rights.raw();
        let mut key = 0;
        let mut i = 0;
        while i < 4 {
            if bits & (1 << i) != 0 {
                key ^= self.castling[i];
            }
            i += 1;
        }
        key
    }

    /// Returns the key for an en passant target square (keyed by file).
    #[inline]
    pub const fn en_passant_key(&self, square: Square) -> u64 {
        self.en_passant[square.file_index() as usize]
    }
}

/// Global Zobrist keys (initialized at compile time).
pub static ZOBRIST: ZobristKeys = ZobristKeys::new();
