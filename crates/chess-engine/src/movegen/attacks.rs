//! Attack detection on the 0x88 board.
//!
//! On a 0x88 board the difference of two squares identifies their geometric
//! relation uniquely, so two 256-entry tables indexed by `to - from + 128`
//! answer "which piece kinds can reach `to` from `from`" and "which unit step
//! walks from `from` toward `to`" without any per-direction search.

use chess_core::{Color, Piece, Square};

use crate::Position;

pub const UP: i16 = 16;
pub const DOWN: i16 = -16;
pub const LEFT: i16 = -1;
pub const RIGHT: i16 = 1;
pub const UP_RIGHT: i16 = 17;
pub const UP_LEFT: i16 = 15;
pub const DOWN_RIGHT: i16 = -15;
pub const DOWN_LEFT: i16 = -17;

pub const KNIGHT_STEPS: [i16; 8] = [33, 31, 18, 14, -33, -31, -18, -14];
pub const KING_STEPS: [i16; 8] = [UP, DOWN, LEFT, RIGHT, UP_RIGHT, UP_LEFT, DOWN_RIGHT, DOWN_LEFT];
pub const BISHOP_DIRS: [i16; 4] = [UP_RIGHT, UP_LEFT, DOWN_RIGHT, DOWN_LEFT];
pub const ROOK_DIRS: [i16; 4] = [UP, LEFT, RIGHT, DOWN];

struct Geometry {
    relation: [u8; 256],
    step: [i16; 256],
}

const fn build_geometry() -> Geometry {
    let mut relation = [0u8; 256];
    let mut step = [0i16; 256];

    let mut i = 0;
    while i < 8 {
        relation[(128 + KNIGHT_STEPS[i]) as usize] |= Piece::KNIGHT_BIT;
        relation[(128 + KING_STEPS[i]) as usize] |= Piece::KING_BIT;
        i += 1;
    }

    let mut d = 0;
    while d < 4 {
        let mut k = 1;
        while k < 8 {
            let rook = ROOK_DIRS[d] * k;
            relation[(128 + rook) as usize] |= Piece::ROOK_BIT;
            step[(128 + rook) as usize] = ROOK_DIRS[d];
            let bishop = BISHOP_DIRS[d] * k;
            relation[(128 + bishop) as usize] |= Piece::BISHOP_BIT;
            step[(128 + bishop) as usize] = BISHOP_DIRS[d];
            k += 1;
        }
        d += 1;
    }

    Geometry { relation, step }
}

static GEOMETRY: Geometry = build_geometry();

/// Attack bits of the piece kinds that can move from `from` to `to` on an
/// empty board.
#[inline]
pub fn relation(from: Square, to: Square) -> u8 {
    GEOMETRY.relation[(to.raw() as i16 - from.raw() as i16 + 128) as usize]
}

/// Unit step leading from `from` toward `to` along a line, 0 if none.
#[inline]
pub fn step(from: Square, to: Square) -> i16 {
    GEOMETRY.step[(to.raw() as i16 - from.raw() as i16 + 128) as usize]
}

/// Squares from which a pawn of `color` attacks a target, as offsets from it.
#[inline]
pub const fn pawn_attack_origins(color: Color) -> [i16; 2] {
    match color {
        Color::White => [DOWN_LEFT, DOWN_RIGHT],
        Color::Black => [UP_LEFT, UP_RIGHT],
    }
}

impl Position {
    /// Returns true if a piece of `color` pseudo-attacks `sq`.
    pub fn attacks(&self, color: Color, sq: Square) -> bool {
        for slot in self.officer_slots(color) {
            let Some(entry) = self.plist[slot] else {
                continue;
            };
            if relation(entry.square, sq) & entry.piece.attack_bits() == 0 {
                continue;
            }
            if !entry.piece.is_slider() || self.ray_is_clear(entry.square, sq) {
                return true;
            }
        }

        pawn_attack_origins(color).into_iter().any(|offset| {
            sq.offset(offset)
                .is_some_and(|from| self.piece_at(from) == Some((Piece::Pawn, color)))
        })
    }

    /// True when every square strictly between `from` and `to` is empty.
    /// The squares must share a line.
    pub(crate) fn ray_is_clear(&self, from: Square, to: Square) -> bool {
        let dir = step(from, to);
        debug_assert!(dir != 0, "{from} and {to} share no line");
        let target = to.raw() as i16;
        let mut s = from.raw() as i16 + dir;
        while s != target {
            if self.board[s as usize].is_some() {
                return false;
            }
            s += dir;
        }
        true
    }

    /// Returns true if the king of `color` is attacked.
    #[inline]
    pub fn in_check(&self, color: Color) -> bool {
        self.attacks(color.opposite(), self.king_square(color))
    }
}
