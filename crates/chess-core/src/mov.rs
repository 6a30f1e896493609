//! Move representation.

use crate::{Piece, Square};
use std::fmt;

/// Tag for moves that need more than a plain from/to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Special {
    /// Plain move or capture.
    #[default]
    Normal = 0,
    /// Pawn double push from its starting rank.
    DoubleAdvance = 1,
    /// En passant capture.
    EnPassant = 2,
    /// Castling, encoded as the king's move.
    Castling = 4,
    /// Pawn promotion, possibly with capture.
    Promotion = 8,
    /// Only from/to are known, as recovered from the transposition table.
    /// Must be resolved against generated moves before it is played.
    HashMove = 0xff,
}

/// A chess move.
///
/// Besides from/to and the special tag a move carries the piece it captures
/// and the piece it promotes to, so that undo never has to look anything up.
/// `key` is scratch space for move ordering and takes no part in equality.
#[derive(Clone, Copy)]
pub struct Move {
    from: Square,
    to: Square,
    special: Special,
    captured: Option<Piece>,
    promoted: Option<Piece>,
    /// Ordering priority assigned by the move orderer.
    pub key: i32,
}

impl Move {
    /// Placeholder for "no move". Never generated.
    pub const NULL: Move = Move {
        from: Square::A1,
        to: Square::A1,
        special: Special::Normal,
        captured: None,
        promoted: None,
        key: 0,
    };

    /// Creates a quiet move.
    #[inline]
    pub const fn new(from: Square, to: Square) -> Self {
        Self::with_special(from, to, Special::Normal)
    }

    /// Creates a move with the given special tag and no capture.
    #[inline]
    pub const fn with_special(from: Square, to: Square, special: Special) -> Self {
        Move {
            from,
            to,
            special,
            captured: None,
            promoted: None,
            key: 0,
        }
    }

    /// Creates a normal capture.
    #[inline]
    pub const fn capture(from: Square, to: Square, captured: Piece) -> Self {
        Move {
            from,
            to,
            special: Special::Normal,
            captured: Some(captured),
            promoted: None,
            key: 0,
        }
    }

    /// Creates an en passant capture.
    #[inline]
    pub const fn en_passant(from: Square, to: Square) -> Self {
        Move {
            from,
            to,
            special: Special::EnPassant,
            captured: Some(Piece::Pawn),
            promoted: None,
            key: 0,
        }
    }

    /// Creates a promotion, optionally capturing.
    #[inline]
    pub const fn promotion(
        from: Square,
        to: Square,
        promoted: Piece,
        captured: Option<Piece>,
    ) -> Self {
        Move {
            from,
            to,
            special: Special::Promotion,
            captured,
            promoted: Some(promoted),
            key: 0,
        }
    }

    /// Creates an unresolved move that only knows its squares.
    #[inline]
    pub const fn hash_move(from: Square, to: Square) -> Self {
        Self::with_special(from, to, Special::HashMove)
    }

    #[inline]
    pub const fn from(self) -> Square {
        self.from
    }

    #[inline]
    pub const fn to(self) -> Square {
        self.to
    }

    #[inline]
    pub const fn special(self) -> Special {
        self.special
    }

    #[inline]
    pub const fn captured(self) -> Option<Piece> {
        self.captured
    }

    #[inline]
    pub const fn promoted(self) -> Option<Piece> {
        self.promoted
    }

    /// Packed from/to pair used to compare moves by squares only.
    #[inline]
    pub const fn from_to(self) -> u16 {
        self.from.raw() as u16 | (self.to.raw() as u16) << 8
    }

    /// True for captures and promotions, the moves quiescence cares about.
    #[inline]
    pub const fn is_tactical(self) -> bool {
        self.captured.is_some() || self.promoted.is_some()
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.from.raw() == self.to.raw()
    }

    /// Copies the resolved tag and payload of `other` into this move.
    pub fn resolve_from(&mut self, other: &Move) {
        self.special = other.special;
        self.captured = other.captured;
        self.promoted = other.promoted;
    }

    /// Returns the coordinate notation for this move (e.g., "e2e4", "e7e8q").
    pub fn to_uci(self) -> String {
        let promo = match self.promoted {
            Some(Piece::Knight) => "n",
            Some(Piece::Bishop) => "b",
            Some(Piece::Rook) => "r",
            Some(Piece::Queen) => "q",
            _ => "",
        };
        format!("{}{}{}", self.from, self.to, promo)
    }

    /// Parses a move from coordinate notation.
    ///
    /// Only squares and the promotion piece are known afterwards; the move
    /// has to be verified against the position before it can be played.
    pub fn from_uci(s: &str) -> Option<Self> {
        if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        if s.len() == 5 {
            let promoted = match s.as_bytes()[4].to_ascii_lowercase() {
                b'n' => Piece::Knight,
                b'b' => Piece::Bishop,
                b'r' => Piece::Rook,
                b'q' => Piece::Queen,
                _ => return None,
            };
            Some(Move::promotion(from, to, promoted, None))
        } else {
            Some(Move::hash_move(from, to))
        }
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.special == other.special
            && self.captured == other.captured
            && self.promoted == other.promoted
    }
}

impl Eq for Move {}

impl Default for Move {
    fn default() -> Self {
        Move::NULL
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({}, {:?})", self.to_uci(), self.special)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}
