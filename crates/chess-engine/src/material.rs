//! Incremental material bookkeeping.
//!
//! Each side keeps its officer counts and its pawn count. Common officer
//! distributions (up to three knights, bishops and rooks and one queen)
//! map onto a 7-bit index into a precomputed value table; anything more
//! exotic falls back to summing the counts directly.

use chess_core::Piece;

/// Material of one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Material {
    knights: u8,
    bishops: u8,
    rooks: u8,
    queens: u8,
    pawns: u8,
}

const fn table_value(index: usize) -> i32 {
    let n = (index & 3) as i32;
    let b = ((index >> 2) & 3) as i32;
    let r = ((index >> 4) & 3) as i32;
    let q = ((index >> 6) & 1) as i32;
    n * Piece::Knight.value() + b * Piece::Bishop.value() + r * Piece::Rook.value()
        + q * Piece::Queen.value()
}

static PIECE_VALUES: [i32; 128] = {
    let mut table = [0; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = table_value(i);
        i += 1;
    }
    table
};

impl Material {
    /// Adds one piece. Kings are not counted.
    #[inline]
    pub fn add(&mut self, piece: Piece) {
        match piece {
            Piece::Pawn => self.pawns += 1,
            Piece::Knight => self.knights += 1,
            Piece::Bishop => self.bishops += 1,
            Piece::Rook => self.rooks += 1,
            Piece::Queen => self.queens += 1,
            Piece::King => {}
        }
    }

    #[inline]
    pub fn remove(&mut self, piece: Piece) {
        match piece {
            Piece::Pawn => self.pawns -= 1,
            Piece::Knight => self.knights -= 1,
            Piece::Bishop => self.bishops -= 1,
            Piece::Rook => self.rooks -= 1,
            Piece::Queen => self.queens -= 1,
            Piece::King => {}
        }
    }

    /// Index into the value table for common distributions.
    #[inline]
    pub const fn signature_index(self) -> Option<usize> {
        if self.knights > 3 || self.bishops > 3 || self.rooks > 3 || self.queens > 1 {
            return None;
        }
        Some(
            self.knights as usize
                | (self.bishops as usize) << 2
                | (self.rooks as usize) << 4
                | (self.queens as usize) << 6,
        )
    }

    /// Value of the officers, kings excluded.
    #[inline]
    pub fn piece_value(self) -> i32 {
        match self.signature_index() {
            Some(index) => PIECE_VALUES[index],
            None => {
                self.knights as i32 * Piece::Knight.value()
                    + self.bishops as i32 * Piece::Bishop.value()
                    + self.rooks as i32 * Piece::Rook.value()
                    + self.queens as i32 * Piece::Queen.value()
            }
        }
    }

    #[inline]
    pub const fn pawn_value(self) -> i32 {
        self.pawns as i32 * Piece::Pawn.value()
    }

    #[inline]
    pub const fn pawns(self) -> u8 {
        self.pawns
    }

    #[inline]
    pub const fn count(self, piece: Piece) -> u8 {
        match piece {
            Piece::Pawn => self.pawns,
            Piece::Knight => self.knights,
            Piece::Bishop => self.bishops,
            Piece::Rook => self.rooks,
            Piece::Queen => self.queens,
            Piece::King => 0,
        }
    }
}
