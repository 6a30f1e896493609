//! Piece-square tables and evaluation weights.
//!
//! Tables are laid out rank by rank from the first rank up and indexed with
//! [`Square::index64`]. Unless a table is split by color, black reads the
//! same entry as white; all such tables are symmetric between the first and
//! eighth rank.

use chess_core::Square;

pub const ROOK_HALFOPEN_FILE: i32 = 8;
pub const ROOK_OPEN_FILE: i32 = 12;
pub const ROOK_7TH_RANK: i32 = 10;
pub const ROOKPAIR_7TH_RANK: i32 = 50;

pub const DOUBLED_PAWN: i32 = 5;
pub const ISOLATED_PAWN: i32 = 10;
pub const ISOLATED_HALFOPEN: i32 = 10;
pub const BACKWARD_PAWN: i32 = 8;
pub const FIXED_BACKWARD_PAWN: i32 = 10;
pub const LIGHTLY_BACKWARD_PAWN: i32 = 2;
pub const FIXED_LIGHTLY_BACKWARD_PAWN: i32 = 5;
pub const BACKWARD_HALFOPEN: i32 = 10;
pub const CONNECTED_PASSED_PAWNS: i32 = 6;

/// Bonus by the number of squares a rook reaches sideways on its rank.
pub const ROOK_SIDE_TO_SIDE: [i32; 8] = [-20, -12, -2, -1, 0, 1, 2, 3];

/// Reads a table entry for `sq`.
#[inline]
pub fn at(table: &[i32; 64], sq: Square) -> i32 {
    table[sq.index64()]
}

#[rustfmt::skip]
pub static KNIGHT: [i32; 64] = [
    -15, -10, -6, -5, -5, -6, -10, -15,
     -8,  -7, -2,  0,  0, -2,  -7,  -8,
     -5,  -2,  5,  5,  5,  5,  -2,  -5,
     -4,   0,  5, 10, 10,  5,   0,  -4,
     -4,   0,  5, 10, 10,  5,   0,  -4,
     -5,  -2,  5,  5,  5,  5,  -2,  -5,
     -8,  -7, -2,  0,  0, -2,  -7,  -8,
    -15, -10, -6, -5, -5, -6, -10, -15,
];

#[rustfmt::skip]
pub static BISHOP: [i32; 64] = [
    -3, -2, -1, -1, -1, -1, -2, -3,
    -2,  1,  0,  0,  0,  0,  1, -2,
    -1,  0,  1,  1,  1,  1,  0, -1,
    -1,  0,  1,  2,  2,  1,  0, -1,
    -1,  0,  1,  2,  2,  1,  0, -1,
    -1,  0,  1,  1,  1,  1,  0, -1,
    -2,  1,  0,  0,  0,  0,  1, -2,
    -3, -2, -1, -1, -1, -1, -2, -3,
];

#[rustfmt::skip]
pub static QUEEN: [i32; 64] = [
    -5, -4, -3,  0, -1, -3, -4, -5,
    -4, -3,  0,  1,  1,  0, -3, -4,
    -3,  0,  1,  1,  1,  1,  0, -3,
    -1,  0,  1,  1,  1,  1,  0, -1,
    -1,  0,  1,  1,  1,  1,  0, -1,
    -3,  0,  1,  1,  1,  1,  0, -3,
    -4, -3,  0,  1,  1,  0, -3, -4,
    -5, -4, -3,  0, -1, -3, -4, -5,
];

#[rustfmt::skip]
pub static WHITE_PAWN: [i32; 64] = [
    0, 0, 0,  0,  0, 0, 0, 0,
    0, 0, 0, -1, -1, 0, 0, 0,
    0, 0, 0,  1,  1, 0, 0, 0,
    0, 0, 0,  3,  3, 0, 0, 0,
    0, 0, 0,  3,  3, 0, 0, 0,
    3, 3, 3,  3,  3, 3, 3, 3,
    5, 5, 5,  5,  5, 5, 5, 5,
    0, 0, 0,  0,  0, 0, 0, 0,
];

/// Bonus for black pawns, subtracted from the white-relative score.
#[rustfmt::skip]
pub static BLACK_PAWN: [i32; 64] = [
    0, 0, 0,  0,  0, 0, 0, 0,
    5, 5, 5,  5,  5, 5, 5, 5,
    3, 3, 3,  3,  3, 3, 3, 3,
    0, 0, 0,  3,  3, 0, 0, 0,
    0, 0, 0,  3,  3, 0, 0, 0,
    0, 0, 0,  1,  1, 0, 0, 0,
    0, 0, 0, -1, -1, 0, 0, 0,
    0, 0, 0,  0,  0, 0, 0, 0,
];

/// King placement while there is enough material for an attack.
#[rustfmt::skip]
pub static KING: [i32; 64] = [
    16, 20, 10, 3, 10, 5, 22, 15,
     6,  9,  3, 2,  2, 3, 13, 10,
     2,  2,  1, 1,  1, 1,  2,  2,
     0,  0,  0, 0,  0, 0,  0,  0,
     0,  0,  0, 0,  0, 0,  0,  0,
     2,  2,  1, 1,  1, 1,  2,  2,
     6,  9,  3, 2,  2, 3, 13, 10,
    16, 20, 10, 3, 10, 5, 22, 15,
];

/// Centralisation of the king in the ending.
#[rustfmt::skip]
pub static KING_ENDGAME: [i32; 64] = [
    0, 1, 2,  3,  3, 2, 1, 0,
    1, 3, 5,  6,  6, 5, 3, 1,
    3, 5, 6,  8,  8, 6, 5, 3,
    4, 5, 8, 10, 10, 8, 5, 4,
    4, 5, 8, 10, 10, 8, 5, 4,
    3, 5, 6,  8,  8, 6, 5, 3,
    1, 3, 5,  6,  6, 5, 3, 1,
    0, 1, 2,  3,  3, 2, 1, 0,
];

/// Where the defending king stands against bishop and knight with a dark
/// squared bishop. Low values are the mating corners a1 and h8.
#[rustfmt::skip]
pub static KING_BN_DARK: [i32; 64] = [
    0, 1, 2, 3, 4, 5, 6, 7,
    1, 2, 3, 4, 5, 6, 6, 6,
    2, 3, 4, 8, 8, 6, 6, 5,
    3, 4, 6, 8, 8, 8, 5, 4,
    4, 5, 8, 8, 8, 6, 4, 3,
    5, 6, 6, 5, 5, 4, 3, 2,
    6, 6, 6, 5, 4, 3, 2, 1,
    7, 6, 5, 4, 3, 2, 1, 0,
];

/// Same for a light squared bishop, mating in a8 and h1.
#[rustfmt::skip]
pub static KING_BN_LIGHT: [i32; 64] = [
    7, 6, 5, 4, 3, 2, 1, 0,
    6, 6, 6, 5, 4, 3, 2, 1,
    5, 6, 6, 5, 5, 4, 3, 2,
    4, 5, 8, 8, 8, 6, 4, 3,
    3, 4, 6, 8, 8, 8, 5, 4,
    2, 3, 4, 8, 8, 6, 6, 5,
    1, 2, 3, 4, 5, 6, 6, 6,
    0, 1, 2, 3, 4, 5, 6, 7,
];
