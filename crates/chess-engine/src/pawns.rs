//! Pawn structure evaluation.
//!
//! Both sides are scored by one routine that works in the side's own frame
//! of reference: rank 0 is its first rank and pawns advance towards rank 7.
//! Black's board is mirrored before the routine sees it.

use chess_core::Color;

use crate::tables::{
    at, BACKWARD_HALFOPEN, BACKWARD_PAWN, BLACK_PAWN, CONNECTED_PASSED_PAWNS, DOUBLED_PAWN,
    FIXED_BACKWARD_PAWN, FIXED_LIGHTLY_BACKWARD_PAWN, ISOLATED_HALFOPEN, ISOLATED_PAWN,
    LIGHTLY_BACKWARD_PAWN, WHITE_PAWN,
};
use crate::Position;

/// Pawn structure summary, cached per pawn configuration.
///
/// File sets are bytes with bit `f` standing for file `f`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PawnInfo {
    /// White-relative structure score.
    pub score: i32,
    /// Files holding at least one pawn of the side.
    pub files: [u8; 2],
    /// Files with an isolated or backward pawn.
    pub weak: [u8; 2],
    /// Files with a passed pawn.
    pub passed: [u8; 2],
}

impl PawnInfo {
    /// No pawn of `color` on `file`.
    #[inline]
    pub fn half_open(&self, color: Color, file: u8) -> bool {
        self.files[color.index()] & (1 << file) == 0
    }
}

const FILE_A: u64 = 0x0101_0101_0101_0101;

/// Pawns of one color seen from one side, bit `rank * 8 + file`.
#[derive(Debug, Clone, Copy, Default)]
struct PawnGrid(u64);

impl PawnGrid {
    fn collect(pos: &Position, color: Color, view: Color) -> Self {
        let mut bits = 0u64;
        for entry in pos.pawns_of(color) {
            let sq = entry.square;
            let rank = match view {
                Color::White => sq.rank_index(),
                Color::Black => 7 - sq.rank_index(),
            };
            bits |= 1 << (rank * 8 + sq.file_index());
        }
        PawnGrid(bits)
    }

    /// Off-board coordinates hold no pawn.
    #[inline]
    fn has(self, file: i32, rank: i32) -> bool {
        (0..8).contains(&file) && (0..8).contains(&rank) && self.0 & (1 << (rank * 8 + file)) != 0
    }

    #[inline]
    fn on_file(self, file: i32) -> u32 {
        if (0..8).contains(&file) {
            (self.0 & (FILE_A << file)).count_ones()
        } else {
            0
        }
    }

    #[inline]
    fn beside(self, file: i32, rank: i32) -> bool {
        self.has(file - 1, rank) || self.has(file + 1, rank)
    }

    fn squares(self) -> impl Iterator<Item = (i32, i32)> {
        (0..64)
            .filter(move |bit| self.0 & (1u64 << bit) != 0)
            .map(|bit| (bit % 8, bit / 8))
    }
}

/// Side-relative score plus the weak and passed file sets of one side.
fn side_structure(own: PawnGrid, enemy: PawnGrid) -> (i32, u8, u8) {
    let mut score = 0;
    let mut weak = 0u8;
    let mut passed = 0u8;

    for (file, rank) in own.squares() {
        let bit = 1u8 << file;

        if own.on_file(file - 1) == 0 && own.on_file(file + 1) == 0 {
            score -= ISOLATED_PAWN;
            weak |= bit;
            if enemy.on_file(file) == 0 {
                score -= ISOLATED_HALFOPEN;
            }
        } else if !(1..=rank).any(|r| own.beside(file, r)) {
            // Nothing beside or behind it can ever defend it.
            weak |= bit;
            score += rank;
            let fixed = enemy.beside(file, rank + 2);
            score -= match (own.beside(file, rank + 1), fixed) {
                (true, true) => FIXED_LIGHTLY_BACKWARD_PAWN,
                (true, false) => LIGHTLY_BACKWARD_PAWN,
                (false, true) => FIXED_BACKWARD_PAWN,
                (false, false) => BACKWARD_PAWN,
            };
            if enemy.on_file(file) == 0 {
                score -= BACKWARD_HALFOPEN;
            }
        }

        let blocked = (rank + 1..7)
            .any(|r| enemy.has(file - 1, r) || enemy.has(file, r) || enemy.has(file + 1, r));
        if !blocked {
            score += 1 << rank;
            passed |= bit;
            if own.beside(file, rank - 1) {
                score += 1 << rank;
            }
        }
    }

    // Connected passers, scored by the rank of the rearmost pawn of the pair.
    for file in 0..7 {
        if passed & (0b11 << file) != 0b11 << file {
            continue;
        }
        let (mut left, mut right) = (false, false);
        for rank in (1..=6).rev() {
            left |= own.has(file, rank);
            right |= own.has(file + 1, rank);
            if left && right {
                score += CONNECTED_PASSED_PAWNS << (rank - 1);
                break;
            }
        }
    }

    (score, weak, passed)
}

/// Evaluates the pawn structure from scratch.
pub fn analyse_pawns(pos: &Position) -> PawnInfo {
    let mut info = PawnInfo::default();
    let mut score = 0;

    for entry in pos.pawns_of(Color::White) {
        score += at(&WHITE_PAWN, entry.square);
    }
    for entry in pos.pawns_of(Color::Black) {
        score -= at(&BLACK_PAWN, entry.square);
    }

    let white = PawnGrid::collect(pos, Color::White, Color::White);
    let black = PawnGrid::collect(pos, Color::Black, Color::White);
    for file in 0..8 {
        for (color, grid) in [(Color::White, white), (Color::Black, black)] {
            let count = grid.on_file(file) as i32;
            if count >= 1 {
                info.files[color.index()] |= 1 << file;
            }
            if count > 1 {
                score -= color.sign() * DOUBLED_PAWN * (count - 1);
            }
        }
    }

    let (white_score, white_weak, white_passed) = side_structure(white, black);
    let (black_score, black_weak, black_passed) = side_structure(
        PawnGrid::collect(pos, Color::Black, Color::Black),
        PawnGrid::collect(pos, Color::White, Color::Black),
    );
    score += white_score - black_score;

    info.score = score;
    info.weak = [white_weak, black_weak];
    info.passed = [white_passed, black_passed];
    info
}

#[cfg(test)]
mod tests {
    use chess_core::Square;

    use super::*;

    fn file_bit(sq: Square) -> u8 {
        1 << sq.file_index()
    }

    fn info(fen: &str) -> PawnInfo {
        analyse_pawns(&Position::from_fen(fen).unwrap())
    }

    #[test]
    fn start_position_is_balanced() {
        let start = info(chess_core::FenParser::STARTPOS);
        assert_eq!(start.score, 0);
        assert_eq!(start.files, [0xff, 0xff]);
        assert_eq!(start.weak, [0, 0]);
        assert_eq!(start.passed, [0, 0]);
    }

    #[test]
    fn mirrored_structure_negates_score() {
        let white = info("4k3/8/8/8/2P5/8/P4PP1/4K3 w - - 0 1");
        let black = info("4k3/p4pp1/8/2p5/8/8/8/4K3 b - - 0 1");
        assert_ne!(white.score, 0);
        assert_eq!(white.score, -black.score);
        assert_eq!(white.passed[0], black.passed[1]);
        assert_eq!(white.weak[0], black.weak[1]);
    }

    #[test]
    fn isolated_pawn_on_half_open_file() {
        // a2 alone: isolated and no black pawn on the a-file, but passed.
        let lone = info("4k3/8/8/8/8/8/P7/4K3 w - - 0 1");
        let expected = -ISOLATED_PAWN - ISOLATED_HALFOPEN + (1 << 1);
        assert_eq!(lone.score, expected);
        assert_eq!(lone.weak[0], 1);
        assert_eq!(lone.passed[0], 1);
    }

    #[test]
    fn doubled_pawns_are_penalised() {
        // b2 alone and a7 alone cancel out: both isolated, neither passed.
        let single = info("4k3/p7/8/8/8/8/1P6/4K3 w - - 0 1");
        assert_eq!(single.score, 0);
        let doubled = info("4k3/p7/8/8/8/1P6/1P6/4K3 w - - 0 1");
        assert_eq!(
            doubled.score,
            single.score - ISOLATED_PAWN - ISOLATED_HALFOPEN - DOUBLED_PAWN
        );
        assert_eq!(doubled.files[0], file_bit(Square::B1));
    }

    #[test]
    fn connected_passers_get_bonus() {
        let pair = info("4k3/8/8/8/3PP3/8/8/4K3 w - - 0 1");
        assert_eq!(pair.passed[0], 0b0001_1000);
        assert_eq!(pair.weak[0], 0);
        let pst = at(&WHITE_PAWN, Square::D1.offset(0x30).unwrap()) * 2;
        assert_eq!(pair.score, pst + 2 * (1 << 3) + (CONNECTED_PASSED_PAWNS << 2));
    }

    #[test]
    fn pawn_left_behind_is_weak() {
        let behind = info("4k3/8/8/8/4P3/3P4/8/4K3 w - - 0 1");
        assert_ne!(behind.weak[0] & file_bit(Square::D1), 0);
        assert_eq!(behind.weak[0] & file_bit(Square::E1), 0);
        // d3: rank bonus, lightly backward, half open, passed.
        let d3 = 2 - LIGHTLY_BACKWARD_PAWN - BACKWARD_HALFOPEN + (1 << 2);
        // e4: passed and protected by d3.
        let e4 = 2 * (1 << 3);
        let pst = 1 + 3;
        assert_eq!(behind.score, pst + d3 + e4 + (CONNECTED_PASSED_PAWNS << 1));
    }
}
