//! Static evaluation.
//!
//! Scores are computed from White's point of view and turned towards the
//! side to move on return. The game phase is decided once per search at
//! the root and selects between the middlegame and the endgame routine.
//!
//! Both routines are lazy: when material alone is so far outside the
//! window that no positional term seen so far could bring it back, the
//! material score is returned as is. The largest positional swing observed
//! in a full evaluation is tracked and widens the margin over time.

use chess_core::{Color, Piece, Square};

use crate::movegen::{LEFT, RIGHT};
use crate::pawns::{analyse_pawns, PawnInfo};
use crate::search::SearchStats;
use crate::tables::{
    at, BISHOP, KING, KING_BN_DARK, KING_BN_LIGHT, KING_ENDGAME, KNIGHT, QUEEN, ROOKPAIR_7TH_RANK,
    ROOK_7TH_RANK, ROOK_HALFOPEN_FILE, ROOK_OPEN_FILE, ROOK_SIDE_TO_SIDE,
};
use crate::tt::PawnTable;
use crate::{EngineError, Position};

/// Officer material below which a side no longer counts as attacking.
const ENDGAME_MATERIAL: i32 = 1400;
/// Officer material below which zugzwang makes null move unsound.
const NULL_MOVE_MATERIAL: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    Middlegame,
    Endgame,
    /// Endgame without a single pawn left.
    Pawnless,
}

/// Classifies the position by officer material.
///
/// The second value tells whether null move pruning stays sound; it is
/// switched off when both sides are low on material.
pub fn classify(pos: &Position) -> (GamePhase, bool) {
    let white = pos.material(Color::White);
    let black = pos.material(Color::Black);
    let (wpi, bpi) = (white.piece_value(), black.piece_value());

    if wpi < ENDGAME_MATERIAL && bpi < ENDGAME_MATERIAL {
        let phase = if white.pawns() == 0 && black.pawns() == 0 {
            GamePhase::Pawnless
        } else {
            GamePhase::Endgame
        };
        let null_move = !(wpi < NULL_MOVE_MATERIAL && bpi < NULL_MOVE_MATERIAL);
        return (phase, null_move);
    }
    (GamePhase::Middlegame, true)
}

pub struct Evaluator {
    pawn_table: PawnTable,
    phase: GamePhase,
    max_pos_score: i32,
    full_eval: bool,
}

impl Evaluator {
    pub fn new(pawn_bits: u32, full_eval: bool) -> Result<Self, EngineError> {
        Ok(Evaluator {
            pawn_table: PawnTable::new(pawn_bits)?,
            phase: GamePhase::Middlegame,
            max_pos_score: Piece::Pawn.value(),
            full_eval,
        })
    }

    /// Forgets cached pawn structures and the observed positional range.
    pub fn reset(&mut self) {
        self.pawn_table.clear();
        self.max_pos_score = Piece::Pawn.value();
    }

    pub fn clear_pawn_table(&mut self) {
        self.pawn_table.clear();
    }

    /// Index bits of the pawn table actually allocated.
    pub fn pawn_bits(&self) -> u32 {
        self.pawn_table.bits()
    }

    pub fn set_phase(&mut self, phase: GamePhase) {
        self.phase = phase;
    }

    pub fn set_full_eval(&mut self, full_eval: bool) {
        self.full_eval = full_eval;
    }

    /// Largest positional contribution seen so far.
    pub fn max_pos_score(&self) -> i32 {
        self.max_pos_score
    }

    /// Scores `pos` for the side to move.
    pub fn evaluate(
        &mut self,
        pos: &Position,
        alpha: i32,
        beta: i32,
        stats: &mut SearchStats,
    ) -> i32 {
        stats.evals += 1;
        match self.phase {
            GamePhase::Endgame | GamePhase::Pawnless => self.endgame(pos, alpha, beta, stats),
            GamePhase::Middlegame => self.middlegame(pos, alpha, beta, stats),
        }
    }

    /// True if `score` (side relative) cannot reach the window.
    fn lazy_cutoff(&self, score: i32, alpha: i32, beta: i32) -> bool {
        !self.full_eval
            && (score + self.max_pos_score < alpha || score - self.max_pos_score > beta)
    }

    fn record_positional(&mut self, score: i32, material: i32) {
        self.max_pos_score = self.max_pos_score.max((score - material).abs());
    }

    /// Pawn structure of `pos`, from the table when possible.
    pub fn pawns(&mut self, pos: &Position, stats: &mut SearchStats) -> PawnInfo {
        let key = pos.pawn_hash();
        debug_assert_eq!(key, pos.compute_pawn_hash(), "pawn hash out of sync");
        if let Some(info) = self.pawn_table.probe(key) {
            stats.pawn_hits += 1;
            return info;
        }
        stats.pawn_misses += 1;
        let info = analyse_pawns(pos);
        self.pawn_table.store(key, info);
        info
    }

    fn middlegame(&mut self, pos: &Position, alpha: i32, beta: i32, stats: &mut SearchStats) -> i32 {
        let sign = pos.side_to_move().sign();
        let white = pos.material(Color::White);
        let black = pos.material(Color::Black);
        let material = white.piece_value() - black.piece_value() + white.pawn_value()
            - black.pawn_value();

        if self.lazy_cutoff(sign * material, alpha, beta) {
            return sign * material;
        }

        let pawns = self.pawns(pos, stats);
        let mut score = material + pawns.score;

        for color in Color::ALL {
            let mut rooks_on_seventh = 0;
            for entry in pos.officers_of(color) {
                let sq = entry.square;
                let bonus = match entry.piece {
                    Piece::Knight => at(&KNIGHT, sq),
                    Piece::Bishop => at(&BISHOP, sq),
                    Piece::Queen => at(&QUEEN, sq),
                    Piece::Rook => rook_bonus(pos, &pawns, color, sq, &mut rooks_on_seventh),
                    Piece::King | Piece::Pawn => 0,
                };
                score += color.sign() * bonus;
            }
        }

        score += at(&KING, pos.king_square(Color::White));
        score -= at(&KING, pos.king_square(Color::Black));

        stats.full_evals += 1;
        self.record_positional(score, material);
        sign * score
    }

    fn endgame(&mut self, pos: &Position, alpha: i32, beta: i32, stats: &mut SearchStats) -> i32 {
        let sign = pos.side_to_move().sign();
        let white = pos.material(Color::White);
        let black = pos.material(Color::Black);
        let (wpi, bpi) = (white.piece_value(), black.piece_value());
        let material = wpi + white.pawn_value() - bpi - black.pawn_value();

        if white.pawns() == 0 && black.pawns() == 0 {
            return sign * mating_score(pos, wpi, bpi);
        }
        if self.lazy_cutoff(sign * material, alpha, beta) {
            return sign * material;
        }

        stats.full_evals += 1;
        let pawns = self.pawns(pos, stats);
        let score = material + pawns.score + at(&KING_ENDGAME, pos.king_square(Color::White))
            - at(&KING_ENDGAME, pos.king_square(Color::Black));

        self.record_positional(score, material);
        sign * score
    }
}

/// Open files, sideways reach and the seventh rank.
fn rook_bonus(
    pos: &Position,
    pawns: &PawnInfo,
    color: Color,
    sq: Square,
    rooks_on_seventh: &mut u32,
) -> i32 {
    let file = sq.file_index();
    let mut bonus = if pawns.half_open(color, file) {
        if pawns.half_open(color.opposite(), file) {
            ROOK_OPEN_FILE
        } else {
            ROOK_HALFOPEN_FILE
        }
    } else {
        ROOK_SIDE_TO_SIDE[side_mobility(pos, sq)]
    };

    let seventh = match color {
        Color::White => 6,
        Color::Black => 1,
    };
    if sq.rank_index() == seventh {
        bonus += if *rooks_on_seventh > 0 {
            ROOKPAIR_7TH_RANK
        } else {
            ROOK_7TH_RANK
        };
        *rooks_on_seventh += 1;
    }
    bonus
}

/// Squares a rook sees along its rank; other rooks do not block.
fn side_mobility(pos: &Position, sq: Square) -> usize {
    let mut count = 0;
    for dir in [RIGHT, LEFT] {
        let mut cur = sq;
        while let Some(next) = cur.offset(dir) {
            match pos.piece_at(next) {
                None | Some((Piece::Rook, _)) => count += 1,
                Some(_) => break,
            }
            cur = next;
        }
    }
    count
}

/// Enough material to force mate against a bare king.
fn can_mate(material: i32) -> bool {
    material >= Piece::Rook.value() && material != 2 * Piece::Knight.value()
}

/// Pawnless endings, White's view: drive the weaker king to the edge.
fn mating_score(pos: &Position, wpi: i32, bpi: i32) -> i32 {
    let white_king = at(&KING_ENDGAME, pos.king_square(Color::White));
    let black_king = at(&KING_ENDGAME, pos.king_square(Color::Black));
    let bishop_knight = Piece::Bishop.value() + Piece::Knight.value();
    let score = wpi - bpi;

    match (wpi, bpi) {
        (0, 0) => 0,
        (_, 0) if !can_mate(wpi) => 0,
        (_, 0) if wpi == bishop_knight => bishop_knight_mate(pos, Color::White, score),
        (_, 0) => score - black_king * 5 + white_king,
        (0, _) if !can_mate(bpi) => 0,
        (0, _) if bpi == bishop_knight => bishop_knight_mate(pos, Color::Black, score),
        (0, _) => score + white_king * 5 - black_king,
        _ if wpi > bpi => score - black_king * 5,
        _ if bpi > wpi => score + white_king * 5,
        _ => score,
    }
}

/// Bishop and knight against king: the defender belongs in a corner of
/// the bishop's color.
fn bishop_knight_mate(pos: &Position, winner: Color, score: i32) -> i32 {
    let Some(bishop) = pos
        .officers_of(winner)
        .into_iter()
        .find(|entry| entry.piece == Piece::Bishop)
    else {
        return score;
    };
    let corners = if bishop.square.is_light() {
        &KING_BN_LIGHT
    } else {
        &KING_BN_DARK
    };

    match winner {
        Color::White => {
            score - at(corners, pos.king_square(Color::Black)) * 5
                + at(&KING_ENDGAME, pos.king_square(Color::White))
        }
        Color::Black => {
            score + at(corners, pos.king_square(Color::White)) * 5
                - at(&KING_ENDGAME, pos.king_square(Color::Black))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(full_eval: bool) -> Evaluator {
        Evaluator::new(9, full_eval).unwrap()
    }

    fn eval(fen: &str) -> i32 {
        let pos = Position::from_fen(fen).unwrap();
        let mut evaluator = evaluator(true);
        let (phase, _) = classify(&pos);
        evaluator.set_phase(phase);
        evaluator.evaluate(&pos, -50000, 50000, &mut SearchStats::default())
    }

    /// Mirrors a FEN without castling rights or en passant square.
    fn mirror(fen: &str) -> String {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        let placement: Vec<String> = fields[0]
            .split('/')
            .rev()
            .map(|rank| {
                rank.chars()
                    .map(|c| {
                        if c.is_ascii_uppercase() {
                            c.to_ascii_lowercase()
                        } else {
                            c.to_ascii_uppercase()
                        }
                    })
                    .collect()
            })
            .collect();
        let side = if fields[1] == "w" { "b" } else { "w" };
        format!("{} {} - - 0 1", placement.join("/"), side)
    }

    #[test]
    fn start_position_is_even() {
        assert_eq!(eval(chess_core::FenParser::STARTPOS), 0);
    }

    #[test]
    fn evaluation_is_color_symmetric() {
        for fen in [
            "r1bq1rk1/pp2bppp/2n1pn2/3p4/2PP4/2N1PN2/PP2BPPP/R2QKB1R w - - 0 1",
            "6k1/R4ppp/8/3p4/8/1P3N2/r4PPP/6K1 b - - 0 1",
            "8/5k2/3p4/2pP4/2P5/5K2/8/8 w - - 0 1",
            "8/8/3k4/8/8/3K4/8/3BN3 w - - 0 1",
            "4k3/8/8/8/8/8/8/3QK3 b - - 0 1",
        ] {
            assert_eq!(eval(fen), eval(&mirror(fen)), "{fen}");
        }
    }

    #[test]
    fn score_is_relative_to_side_to_move() {
        let white = eval("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        let black = eval("4k3/8/8/8/8/8/8/R3K3 b - - 0 1");
        assert!(white > 400);
        assert_eq!(white, -black);
    }

    #[test]
    fn lazy_cutoff_returns_material() {
        let pos = Position::from_fen("4k3/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w - - 0 1").unwrap();
        let mut evaluator = evaluator(false);
        let mut stats = SearchStats::default();
        let material = 2 * 320 + 2 * 330 + 2 * 500 + 900;
        assert_eq!(evaluator.evaluate(&pos, -10, 10, &mut stats), material);
        assert_eq!(stats.full_evals, 0);
        assert_eq!(stats.evals, 1);

        let full = evaluator.evaluate(&pos, material - 10, material + 10, &mut stats);
        assert_eq!(stats.full_evals, 1);
        assert!(evaluator.max_pos_score() >= (full - material).abs());
    }

    #[test]
    fn pawn_table_is_consulted() {
        let pos = Position::startpos();
        let mut evaluator = evaluator(true);
        let mut stats = SearchStats::default();
        evaluator.evaluate(&pos, -50000, 50000, &mut stats);
        evaluator.evaluate(&pos, -50000, 50000, &mut stats);
        assert_eq!(stats.pawn_misses, 1);
        assert_eq!(stats.pawn_hits, 1);
    }

    #[test]
    fn insufficient_material_is_a_draw() {
        assert_eq!(eval("8/8/3k4/8/8/3K4/8/3N4 w - - 0 1"), 0);
        assert_eq!(eval("8/8/3k4/8/8/3K4/8/3B4 b - - 0 1"), 0);
        assert_eq!(eval("8/8/3k4/8/8/3K4/8/2NN4 w - - 0 1"), 0);
        assert_eq!(eval("8/8/3k4/8/8/3K4/8/8 w - - 0 1"), 0);
    }

    #[test]
    fn bishop_knight_drives_king_to_bishop_corner() {
        // Dark-squared bishop on c1: a1 and h8 are the mating corners.
        let right = eval("8/8/8/8/8/8/2K5/k1B1N3 w - - 0 1");
        let wrong = eval("k7/8/2K5/8/8/8/8/2B1N3 w - - 0 1");
        assert!(right > wrong, "{right} <= {wrong}");
    }

    fn rook_terms(fen: &str, color: Color, squares: &[&str]) -> Vec<i32> {
        let pos = Position::from_fen(fen).unwrap();
        let pawns = analyse_pawns(&pos);
        let mut on_seventh = 0;
        squares
            .iter()
            .map(|sq| {
                let sq = Square::from_algebraic(sq).unwrap();
                rook_bonus(&pos, &pawns, color, sq, &mut on_seventh)
            })
            .collect()
    }

    #[test]
    fn rook_file_terms() {
        assert_eq!(
            rook_terms("6k1/8/8/8/8/8/6PP/R5K1 w - - 0 1", Color::White, &["a1"]),
            [ROOK_OPEN_FILE]
        );
        assert_eq!(
            rook_terms("6k1/p7/8/8/8/8/6PP/R5K1 w - - 0 1", Color::White, &["a1"]),
            [ROOK_HALFOPEN_FILE]
        );
        // Own pawn on the file: b1, c1 and d1 are reachable, the king stops it.
        assert_eq!(
            rook_terms("6k1/8/8/8/8/8/P5PP/R3K3 w - - 0 1", Color::White, &["a1"]),
            [ROOK_SIDE_TO_SIDE[3]]
        );
        // Rooks see through each other.
        assert_eq!(
            rook_terms("6k1/8/8/8/8/8/PP4PP/R1R1K3 w - - 0 1", Color::White, &["a1"]),
            [ROOK_SIDE_TO_SIDE[3]]
        );
    }

    #[test]
    fn rook_pair_on_seventh() {
        let bonus = ROOK_OPEN_FILE;
        assert_eq!(
            rook_terms("6k1/RR6/8/8/8/8/6PP/6K1 w - - 0 1", Color::White, &["a7", "b7"]),
            [bonus + ROOK_7TH_RANK, bonus + ROOKPAIR_7TH_RANK]
        );
        assert_eq!(
            rook_terms("6k1/6pp/8/8/8/8/r7/6K1 b - - 0 1", Color::Black, &["a2"]),
            [bonus + ROOK_7TH_RANK]
        );
    }

    #[test]
    fn pawn_table_size_is_reported() {
        assert_eq!(evaluator(false).pawn_bits(), 9);
        assert_eq!(Evaluator::new(40, false).unwrap().pawn_bits(), crate::tt::PAWN_BITS_DEFAULT);
    }

    #[test]
    fn phase_classification() {
        assert_eq!(classify(&Position::startpos()), (GamePhase::Middlegame, true));
        assert_eq!(
            classify(&Position::from_fen("4k3/pp6/8/8/8/8/PP6/R3K2R w - - 0 1").unwrap()),
            (GamePhase::Endgame, true)
        );
        assert_eq!(
            classify(&Position::from_fen("4k3/pp6/8/8/8/8/PP6/2B1K3 w - - 0 1").unwrap()),
            (GamePhase::Endgame, false)
        );
        assert_eq!(
            classify(&Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap()),
            (GamePhase::Pawnless, false)
        );
    }
}
