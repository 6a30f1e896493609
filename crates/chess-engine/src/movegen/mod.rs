//! Pseudo-legal move generation.
//!
//! Moves are written into a shared [`MoveBuffer`] starting at a caller-given
//! index, and the generators return the first free index after their output.
//! A search frame owns the range it wrote until it returns, so nested plies
//! stack their move lists in the same buffer without allocating.
//!
//! Legality is left to `make_move`: generated moves may leave the own king
//! in check, and castling moves are emitted without looking at attacks on
//! the king's path.

mod attacks;
pub mod perft;
mod see;

use std::ops::{Index, IndexMut};

use chess_core::{Color, Move, Piece, Special, Square};

use crate::position::slot_color;
use crate::{Position, MAX_MOVE_ARRAY};

pub use attacks::{pawn_attack_origins, relation, step, LEFT, RIGHT};
pub(crate) use attacks::{BISHOP_DIRS, KING_STEPS, KNIGHT_STEPS, ROOK_DIRS};

/// Move storage shared by every ply of a search.
#[derive(Clone)]
pub struct MoveBuffer {
    moves: Vec<Move>,
}

impl MoveBuffer {
    /// Number of slots allocated up front.
    pub const CAPACITY: usize = MAX_MOVE_ARRAY;

    pub fn new() -> Self {
        MoveBuffer {
            moves: vec![Move::NULL; Self::CAPACITY],
        }
    }

    /// Writes `m` at `index`, growing the buffer if a pathological position
    /// runs past the preallocated capacity.
    #[inline]
    pub fn put(&mut self, index: usize, m: Move) {
        if index >= self.moves.len() {
            self.moves.resize(index + 1, Move::NULL);
        }
        self.moves[index] = m;
    }

    /// Moves in `[start, end)`.
    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &[Move] {
        &self.moves[start..end]
    }

    #[inline]
    pub fn slice_mut(&mut self, start: usize, end: usize) -> &mut [Move] {
        &mut self.moves[start..end]
    }

    /// Resets `[start, end)` so nothing stale leaks into a sibling subtree.
    pub fn clear(&mut self, start: usize, end: usize) {
        self.moves[start..end].fill(Move::NULL);
    }

    #[inline]
    pub fn swap(&mut self, a: usize, b: usize) {
        self.moves.swap(a, b);
    }
}

impl Default for MoveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for MoveBuffer {
    type Output = Move;

    #[inline]
    fn index(&self, index: usize) -> &Move {
        &self.moves[index]
    }
}

impl IndexMut<usize> for MoveBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Move {
        &mut self.moves[index]
    }
}

/// Cursor writing consecutive moves into the buffer.
struct Writer<'a> {
    buf: &'a mut MoveBuffer,
    index: usize,
}

impl Writer<'_> {
    #[inline]
    fn push(&mut self, m: Move) {
        self.buf.put(self.index, m);
        self.index += 1;
    }
}

/// Generates all pseudo-legal moves for the side to move, officers first,
/// then pawns, then en passant captures. Returns the next free index.
pub fn generate_moves(pos: &Position, buf: &mut MoveBuffer, start: usize) -> usize {
    let us = pos.side_to_move();
    let mut out = Writer { buf, index: start };

    for slot in pos.officer_slots(us) {
        if let Some(entry) = pos.plist[slot] {
            piece_moves(pos, &mut out, us, entry.piece, entry.square, false);
        }
    }
    for slot in pos.pawn_slots(us) {
        if let Some(entry) = pos.plist[slot] {
            pawn_moves(pos, &mut out, us, entry.square, false);
        }
    }
    en_passant_moves(pos, &mut out, us);

    out.index
}

/// Like [`generate_moves`] but only captures and promotions.
pub fn generate_captures(pos: &Position, buf: &mut MoveBuffer, start: usize) -> usize {
    let us = pos.side_to_move();
    let mut out = Writer { buf, index: start };

    for slot in pos.officer_slots(us) {
        if let Some(entry) = pos.plist[slot] {
            piece_moves(pos, &mut out, us, entry.piece, entry.square, true);
        }
    }
    for slot in pos.pawn_slots(us) {
        if let Some(entry) = pos.plist[slot] {
            pawn_moves(pos, &mut out, us, entry.square, true);
        }
    }
    en_passant_moves(pos, &mut out, us);

    out.index
}

/// Strictly legal moves of the side to move, in generation order.
pub fn legal_moves(pos: &mut Position, buf: &mut MoveBuffer, start: usize) -> Vec<Move> {
    let end = generate_moves(pos, buf, start);
    let mut legal = Vec::with_capacity(end - start);
    for k in start..end {
        let m = buf[k];
        if pos.make_move(&m) {
            legal.push(m);
        }
        pos.undo_move(&m);
    }
    buf.clear(start, end);
    legal
}

/// Enemy piece standing on `sq`, if any.
#[inline]
fn enemy_at(pos: &Position, us: Color, sq: Square) -> Option<Piece> {
    let slot = pos.slot_at(sq)?;
    if slot_color(slot) == us {
        return None;
    }
    pos.plist[slot as usize].map(|e| e.piece)
}

fn piece_moves(
    pos: &Position,
    out: &mut Writer<'_>,
    us: Color,
    piece: Piece,
    from: Square,
    captures_only: bool,
) {
    match piece {
        Piece::Bishop => slide(pos, out, us, from, &BISHOP_DIRS, captures_only),
        Piece::Rook => slide(pos, out, us, from, &ROOK_DIRS, captures_only),
        Piece::Queen => {
            slide(pos, out, us, from, &BISHOP_DIRS, captures_only);
            slide(pos, out, us, from, &ROOK_DIRS, captures_only);
        }
        Piece::Knight => leap(pos, out, us, from, &KNIGHT_STEPS, captures_only),
        Piece::King => {
            leap(pos, out, us, from, &KING_STEPS, captures_only);
            if !captures_only {
                castling_moves(pos, out, us);
            }
        }
        Piece::Pawn => debug_assert!(false, "pawn in officer range"),
    }
}

fn slide(
    pos: &Position,
    out: &mut Writer<'_>,
    us: Color,
    from: Square,
    dirs: &[i16],
    captures_only: bool,
) {
    for &dir in dirs {
        let mut cursor = from.offset(dir);
        while let Some(to) = cursor {
            if pos.is_empty(to) {
                if !captures_only {
                    out.push(Move::new(from, to));
                }
                cursor = to.offset(dir);
                continue;
            }
            if let Some(victim) = enemy_at(pos, us, to) {
                out.push(Move::capture(from, to, victim));
            }
            break;
        }
    }
}

fn leap(
    pos: &Position,
    out: &mut Writer<'_>,
    us: Color,
    from: Square,
    steps: &[i16],
    captures_only: bool,
) {
    for &step in steps {
        let Some(to) = from.offset(step) else {
            continue;
        };
        if pos.is_empty(to) {
            if !captures_only {
                out.push(Move::new(from, to));
            }
        } else if let Some(victim) = enemy_at(pos, us, to) {
            out.push(Move::capture(from, to, victim));
        }
    }
}

/// Castling is emitted when the right is held and the squares between king
/// and rook are empty. Attacks on the king's path are checked by make_move.
fn castling_moves(pos: &Position, out: &mut Writer<'_>, us: Color) {
    let rights = pos.flags().castling;
    if rights.is_empty() {
        return;
    }
    let (king, short_path, long_path): (Square, [Square; 2], [Square; 3]) = match us {
        Color::White => (Square::E1, [Square::F1, Square::G1], [Square::D1, Square::C1, Square::B1]),
        Color::Black => (Square::E8, [Square::F8, Square::G8], [Square::D8, Square::C8, Square::B8]),
    };
    if pos.king_square(us) != king {
        return;
    }
    if rights.can_castle_kingside(us) && short_path.iter().all(|&sq| pos.is_empty(sq)) {
        out.push(Move::with_special(king, short_path[1], Special::Castling));
    }
    if rights.can_castle_queenside(us) && long_path.iter().all(|&sq| pos.is_empty(sq)) {
        out.push(Move::with_special(king, long_path[1], Special::Castling));
    }
}

fn pawn_moves(pos: &Position, out: &mut Writer<'_>, us: Color, from: Square, captures_only: bool) {
    let forward = us.pawn_step();
    // Capture directions, right side first.
    let diagonals = [forward + 1, forward - 1];
    let (start_rank, last_push_rank) = match us {
        Color::White => (1, 6),
        Color::Black => (6, 1),
    };

    if from.rank_index() == last_push_rank {
        if let Some(to) = from.offset(forward).filter(|&sq| pos.is_empty(sq)) {
            for promoted in Piece::PROMOTIONS {
                out.push(Move::promotion(from, to, promoted, None));
            }
        }
        for dir in diagonals {
            let Some(to) = from.offset(dir) else {
                continue;
            };
            if let Some(victim) = enemy_at(pos, us, to) {
                for promoted in Piece::PROMOTIONS {
                    out.push(Move::promotion(from, to, promoted, Some(victim)));
                }
            }
        }
        return;
    }

    if !captures_only {
        if let Some(to) = from.offset(forward).filter(|&sq| pos.is_empty(sq)) {
            out.push(Move::new(from, to));
            if from.rank_index() == start_rank {
                if let Some(to2) = to.offset(forward).filter(|&sq| pos.is_empty(sq)) {
                    out.push(Move::with_special(from, to2, Special::DoubleAdvance));
                }
            }
        }
    }

    for dir in diagonals {
        let Some(to) = from.offset(dir) else {
            continue;
        };
        if let Some(victim) = enemy_at(pos, us, to) {
            out.push(Move::capture(from, to, victim));
        }
    }
}

/// En passant captures onto the current target square.
fn en_passant_moves(pos: &Position, out: &mut Writer<'_>, us: Color) {
    let Some(target) = pos.flags().en_passant else {
        return;
    };
    for offset in pawn_attack_origins(us) {
        let Some(from) = target.offset(offset) else {
            continue;
        };
        if pos.piece_at(from) == Some((Piece::Pawn, us)) {
            out.push(Move::en_passant(from, target));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves(fen: &str) -> Vec<Move> {
        let pos = Position::from_fen(fen).unwrap();
        let mut buf = MoveBuffer::new();
        let end = generate_moves(&pos, &mut buf, 0);
        buf.slice(0, end).to_vec()
    }

    fn captures(fen: &str) -> Vec<Move> {
        let pos = Position::from_fen(fen).unwrap();
        let mut buf = MoveBuffer::new();
        let end = generate_captures(&pos, &mut buf, 0);
        buf.slice(0, end).to_vec()
    }

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn startpos_has_twenty_moves() {
        let list = moves(chess_core::FenParser::STARTPOS);
        assert_eq!(list.len(), 20);
        let doubles = list.iter().filter(|m| m.special() == Special::DoubleAdvance).count();
        assert_eq!(doubles, 8);
        assert!(captures(chess_core::FenParser::STARTPOS).is_empty());
    }

    #[test]
    fn generation_appends_at_start_index() {
        let pos = Position::startpos();
        let mut buf = MoveBuffer::new();
        let end = generate_moves(&pos, &mut buf, 100);
        assert_eq!(end, 120);
        assert!(buf[99].is_null());
        assert!(!buf[100].is_null());
    }

    #[test]
    fn castling_needs_empty_squares() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let list = moves(fen);
        let castles: Vec<_> = list.iter().filter(|m| m.special() == Special::Castling).collect();
        assert_eq!(castles.len(), 2);
        assert!(castles.iter().any(|m| m.to() == Square::G1));
        assert!(castles.iter().any(|m| m.to() == Square::C1));

        let blocked = moves("r3k2r/8/8/8/8/8/8/RN2K1NR w KQkq - 0 1");
        assert!(blocked.iter().all(|m| m.special() != Special::Castling));
    }

    #[test]
    fn castling_through_check_is_still_generated() {
        // f1 is attacked by the rook on f8; make_move rejects it later.
        let list = moves("5r1k/8/8/8/8/8/8/4K2R w K - 0 1");
        assert!(list.iter().any(|m| m.special() == Special::Castling));
    }

    #[test]
    fn promotions_emit_four_pieces() {
        let list = moves("3r3k/4P3/8/8/8/8/8/4K3 w - - 0 1");
        let promos: Vec<_> = list.iter().filter(|m| m.special() == Special::Promotion).collect();
        // e8 push and exd8 capture, four pieces each.
        assert_eq!(promos.len(), 8);
        assert_eq!(promos[0].promoted(), Some(Piece::Queen));
        assert!(promos.iter().filter(|m| m.to() == Square::D8).all(|m| m.captured() == Some(Piece::Rook)));

        let caps = captures("3r3k/4P3/8/8/8/8/8/4K3 w - - 0 1");
        assert_eq!(caps.len(), 8);
    }

    #[test]
    fn black_pawns_move_down() {
        let list = moves("4k3/3p4/8/8/8/8/8/4K3 b - - 0 1");
        let pawn: Vec<_> = list.iter().filter(|m| m.from() == sq("d7")).collect();
        assert_eq!(pawn.len(), 2);
        assert!(pawn.iter().any(|m| m.to() == sq("d5") && m.special() == Special::DoubleAdvance));
    }

    #[test]
    fn en_passant_is_generated_from_target() {
        let list = moves("4k3/8/8/3Pp3/8/8/8/4K3 w - e6 0 1");
        let ep: Vec<_> = list.iter().filter(|m| m.special() == Special::EnPassant).collect();
        assert_eq!(ep.len(), 1);
        assert_eq!(ep[0].from(), sq("d5"));
        assert_eq!(ep[0].to(), sq("e6"));
        assert_eq!(ep[0].captured(), Some(Piece::Pawn));
    }

    #[test]
    fn captures_record_victim() {
        let caps = captures("4k3/8/8/3q4/4N3/8/8/4K3 w - - 0 1");
        assert!(caps.is_empty());
        let caps = captures("4k3/8/3q4/8/4N3/8/8/4K3 w - - 0 1");
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].captured(), Some(Piece::Queen));
    }

    #[test]
    fn buffer_clear_resets_range() {
        let pos = Position::startpos();
        let mut buf = MoveBuffer::new();
        let end = generate_moves(&pos, &mut buf, 0);
        buf.clear(0, end);
        assert!(buf.slice(0, end).iter().all(|m| m.is_null()));
    }
}
