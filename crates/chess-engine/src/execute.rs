//! Making and taking back moves.
//!
//! `make_move` reads the flags of the current ply and writes the flags of
//! the next one; board and piece list are changed in place. `undo_move`
//! only restores board and piece list. The flags need no restoring because
//! the caller goes back to reading the older ply slot.
//!
//! Legality is tested after the board has been changed, by asking whether
//! the mover's king is attacked. A `false` result still leaves the board
//! changed, so every `make_move` must be paired with an `undo_move`.

use chess_core::{Color, Move, Piece, Special, Square};

use crate::movegen::{generate_moves, MoveBuffer};
use crate::position::{slot_color, PieceEntry, PlyFlags};
use crate::zobrist::ZOBRIST;
use crate::Position;

impl Position {
    /// Plays a pseudo-legal move from the current ply.
    ///
    /// Returns false if the move leaves the own king in check, or if a
    /// castling king starts on, passes or lands on an attacked square.
    /// The side to move and the ply counter are not changed; call
    /// [`flip`](Self::flip) after a legal move before searching on.
    pub fn make_move(&mut self, m: &Move) -> bool {
        let ply = self.ply;
        let us = self.side;
        let them = us.opposite();

        let mut next = self.flags[ply];
        next.just_deleted = None;
        next.last_promoted = None;
        next.reverse += 1;
        if let Some(ep) = next.en_passant.take() {
            next.hash ^= ZOBRIST.en_passant_key(ep);
        }
        self.flags[ply].just_deleted = None;
        self.flags[ply].last_promoted = None;

        let from = m.from();
        let to = m.to();

        match m.special() {
            Special::Normal => {
                if let Some(captured) = m.captured() {
                    self.remove_captured(to);
                    next.reverse = 0;
                    next.material[them.index()].remove(captured);
                    next.hash ^= ZOBRIST.piece_key(captured, them, to);
                    if captured == Piece::Pawn {
                        next.pawn_hash ^= ZOBRIST.piece_key(Piece::Pawn, them, to);
                    }
                }
                let piece = self.move_piece(from, to);
                match piece {
                    Piece::King => next.king[us.index()] = to,
                    Piece::Pawn => {
                        next.reverse = 0;
                        next.pawn_hash ^= ZOBRIST.piece_key(Piece::Pawn, us, from)
                            ^ ZOBRIST.piece_key(Piece::Pawn, us, to);
                    }
                    _ => {}
                }
                next.hash ^= ZOBRIST.piece_key(piece, us, from)
                    ^ ZOBRIST.piece_key(piece, us, to)
                    ^ ZOBRIST.black_to_move;

                let old = next.castling;
                if !old.is_empty() {
                    let new = old.after_move(from, to);
                    if new != old {
                        next.castling = new;
                        next.hash ^= ZOBRIST.castling_key(old.toggled(new));
                        next.reverse = 0;
                    }
                }
            }
            Special::DoubleAdvance => {
                self.move_piece(from, to);
                next.reverse = 0;
                let ep = Square::from_raw(from.raw() ^ 0x30);
                next.en_passant = ep;
                if let Some(ep) = ep {
                    next.hash ^= ZOBRIST.en_passant_key(ep);
                }
                next.hash ^= ZOBRIST.piece_key(Piece::Pawn, us, from)
                    ^ ZOBRIST.piece_key(Piece::Pawn, us, to)
                    ^ ZOBRIST.black_to_move;
                next.pawn_hash ^= ZOBRIST.piece_key(Piece::Pawn, us, from)
                    ^ ZOBRIST.piece_key(Piece::Pawn, us, to);
            }
            Special::EnPassant => {
                let Some(victim) = Square::from_raw(to.raw() ^ 0x10) else {
                    debug_assert!(false, "en passant victim off board");
                    return false;
                };
                self.remove_captured(victim);
                self.board[victim.index()] = None;
                self.move_piece(from, to);
                next.reverse = 0;
                next.material[them.index()].remove(Piece::Pawn);
                let pawn_keys = ZOBRIST.piece_key(Piece::Pawn, us, from)
                    ^ ZOBRIST.piece_key(Piece::Pawn, us, to)
                    ^ ZOBRIST.piece_key(Piece::Pawn, them, victim);
                next.hash ^= pawn_keys ^ ZOBRIST.black_to_move;
                next.pawn_hash ^= pawn_keys;
            }
            Special::Castling => {
                let Some((rook_from, rook_to, passed)) = castling_squares(to) else {
                    debug_assert!(false, "castling to {to}");
                    return false;
                };
                self.move_piece(rook_from, rook_to);
                self.move_piece(from, to);
                next.reverse = 0;
                next.king[us.index()] = to;
                let old = next.castling;
                next.castling.remove_color(us);
                next.hash ^= ZOBRIST.piece_key(Piece::King, us, from)
                    ^ ZOBRIST.piece_key(Piece::King, us, to)
                    ^ ZOBRIST.piece_key(Piece::Rook, us, rook_from)
                    ^ ZOBRIST.piece_key(Piece::Rook, us, rook_to)
                    ^ ZOBRIST.castling_key(old.toggled(next.castling))
                    ^ ZOBRIST.black_to_move;
                self.flags[ply + 1] = next;
                return [from, passed, to].into_iter().all(|sq| !self.attacks(them, sq));
            }
            Special::Promotion => {
                let Some(promoted) = m.promoted() else {
                    debug_assert!(false, "promotion without piece");
                    return false;
                };
                if let Some(captured) = m.captured() {
                    self.remove_captured(to);
                    next.material[them.index()].remove(captured);
                    next.hash ^= ZOBRIST.piece_key(captured, them, to);
                    let old = next.castling;
                    if !old.is_empty() {
                        let new = old.after_move(from, to);
                        if new != old {
                            next.castling = new;
                            next.hash ^= ZOBRIST.castling_key(old.toggled(new));
                        }
                    }
                }
                next.reverse = 0;

                let Some(pawn_slot) = self.board[from.index()].take() else {
                    debug_assert!(false, "promotion from empty {from}");
                    return false;
                };
                self.flags[ply].last_promoted = Some(pawn_slot);
                self.plist[pawn_slot as usize] = None;

                let slot = self.max_officer[us.index()];
                self.plist[slot as usize] = Some(PieceEntry { piece: promoted, square: to });
                self.board[to.index()] = Some(slot);
                self.max_officer[us.index()] += 1;

                next.material[us.index()].remove(Piece::Pawn);
                next.material[us.index()].add(promoted);
                next.hash ^= ZOBRIST.piece_key(Piece::Pawn, us, from)
                    ^ ZOBRIST.piece_key(promoted, us, to)
                    ^ ZOBRIST.black_to_move;
                next.pawn_hash ^= ZOBRIST.piece_key(Piece::Pawn, us, from);
            }
            Special::HashMove => {
                debug_assert!(false, "unresolved hash move {m}");
                self.flags[ply + 1] = next;
                return false;
            }
        }

        self.flags[ply + 1] = next;
        !self.attacks(them, next.king[us.index()])
    }

    /// Takes back board and piece-list changes of `m` made at this ply.
    pub fn undo_move(&mut self, m: &Move) {
        let ply = self.ply;
        let from = m.from();
        let to = m.to();

        match m.special() {
            Special::Normal | Special::DoubleAdvance => {
                self.move_piece(to, from);
                if let Some(captured) = m.captured() {
                    self.restore_captured(ply, captured, to);
                }
            }
            Special::EnPassant => {
                self.move_piece(to, from);
                if let Some(victim) = Square::from_raw(to.raw() ^ 0x10) {
                    self.restore_captured(ply, Piece::Pawn, victim);
                }
            }
            Special::Castling => {
                self.move_piece(to, from);
                if let Some((rook_from, rook_to, _)) = castling_squares(to) {
                    self.move_piece(rook_to, rook_from);
                }
            }
            Special::Promotion => {
                let us = self.side;
                if let Some(slot) = self.board[to.index()].take() {
                    self.plist[slot as usize] = None;
                }
                self.max_officer[us.index()] -= 1;
                if let Some(captured) = m.captured() {
                    self.restore_captured(ply, captured, to);
                }
                if let Some(pawn_slot) = self.flags[ply].last_promoted {
                    self.plist[pawn_slot as usize] = Some(PieceEntry {
                        piece: Piece::Pawn,
                        square: from,
                    });
                    self.board[from.index()] = Some(pawn_slot);
                }
            }
            Special::HashMove => {}
        }
    }

    /// Passes the move: only the key, the en passant square and the
    /// reversible counter of the next ply change.
    pub fn make_null_move(&mut self) {
        let ply = self.ply;
        let mut next = self.flags[ply];
        next.reverse += 1;
        if let Some(ep) = next.en_passant.take() {
            next.hash ^= ZOBRIST.en_passant_key(ep);
        }
        next.hash ^= ZOBRIST.black_to_move;
        self.flags[ply + 1] = next;
    }

    /// Makes ply 1 the new root after a legal move was made at ply 0, so
    /// that the root of every search sits at ply 0.
    pub(crate) fn advance_root(&mut self) {
        debug_assert_eq!(self.ply, 0, "root move made below the root");
        self.flags[0] = self.flags[1];
        self.side = self.side.opposite();
        if self.side == Color::White {
            self.fullmove += 1;
        }
    }

    /// Reverts [`advance_root`](Self::advance_root): restores the root
    /// flags saved right after `m` was made, then takes `m` back.
    pub(crate) fn retreat_root(&mut self, saved: PlyFlags, m: &Move) {
        self.flags[0] = saved;
        self.side = self.side.opposite();
        if self.side == Color::Black {
            self.fullmove = self.fullmove.saturating_sub(1).max(1);
        }
        self.undo_move(m);
    }

    /// Checks that `m` is a legal move here and fills in its special tag
    /// and payload from the matching generated move.
    ///
    /// Moves are matched by from/to. A move that names its promotion piece
    /// only matches a promotion to that piece; otherwise the first legal
    /// match wins, which for promotions is the queen. The buffer range from
    /// `start` is used as scratch and cleared again.
    pub fn verify_move(&mut self, buf: &mut MoveBuffer, start: usize, m: &mut Move) -> bool {
        let end = generate_moves(self, buf, start);
        let mut found = false;

        for k in start..end {
            let candidate = buf[k];
            if candidate.from_to() != m.from_to() {
                continue;
            }
            if m.special() == Special::Promotion
                && m.promoted().is_some()
                && m.promoted() != candidate.promoted()
            {
                continue;
            }
            let legal = self.make_move(&candidate);
            self.undo_move(&candidate);
            if legal {
                m.resolve_from(&candidate);
                found = true;
                break;
            }
        }

        buf.clear(start, end);
        found
    }

    /// Lifts the piece on `from` onto `to`, returning its kind. `to` must
    /// be empty.
    fn move_piece(&mut self, from: Square, to: Square) -> Piece {
        let Some(slot) = self.board[from.index()].take() else {
            debug_assert!(false, "no piece on {from}");
            return Piece::Pawn;
        };
        self.board[to.index()] = Some(slot);
        match self.plist[slot as usize].as_mut() {
            Some(entry) => {
                entry.square = to;
                entry.piece
            }
            None => {
                debug_assert!(false, "board points at empty slot {slot}");
                Piece::Pawn
            }
        }
    }

    /// Empties the piece-list slot of the piece on `sq` and remembers it for
    /// undo. The board entry is left to be overwritten by the mover.
    fn remove_captured(&mut self, sq: Square) {
        let ply = self.ply;
        if let Some(slot) = self.board[sq.index()] {
            debug_assert_ne!(slot_color(slot), self.side, "capturing own piece on {sq}");
            self.plist[slot as usize] = None;
            self.flags[ply].just_deleted = Some(slot);
        }
    }

    fn restore_captured(&mut self, ply: usize, piece: Piece, sq: Square) {
        if let Some(slot) = self.flags[ply].just_deleted {
            self.plist[slot as usize] = Some(PieceEntry { piece, square: sq });
            self.board[sq.index()] = Some(slot);
        }
    }
}

/// Rook origin, rook destination and the square the king passes over, keyed
/// by the king's destination.
fn castling_squares(king_to: Square) -> Option<(Square, Square, Square)> {
    match king_to {
        Square::G1 => Some((Square::H1, Square::F1, Square::F1)),
        Square::C1 => Some((Square::A1, Square::D1, Square::D1)),
        Square::G8 => Some((Square::H8, Square::F8, Square::F8)),
        Square::C8 => Some((Square::A8, Square::D8, Square::D8)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::Color;
    use proptest::prelude::*;

    fn play(pos: &mut Position, uci: &str) -> Move {
        let mut buf = MoveBuffer::new();
        let mut m = Move::from_uci(uci).unwrap();
        assert!(pos.verify_move(&mut buf, 0, &mut m), "{uci} not legal");
        assert!(pos.make_move(&m));
        pos.flip();
        m
    }

    fn snapshot(pos: &Position) -> (Vec<Option<u8>>, Vec<Option<PieceEntry>>, [u8; 2]) {
        (pos.board.to_vec(), pos.plist.to_vec(), pos.max_officer)
    }

    #[test]
    fn quiet_move_updates_key() {
        let mut pos = Position::startpos();
        play(&mut pos, "g1f3");
        assert!(pos.validate().is_ok());
        assert_eq!(pos.flags().reverse, 1);
        assert_eq!(pos.side_to_move(), Color::Black);
    }

    #[test]
    fn double_advance_sets_en_passant() {
        let mut pos = Position::startpos();
        play(&mut pos, "e2e4");
        assert_eq!(pos.flags().en_passant, Square::from_algebraic("e3"));
        assert_eq!(pos.flags().reverse, 0);
        assert!(pos.validate().is_ok());
        play(&mut pos, "g8f6");
        assert_eq!(pos.flags().en_passant, None);
        assert!(pos.validate().is_ok());
    }

    #[test]
    fn en_passant_capture_and_undo() {
        let mut pos = Position::from_fen("4k3/8/8/3Pp3/8/8/8/4K3 w - e6 0 1").unwrap();
        let before = snapshot(&pos);
        let mut buf = MoveBuffer::new();
        let mut m = Move::from_uci("d5e6").unwrap();
        assert!(pos.verify_move(&mut buf, 0, &mut m));
        assert_eq!(m.special(), Special::EnPassant);
        assert!(pos.make_move(&m));
        pos.flip();
        assert!(pos.validate().is_ok());
        assert!(pos.is_empty(Square::from_algebraic("e5").unwrap()));
        pos.unflip();
        pos.undo_move(&m);
        assert_eq!(snapshot(&pos), before);
    }

    #[test]
    fn castling_moves_rook_and_drops_rights() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play(&mut pos, "e1g1");
        assert_eq!(pos.piece_at(Square::F1), Some((Piece::Rook, Color::White)));
        assert_eq!(pos.king_square(Color::White), Square::G1);
        assert!(!pos.flags().castling.can_castle_queenside(Color::White));
        assert!(pos.flags().castling.can_castle_kingside(Color::Black));
        assert!(pos.validate().is_ok());
        play(&mut pos, "e8c8");
        assert_eq!(pos.piece_at(Square::D8), Some((Piece::Rook, Color::Black)));
        assert!(pos.flags().castling.is_empty());
        assert!(pos.validate().is_ok());
    }

    #[test]
    fn castling_through_attacked_square_is_illegal() {
        let mut pos = Position::from_fen("5r1k/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let before = snapshot(&pos);
        let m = Move::with_special(Square::E1, Square::G1, Special::Castling);
        assert!(!pos.make_move(&m));
        pos.undo_move(&m);
        assert_eq!(snapshot(&pos), before);
    }

    #[test]
    fn rook_capture_drops_opponent_right() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play(&mut pos, "a1a8");
        let rights = pos.flags().castling;
        assert!(!rights.can_castle_queenside(Color::Black));
        assert!(!rights.can_castle_queenside(Color::White));
        assert!(rights.can_castle_kingside(Color::Black));
        assert!(pos.validate().is_ok());
    }

    #[test]
    fn promotion_with_capture_and_undo() {
        let mut pos = Position::from_fen("1r2k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let before = snapshot(&pos);
        let mut buf = MoveBuffer::new();
        let mut m = Move::from_uci("a7b8n").unwrap();
        assert!(pos.verify_move(&mut buf, 0, &mut m));
        assert_eq!(m.promoted(), Some(Piece::Knight));
        assert_eq!(m.captured(), Some(Piece::Rook));
        assert!(pos.make_move(&m));
        pos.flip();
        assert_eq!(pos.piece_at(Square::B8), Some((Piece::Knight, Color::White)));
        assert_eq!(pos.material(Color::White).pawns(), 0);
        assert!(pos.validate().is_ok());
        pos.unflip();
        pos.undo_move(&m);
        assert_eq!(snapshot(&pos), before);
    }

    #[test]
    fn hash_move_resolves_to_queen_promotion() {
        let mut pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mut buf = MoveBuffer::new();
        let mut m = Move::hash_move(Square::from_algebraic("a7").unwrap(), Square::A8);
        assert!(pos.verify_move(&mut buf, 0, &mut m));
        assert_eq!(m.special(), Special::Promotion);
        assert_eq!(m.promoted(), Some(Piece::Queen));
    }

    #[test]
    fn verify_rejects_illegal_move() {
        // The bishop on e2 is pinned against the king.
        let mut pos = Position::from_fen("4r1k1/8/8/8/8/8/4B3/4K3 w - - 0 1").unwrap();
        let mut buf = MoveBuffer::new();
        let mut m = Move::from_uci("e2d3").unwrap();
        assert!(!pos.verify_move(&mut buf, 0, &mut m));
        let mut m = Move::from_uci("e1d1").unwrap();
        assert!(pos.verify_move(&mut buf, 0, &mut m));
    }

    #[test]
    fn null_move_flips_key_only() {
        let mut pos = Position::from_fen("4k3/8/8/8/4Pp2/8/8/4K3 b - e3 0 1").unwrap();
        pos.make_null_move();
        pos.flip();
        assert_eq!(pos.flags().en_passant, None);
        assert!(pos.validate().is_ok());
    }

    /// Plays a random legal game from the start position, checking the
    /// incremental state after every move and the make/undo round trip.
    fn random_game(choices: &[usize]) -> Result<(), TestCaseError> {
        let mut pos = Position::startpos();
        let mut buf = MoveBuffer::new();
        for &choice in choices {
            if pos.ply() + 2 >= crate::MAX_MOVE_FLAGS {
                break;
            }
            let end = generate_moves(&pos, &mut buf, 0);
            let before = snapshot(&pos);
            let mut legal = Vec::new();
            for k in 0..end {
                let m = buf[k];
                let ok = pos.make_move(&m);
                pos.undo_move(&m);
                prop_assert_eq!(&snapshot(&pos), &before, "undo of {} differs", m);
                if ok {
                    legal.push(m);
                }
            }
            if legal.is_empty() {
                break;
            }
            let m = legal[choice % legal.len()];
            prop_assert!(pos.make_move(&m));
            pos.flip();
            if let Err(e) = pos.validate() {
                return Err(TestCaseError::fail(format!("after {m}: {e}")));
            }
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn incremental_state_matches_recomputation(choices in prop::collection::vec(any::<usize>(), 200..240)) {
            random_game(&choices)?;
        }
    }
}
