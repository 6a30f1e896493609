//! Static exchange evaluation.
//!
//! Plays out the capture sequence on one square with least valuable attacker
//! first, letting either side stop as soon as continuing can only make its
//! running score worse. Attackers are split into direct ones, which see the
//! target square right away, and indirect ones, which sit behind another
//! piece on the same line and only join after it has captured.
//!
//! The moving piece is lifted off the board while attackers are collected so
//! that anything lined up behind it counts as a direct attacker.

use chess_core::{Color, Move, Piece, Square};

use super::attacks::{pawn_attack_origins, relation, step};
use crate::Position;

/// Attackers of one side. A side never has more than 16 pieces.
#[derive(Default)]
struct Attackers {
    direct: Vec<Piece>,
    indirect: Vec<Piece>,
}

impl Attackers {
    /// Removes and returns the value of the cheapest direct attacker.
    ///
    /// The vacated slot is refilled with the last entry.
    fn take_cheapest_direct(&mut self) -> Option<i32> {
        let (index, _) = self
            .direct
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.exchange_value())?;
        Some(self.direct.swap_remove(index).exchange_value())
    }

    /// Next indirect attacker, the most recently discovered first.
    fn take_indirect(&mut self) -> Option<i32> {
        self.indirect.pop().map(Piece::exchange_value)
    }

    fn take_next(&mut self) -> Option<i32> {
        self.take_cheapest_direct().or_else(|| self.take_indirect())
    }
}

impl Position {
    /// Net material result of `m` for `attacker` after the exchange on its
    /// target square is played out. Positive means the capture wins material.
    ///
    /// Must be called before the move is made.
    pub fn see(&mut self, attacker: Color, m: &Move) -> i32 {
        let target = m.to();
        let from = m.from();
        let Some(slot) = self.slot_at(from) else {
            debug_assert!(false, "see: no piece on {from}");
            return 0;
        };
        let Some(moving) = self.plist[slot as usize] else {
            return 0;
        };
        let defender = attacker.opposite();

        let mut score = m.captured().map_or(0, Piece::exchange_value);
        let mut good = score;
        let mut risk = moving.piece.exchange_value();
        let mut bad = score - risk;

        // Lift the attacker while the lists are built.
        self.plist[slot as usize] = None;
        self.board[from.index()] = None;

        let mut defenders = self.collect_attackers(defender, target);
        if defenders.direct.is_empty() {
            self.plist[slot as usize] = Some(moving);
            self.board[from.index()] = Some(slot);
            return score;
        }

        let mut supporters = self.collect_attackers(attacker, target);
        self.plist[slot as usize] = Some(moving);
        self.board[from.index()] = Some(slot);
        if supporters.direct.is_empty() && supporters.indirect.is_empty() {
            return score - risk;
        }

        loop {
            // Defender recaptures or stands pat.
            if score < 0 {
                return bad.max(score);
            }
            let Some(value) = defenders.take_next() else {
                return good.min(score);
            };
            score -= risk;
            risk = value;
            if score + risk < 0 {
                return bad.max(score);
            }
            bad = bad.max(score);

            // Attacker recaptures or stands pat.
            if score > 0 {
                return good.min(score);
            }
            let Some(value) = supporters.take_next() else {
                return bad.max(score);
            };
            score += risk;
            risk = value;
            good = good.min(score);
            if score - risk > 0 {
                return good.min(score - risk);
            }
        }
    }

    /// Collects the pieces of `color` bearing on `target`.
    ///
    /// Sliders are traced from the target outward. A blocker that moves
    /// along the same kind of line (of either color), or a pawn that itself
    /// attacks the target, turns the slider into an indirect attacker; any
    /// other blocker shuts it out.
    fn collect_attackers(&self, color: Color, target: Square) -> Attackers {
        let mut found = Attackers::default();

        for offset in pawn_attack_origins(color) {
            if let Some(sq) = target.offset(offset) {
                if self.piece_at(sq) == Some((Piece::Pawn, color)) {
                    found.direct.push(Piece::Pawn);
                }
            }
        }

        for slot in self.officer_slots(color) {
            let Some(entry) = self.plist[slot] else {
                continue;
            };
            let bits = entry.piece.attack_bits();
            if relation(entry.square, target) & bits == 0 {
                continue;
            }
            if !entry.piece.is_slider() {
                found.direct.push(entry.piece);
                continue;
            }

            let dir = step(target, entry.square);
            let mut s = target.raw() as i16 + dir;
            let mut indirect = false;
            let mut blocked = false;
            while s != entry.square.raw() as i16 {
                let blocker = Square::from_raw(s as u8).and_then(|sq| self.piece_at(sq));
                if let Some((piece, owner)) = blocker {
                    let shares_line = piece != Piece::Pawn && piece.attack_bits() & bits != 0;
                    let attacking_pawn = piece == Piece::Pawn
                        && pawn_attack_origins(owner).contains(&(s - target.raw() as i16));
                    if shares_line || attacking_pawn {
                        indirect = true;
                    } else {
                        blocked = true;
                        break;
                    }
                }
                s += dir;
            }
            if blocked {
                continue;
            }
            if indirect {
                found.indirect.push(entry.piece);
            } else {
                found.direct.push(entry.piece);
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::{generate_captures, MoveBuffer};

    fn capture(pos: &Position, from: &str, to: &str) -> Move {
        let mut buf = MoveBuffer::new();
        let end = generate_captures(pos, &mut buf, 0);
        let from = Square::from_algebraic(from).unwrap();
        let to = Square::from_algebraic(to).unwrap();
        *buf.slice(0, end)
            .iter()
            .find(|m| m.from() == from && m.to() == to)
            .expect("capture not generated")
    }

    #[test]
    fn hanging_pawn_wins_a_pawn() {
        let mut pos = Position::from_fen("4k3/8/8/3p4/8/8/8/3QK3 w - - 0 1").unwrap();
        let m = capture(&pos, "d1", "d5");
        assert_eq!(pos.see(Color::White, &m), 100);
    }

    #[test]
    fn queen_takes_pawn_defended_by_pawn() {
        let mut pos = Position::from_fen("4k3/8/2p5/3p4/8/8/8/3QK3 w - - 0 1").unwrap();
        let m = capture(&pos, "d1", "d5");
        assert_eq!(pos.see(Color::White, &m), 100 - 900);
    }

    #[test]
    fn pawn_takes_defended_knight() {
        let mut pos = Position::from_fen("4k3/8/4p3/3n4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let m = capture(&pos, "e4", "d5");
        assert_eq!(pos.see(Color::White, &m), 300 - 100);
    }

    #[test]
    fn even_trade_of_rooks() {
        let mut pos = Position::from_fen("3rk3/8/8/8/8/8/8/3RK3 w - - 0 1").unwrap();
        let m = capture(&pos, "d1", "d8");
        // The black king recaptures and nothing supports the rook.
        assert_eq!(pos.see(Color::White, &m), 500 - 500);
    }

    #[test]
    fn battery_counts_rook_behind_rook() {
        let mut pos = Position::from_fen("3r3k/3r4/8/8/8/8/3R4/3RK3 w - - 0 1").unwrap();
        let m = capture(&pos, "d2", "d7");
        // RxR RxR RxR: white ends a rook up.
        assert_eq!(pos.see(Color::White, &m), 500);
    }

    #[test]
    fn see_restores_the_attacker() {
        let mut pos = Position::from_fen("4k3/8/2p5/3p4/8/8/8/3QK3 w - - 0 1").unwrap();
        let m = capture(&pos, "d1", "d5");
        let before = pos.to_fen();
        pos.see(Color::White, &m);
        assert_eq!(pos.to_fen(), before);
        assert!(pos.validate().is_ok());
    }
}
