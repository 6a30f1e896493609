use tracing::debug;

use super::{SearchContext, DRAW, FULL_ORDER_DEPTH, MATE, NULL_DEPTH_REDUCTION, ORDERING_THRESHOLD};
use crate::movegen::generate_moves;
use crate::order::{order_moves, order_root_moves, pick};
use crate::repetition::Repetition;
use crate::tt::Bound;
use crate::MAX_SEARCH_DEPTH;

impl SearchContext {
    /// Full-width alpha-beta search of the current position with `depth`
    /// plies left. Moves are generated into the buffer from `index` on.
    ///
    /// Returns a score for the side to move, clamped to the window on
    /// cutoffs. After an abort the result is meaningless and the caller
    /// must not use it.
    pub(crate) fn negamax(&mut self, alpha: i32, beta: i32, mut depth: u32, index: usize) -> i32 {
        if self.control.aborted() {
            return 0;
        }
        self.stats.nodes += 1;
        if self.control.tick(self.stats.nodes + self.stats.qnodes) {
            return 0;
        }

        let ply = self.pos.ply();
        if ply >= MAX_SEARCH_DEPTH - 1 {
            self.pv.cut(ply);
            return self.eval.evaluate(&self.pos, alpha, beta, &mut self.stats);
        }
        let side = self.pos.side_to_move();
        let hash = self.pos.hash();

        let reverse = self.pos.flags().reverse;
        if self.repetition.check(side, ply, reverse, hash) != Repetition::None {
            if alpha < DRAW && DRAW < beta {
                self.pv.cut(ply);
            }
            return DRAW;
        }

        let old_depth = depth;
        let mut best = alpha;
        let mut best_index = index;

        let mut tt_move = None;
        let mut tt_bound = None;
        if self.options.transref {
            if let Some(hit) = self.tt.probe(hash, ply) {
                self.stats.tt_hits += 1;
                tt_move = hit.best;
                tt_bound = Some(hit.bound);
                if hit.height >= depth {
                    match hit.bound {
                        Bound::Lower if hit.score >= beta => return beta,
                        Bound::Upper if hit.score <= alpha => return alpha,
                        Bound::Exact => {
                            if hit.score >= beta {
                                return beta;
                            }
                            match hit.best {
                                Some(from_to) => self.pv.update_from_hash(ply, from_to),
                                None => self.pv.cut(ply),
                            }
                            return hit.score;
                        }
                        _ => {}
                    }
                }
            }
        }

        // Checks are searched one ply deeper.
        let in_check = self.pos.in_check(side);
        if depth != 0 && !in_check {
            depth -= 1;
        }

        if !self.last_ply_null {
            if depth > NULL_DEPTH_REDUCTION
                && old_depth > depth
                && self.null_move_active
                && ply > 0
            {
                self.last_ply_null = true;
                self.pos.make_null_move();
                self.pos.flip();
                let value = -self.negamax(-beta, -best, depth - NULL_DEPTH_REDUCTION, index);
                self.pos.unflip();
                if value >= beta && !self.control.aborted() {
                    return beta;
                }
            }
        } else {
            self.last_ply_null = false;
        }

        let end = generate_moves(&self.pos, &mut self.buf, index);
        self.stats.moves_generated += (end - index) as u64;

        let killers_on = self.options.killers;
        if depth >= FULL_ORDER_DEPTH {
            order_root_moves(
                self.buf.slice_mut(index, end),
                tt_move,
                depth,
                ply,
                killers_on.then_some(&self.killers),
            );
        } else {
            // Upper bounds carry no usable move: the bound is tested as a
            // bit set, so exact entries keep their move too.
            if ply != 0 && !tt_bound.is_some_and(Bound::move_useful) {
                tt_move = None;
            }
            order_moves(
                &mut self.pos,
                self.buf.slice_mut(index, end),
                tt_move,
                depth,
                killers_on.then_some(&mut self.killers),
            );
        }

        let mut legal_found = 0usize;
        for k in index..end {
            self.stats.moves_searched += 1;
            if depth >= FULL_ORDER_DEPTH || legal_found < ORDERING_THRESHOLD {
                pick(self.buf.slice_mut(index, end), k - index);
            }
            let m = self.buf[k];

            if !self.pos.make_move(&m) {
                self.pos.undo_move(&m);
                continue;
            }
            legal_found += 1;
            self.pos.flip();
            let value = if depth > 0 {
                -self.negamax(-beta, -best, depth, end)
            } else {
                -self.quiesce(-beta, -best, end)
            };
            self.pos.unflip();
            self.pos.undo_move(&m);

            if self.control.aborted() {
                self.buf.clear(index, end);
                return 0;
            }
            if value <= best {
                continue;
            }
            if value >= beta {
                if ply == 0 {
                    self.pv.clear_from(1);
                    self.pv.update(0, m);
                }
                if killers_on && depth > 0 {
                    self.killers.update(ply, m.from_to());
                }
                if self.options.transref {
                    self.tt
                        .store(hash, Some(m.from_to()), beta, old_depth, Bound::Lower, ply);
                }
                self.buf.clear(index, end);
                return beta;
            }
            best = value;
            best_index = k;
            self.pv.update(ply, m);
            if ply == 0 && self.options.post {
                debug!(depth = old_depth, score = value, best = %m.to_uci(), "new best move");
            }
        }

        if legal_found > 0 && self.options.transref {
            if best == alpha {
                // At the root the move that was best before failing low is
                // kept so that it is searched first again.
                let keep = if ply == 0 {
                    self.pv.line(0).first().map(|m| m.from_to())
                } else {
                    None
                };
                self.tt.store(hash, keep, best, old_depth, Bound::Upper, ply);
            } else {
                let m = self.buf[best_index];
                self.tt
                    .store(hash, Some(m.from_to()), best, old_depth, Bound::Exact, ply);
            }
        }

        self.buf.clear(index, end);

        if legal_found == 0 {
            self.pv.cut(ply);
            return if in_check { MATE + ply as i32 } else { DRAW };
        }
        best
    }
}
