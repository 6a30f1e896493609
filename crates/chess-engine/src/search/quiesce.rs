use super::SearchContext;
use crate::movegen::generate_captures;
use crate::MAX_SEARCH_DEPTH;

impl SearchContext {
    /// Capture-only search below the horizon.
    ///
    /// The static evaluation is the stand-pat score. Only captures and
    /// promotions that win material by exchange and could lift the score
    /// above alpha are tried, in generation order.
    pub(crate) fn quiesce(&mut self, alpha: i32, beta: i32, index: usize) -> i32 {
        self.stats.qnodes += 1;
        self.control.count();

        let ply = self.pos.ply();
        let mut best = alpha;

        let stand_pat = self.eval.evaluate(&self.pos, alpha, beta, &mut self.stats);
        if ply >= MAX_SEARCH_DEPTH - 1 {
            self.pv.cut(ply);
            return stand_pat;
        }
        let mut fixed = stand_pat;
        if stand_pat > alpha {
            if stand_pat >= beta {
                return beta;
            }
            self.pv.cut(ply);
            best = stand_pat;
        } else if stand_pat + self.eval.max_pos_score() < alpha {
            // A lazy score may be off by up to the positional range; lend it
            // that much so winning captures are not thrown away.
            fixed = stand_pat + self.eval.max_pos_score();
        }

        let side = self.pos.side_to_move();
        let end = generate_captures(&self.pos, &mut self.buf, index);
        for k in index..end {
            let m = self.buf[k];
            let gain = self.pos.see(side, &m);
            if gain <= 0 || gain + fixed <= alpha {
                continue;
            }

            if !self.pos.make_move(&m) {
                self.pos.undo_move(&m);
                continue;
            }
            self.pos.flip();
            let value = -self.quiesce(-beta, -best, end);
            self.pos.unflip();
            self.pos.undo_move(&m);

            if value > best {
                if value >= beta {
                    self.buf.clear(index, end);
                    return beta;
                }
                self.pv.update(ply, m);
                best = value;
            }
        }

        self.buf.clear(index, end);
        best
    }
}
