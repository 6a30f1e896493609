use chess_core::Move;
use tracing::{debug, debug_span, info};

use super::{
    MaxDepthReason, SearchContext, SearchLimits, SearchMode, SearchReport, SearchStats,
    Termination, DRAW, INFINITY, WINDOW, WIN_THRESHOLD,
};
use crate::evaluate::classify;
use crate::MAX_SEARCH_DEPTH;

/// Which window the current iteration is searching with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Aspiration,
    FailHigh,
    FailLow,
}

impl SearchContext {
    /// Runs a complete root search under `limits` and reports the result.
    /// `default_depth` applies when the limits name no depth.
    pub(crate) fn run(
        &mut self,
        limits: &SearchLimits,
        mode: SearchMode,
        default_depth: usize,
    ) -> SearchReport {
        let max_depth = limits
            .max_depth
            .unwrap_or(default_depth)
            .clamp(1, MAX_SEARCH_DEPTH - 2);

        self.control.start(limits);
        self.stats = SearchStats::default();
        self.last_ply_null = false;

        let (score, depth, termination) = self.iterate(max_depth, mode);
        let pv = self.resolved_pv();
        let elapsed = self.control.elapsed();

        info!(
            ?mode,
            score,
            depth,
            nodes = self.stats.nodes,
            qnodes = self.stats.qnodes,
            ms = elapsed.as_millis() as u64,
            ?termination,
            "search finished"
        );

        SearchReport {
            score,
            depth,
            best_move: pv.first().copied(),
            ponder_move: pv.get(1).copied(),
            pv,
            nodes: self.stats.nodes,
            qnodes: self.stats.qnodes,
            elapsed,
            termination,
            stats: self.stats,
        }
    }

    /// Decides the evaluation routine and null move soundness for the
    /// whole search from the root material.
    fn prepare_phase(&mut self) {
        let (phase, null_move_sound) = classify(&self.pos);
        self.eval.set_phase(phase);
        self.eval.set_full_eval(self.options.full_eval);
        self.null_move_active = self.options.null_move && null_move_sound;
        debug!(?phase, null_move = self.null_move_active, "root phase");
    }

    /// Iterative deepening from depth 1 to `max_depth`. Each iteration
    /// starts with a narrow window around the previous score and re-searches
    /// with an open bound on the side that failed.
    fn iterate(&mut self, max_depth: usize, mode: SearchMode) -> (i32, usize, Termination) {
        let span = debug_span!("iterate", max_depth, ?mode);
        let _enter = span.enter();

        self.prepare_phase();

        let mut last_score = 0;
        let mut score = 0;
        for depth in 1..=max_depth {
            let n = depth as u32;
            if self.options.killers && !self.options.transref {
                let line = self.pv.line(0).to_vec();
                self.killers.seed_from_pv(&line);
            }

            let mut window = Window::Aspiration;
            let mut saved = None;
            score = self.negamax(last_score - WINDOW, last_score + WINDOW, n, 0);
            if !self.control.aborted() {
                if score <= last_score - WINDOW {
                    self.post(depth, score, "fail low");
                    window = Window::FailLow;
                    saved = self.pv.line(0).first().copied();
                    score = self.negamax(-INFINITY, last_score - WINDOW, n, 0);
                } else if score >= last_score + WINDOW {
                    self.post(depth, score, "fail high");
                    window = Window::FailHigh;
                    score = self.negamax(last_score + WINDOW, INFINITY, n, 0);
                }
            }

            if self.control.aborted() {
                score = match window {
                    Window::FailLow => {
                        // The re-search found nothing yet; fall back to the
                        // move that was best before the score dropped.
                        if let Some(m) = saved {
                            self.pv.set_root(m);
                        }
                        last_score
                    }
                    Window::FailHigh => score.max(last_score),
                    Window::Aspiration => last_score,
                };
                self.post(depth, score, "interrupted");
                return (score, depth, Termination::Aborted);
            }

            self.post(depth, score, "iteration complete");
            last_score = score;
        }

        let reason = if score > WIN_THRESHOLD {
            MaxDepthReason::Win
        } else if score < -WIN_THRESHOLD {
            MaxDepthReason::Loss
        } else if score == DRAW {
            MaxDepthReason::Draw
        } else {
            MaxDepthReason::DepthLimit
        };
        debug!(?reason, "reached maximum depth");
        (score, max_depth, Termination::Completed(reason))
    }

    fn post(&self, depth: usize, score: i32, what: &str) {
        if !self.options.post {
            return;
        }
        let line: Vec<String> = self.pv.line(0).iter().map(|m| m.to_uci()).collect();
        debug!(
            depth,
            score,
            nodes = self.stats.nodes + self.stats.qnodes,
            ms = self.control.elapsed().as_millis() as u64,
            pv = %line.join(" "),
            "{what}"
        );
    }

    /// The root line with every move checked against the position it is
    /// played in. Table moves are resolved into full moves; the line ends
    /// at the first move that is not legal.
    pub(crate) fn resolved_pv(&mut self) -> Vec<Move> {
        let line = self.pv.line(0).to_vec();
        let mut resolved: Vec<Move> = Vec::with_capacity(line.len());

        for mut m in line {
            if !self.pos.verify_move(&mut self.buf, 0, &mut m) {
                break;
            }
            if !self.pos.make_move(&m) {
                self.pos.undo_move(&m);
                break;
            }
            self.pos.flip();
            resolved.push(m);
        }
        for m in resolved.iter().rev() {
            self.pos.unflip();
            self.pos.undo_move(m);
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineOptions;
    use crate::evaluate::Evaluator;
    use crate::search::{SearchControl, MATE};
    use crate::tt::TranspositionTable;
    use crate::Position;

    const MATE_AT_ONE: i32 = MATE + 1;

    fn context_with(fen: &str, options: EngineOptions) -> SearchContext {
        let pos = Position::from_fen(fen).unwrap();
        let mut ctx = SearchContext::new(
            pos,
            TranspositionTable::new(16).unwrap(),
            Evaluator::new(10, options.full_eval).unwrap(),
            options,
            SearchControl::new(Arc::new(AtomicBool::new(false)), 4096),
        );
        let (side, hash) = (ctx.pos.side_to_move(), ctx.pos.hash());
        ctx.repetition.push(side, hash);
        ctx
    }

    fn context(fen: &str) -> SearchContext {
        context_with(fen, EngineOptions::default())
    }

    fn search(ctx: &mut SearchContext, depth: usize) -> SearchReport {
        ctx.run(&SearchLimits::depth(depth), SearchMode::Search, depth)
    }

    #[test]
    fn finds_back_rank_mate() {
        let mut ctx = context("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
        let report = search(&mut ctx, 3);
        assert_eq!(report.best_move.map(|m| m.to_uci()).as_deref(), Some("a1a8"));
        assert_eq!(report.score, -MATE_AT_ONE);
        assert_eq!(report.termination, Termination::Completed(MaxDepthReason::Win));
    }

    #[test]
    fn mated_root_is_a_loss() {
        let mut ctx = context("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1");
        let report = search(&mut ctx, 2);
        assert_eq!(report.score, MATE);
        assert!(report.pv.is_empty());
        assert_eq!(report.best_move, None);
        assert_eq!(report.termination, Termination::Completed(MaxDepthReason::Loss));
    }

    #[test]
    fn stalemate_scores_draw() {
        let mut ctx = context("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        let report = search(&mut ctx, 2);
        assert_eq!(report.score, DRAW);
        assert_eq!(report.best_move, None);
        assert_eq!(report.termination, Termination::Completed(MaxDepthReason::Draw));
    }

    #[test]
    fn wins_hanging_queen() {
        let mut ctx = context("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1");
        let report = search(&mut ctx, 3);
        assert_eq!(report.best_move.map(|m| m.to_uci()).as_deref(), Some("d1d5"));
        assert!(report.score > 300);
    }

    #[test]
    fn search_is_deterministic() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
        let first = search(&mut context(fen), 4);
        let second = search(&mut context(fen), 4);
        assert_eq!(first.score, second.score);
        assert_eq!(first.pv, second.pv);
        assert_eq!(first.nodes, second.nodes);
    }

    #[test]
    fn principal_variation_is_playable() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
        let mut ctx = context(fen);
        let report = search(&mut ctx, 5);
        assert!(!report.pv.is_empty());
        let mut pos = Position::from_fen(fen).unwrap();
        let mut buf = crate::movegen::MoveBuffer::new();
        for m in &report.pv {
            let mut resolved = *m;
            assert!(pos.verify_move(&mut buf, 0, &mut resolved), "{} illegal", m.to_uci());
            assert!(pos.make_move(m));
            pos.flip();
        }
        // The search leaves its own position untouched.
        assert_eq!(ctx.pos.to_fen(), Position::from_fen(fen).unwrap().to_fen());
        assert_eq!(ctx.pos.ply(), 0);
    }

    #[test]
    fn node_budget_aborts_and_restores_position() {
        let fen = chess_core::FenParser::STARTPOS;
        let mut ctx = SearchContext::new(
            Position::from_fen(fen).unwrap(),
            TranspositionTable::new(12).unwrap(),
            Evaluator::new(9, false).unwrap(),
            EngineOptions::default(),
            SearchControl::new(Arc::new(AtomicBool::new(false)), 16),
        );
        let limits = SearchLimits {
            max_depth: Some(30),
            nodes: Some(200),
            ..SearchLimits::default()
        };
        let report = ctx.run(&limits, SearchMode::Analyze, 30);
        assert_eq!(report.termination, Termination::Aborted);
        assert!(report.depth < 30);
        assert_eq!(ctx.pos.to_fen(), fen);
        assert!(ctx.pos.validate().is_ok());
    }

    #[test]
    fn window_failures_keep_a_legal_line() {
        // A queen down: the first iteration falls far below the zero window.
        let fen = "3qk3/8/8/8/8/8/8/4K3 w - - 0 1";
        let mut ctx = context(fen);
        let report = search(&mut ctx, 3);
        assert!(report.score < -500);
        assert!(report.best_move.is_some());
        assert_eq!(report.termination, Termination::Completed(MaxDepthReason::DepthLimit));

        // And far above it with the other side to move.
        let mut ctx = context("3qk3/8/8/8/8/8/8/4K3 b - - 0 1");
        let report = search(&mut ctx, 3);
        assert!(report.score > 500);

        let mut pos = Position::from_fen(fen).unwrap();
        let mut buf = crate::movegen::MoveBuffer::new();
        for m in &search(&mut context(fen), 3).pv {
            let mut resolved = *m;
            assert!(pos.verify_move(&mut buf, 0, &mut resolved));
            assert!(pos.make_move(m));
            pos.flip();
        }
    }

    fn play(ctx: &mut SearchContext, uci: &str) {
        let mut m = Move::from_uci(uci).unwrap();
        assert!(ctx.pos.verify_move(&mut ctx.buf, 0, &mut m), "{uci} illegal");
        assert!(ctx.pos.make_move(&m));
        ctx.pos.flip();
    }

    /// Moves the root of `ctx` down to `ply` without playing moves.
    fn root_at_ply(ctx: &mut SearchContext, ply: usize) {
        ctx.pos.flags[ply] = ctx.pos.flags[0];
        ctx.pos.ply = ply;
    }

    #[test]
    fn repetition_inside_the_tree_is_a_draw() {
        let fen = "4k1n1/8/8/8/8/8/8/3QK1N1 w - - 0 1";
        let mut ctx = context(fen);
        for m in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            play(&mut ctx, m);
        }
        assert_eq!(ctx.pos.ply(), 4);
        ctx.control.start(&SearchLimits::default());
        assert_eq!(ctx.negamax(-INFINITY, INFINITY, 2, 0), DRAW);
        assert!(ctx.pv.line(4).is_empty());

        // The same position as a fresh root is a queen up.
        assert!(search(&mut context(fen), 2).score > 500);
    }

    #[test]
    fn search_stops_at_the_deepest_ply() {
        let kiwipete = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let mut ctx = context(kiwipete);
        let root = MAX_SEARCH_DEPTH - 5;
        root_at_ply(&mut ctx, root);
        let fen = ctx.pos.to_fen();
        ctx.control.start(&SearchLimits::default());

        let score = ctx.negamax(-INFINITY, INFINITY, 3, 0);
        assert!(score.abs() < INFINITY);
        assert_eq!(ctx.pos.ply(), root);
        assert_eq!(ctx.pos.to_fen(), fen);

        // At the last ply both searches fall back to the static score.
        root_at_ply(&mut ctx, MAX_SEARCH_DEPTH - 1);
        let stand_pat =
            ctx.eval
                .evaluate(&ctx.pos, -INFINITY, INFINITY, &mut SearchStats::default());
        assert_eq!(ctx.quiesce(-INFINITY, INFINITY, 0), stand_pat);
        assert_eq!(ctx.negamax(-INFINITY, INFINITY, 2, 0), stand_pat);
        assert!(ctx.pv.line(MAX_SEARCH_DEPTH - 1).is_empty());
    }

    #[test]
    fn aborted_fail_low_falls_back_to_previous_best() {
        // In check and a queen down: the first window fails low and the
        // re-search runs one node per root move.
        let fen = "4k3/8/8/8/8/8/8/q3K3 w - - 0 1";
        let options = EngineOptions {
            transref: false,
            killers: false,
            ..EngineOptions::default()
        };
        let (mut aborted, mut completed) = (0, 0);
        for previous_index in 0..3 {
            for budget in 1..=400 {
                let mut ctx = SearchContext::new(
                    Position::from_fen(fen).unwrap(),
                    TranspositionTable::new(12).unwrap(),
                    Evaluator::new(9, false).unwrap(),
                    options,
                    SearchControl::new(Arc::new(AtomicBool::new(false)), 1),
                );
                let (side, hash) = (ctx.pos.side_to_move(), ctx.pos.hash());
                ctx.repetition.push(side, hash);
                let moves = crate::movegen::legal_moves(&mut ctx.pos, &mut ctx.buf, 0);
                assert_eq!(moves.len(), 3);
                let previous = moves[previous_index];
                ctx.pv.set_root(previous);

                let limits = SearchLimits {
                    max_depth: Some(1),
                    nodes: Some(budget),
                    ..SearchLimits::default()
                };
                let report = ctx.run(&limits, SearchMode::Search, 1);
                match report.termination {
                    Termination::Aborted => {
                        aborted += 1;
                        assert_eq!(
                            report.best_move,
                            Some(previous),
                            "budget {budget}: previous best {} lost",
                            previous.to_uci()
                        );
                        assert_eq!(report.score, 0);
                    }
                    Termination::Completed(_) => {
                        completed += 1;
                        assert!(report.score <= -WINDOW);
                    }
                }
                assert_eq!(ctx.pos.to_fen(), Position::from_fen(fen).unwrap().to_fen());
            }
        }
        assert!(aborted > 0);
        assert!(completed > 0);
    }

    #[test]
    fn heuristics_off_agree_on_forced_mate() {
        let options = EngineOptions {
            transref: false,
            killers: false,
            null_move: false,
            ..EngineOptions::default()
        };
        let mut ctx = context_with("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", options);
        let report = search(&mut ctx, 3);
        assert_eq!(report.score, -MATE_AT_ONE);
        assert_eq!(report.stats.tt_hits, 0);
    }
}
