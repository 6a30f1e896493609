//! The engine object: a position with its game history, the hash tables and
//! the search state, behind one API for a front end.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use chess_core::{EpdRecord, FenParser, Move};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::evaluate::Evaluator;
use crate::movegen::legal_moves;
use crate::position::PlyFlags;
use crate::repetition::{Repetition, REPETITION_PLIES};
use crate::san::parse_san;
use crate::search::{
    SearchContext, SearchControl, SearchLimits, SearchMode, SearchReport, SearchState,
    Termination,
};
use crate::tt::TranspositionTable;
use crate::{EngineError, Position};

/// A move played at the root, with what is needed to take it back.
#[derive(Debug, Clone, Copy)]
struct RootEntry {
    mv: Move,
    /// Root flags right after the move was made.
    flags: PlyFlags,
    /// Reversible counter after the move; zero for irreversible moves.
    reverse: u32,
}

/// Outcome of one EPD test position.
#[derive(Debug, Clone)]
pub struct EpdOutcome {
    pub id: Option<String>,
    pub correct: bool,
    pub report: SearchReport,
}

pub struct Engine {
    config: EngineConfig,
    ctx: SearchContext,
    history: Vec<RootEntry>,
    state: SearchState,
    /// Resolved principal variation of the last search.
    last_pv: Vec<Move>,
}

impl Engine {
    /// Allocates the tables and sets up the starting position.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let tt = TranspositionTable::new(config.tt_bits)?;
        let eval = Evaluator::new(config.pawn_bits, config.options.full_eval)?;
        let control = SearchControl::new(
            Arc::new(AtomicBool::new(false)),
            config.node_check_interval,
        );
        info!(
            tt_bits = tt.bits(),
            pawn_bits = eval.pawn_bits(),
            max_depth = config.depth_limit(),
            "engine created"
        );
        let ctx = SearchContext::new(Position::startpos(), tt, eval, config.options, control);
        let mut engine = Engine {
            config,
            ctx,
            history: Vec::new(),
            state: SearchState::Idle,
            last_pv: Vec::new(),
        };
        engine.reset_root();
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn position(&self) -> &Position {
        &self.ctx.pos
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Moves played since the position was set, oldest first.
    pub fn moves_played(&self) -> impl Iterator<Item = Move> + '_ {
        self.history.iter().map(|e| e.mv)
    }

    /// Sets up a position and forgets everything learned so far.
    pub fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.ctx.pos = Position::from_fen(fen)?;
        self.history.clear();
        self.reset_root();
        self.ctx.reset_search_memory();
        info!(fen = %self.ctx.pos.to_fen(), "position set");
        Ok(())
    }

    pub fn new_game(&mut self) -> Result<(), EngineError> {
        self.set_position(FenParser::STARTPOS)
    }

    fn reset_root(&mut self) {
        self.last_pv.clear();
        self.ctx.repetition.reset();
        let (side, hash) = (self.ctx.pos.side_to_move(), self.ctx.pos.hash());
        self.ctx.repetition.push(side, hash);
    }

    /// Plays a move in the game. `m` only needs its squares (and promotion
    /// piece, if any); it is resolved against the legal moves in place.
    pub fn make_root_move(&mut self, m: &mut Move) -> Result<(), EngineError> {
        let pos = &mut self.ctx.pos;
        if !pos.verify_move(&mut self.ctx.buf, 0, m) {
            return Err(EngineError::IllegalMove(m.to_uci()));
        }
        if !pos.make_move(m) {
            pos.undo_move(m);
            return Err(EngineError::IllegalMove(m.to_uci()));
        }
        let entry = RootEntry {
            mv: *m,
            flags: *pos.flags_at(0),
            reverse: pos.flags_at(1).reverse,
        };
        pos.advance_root();
        self.history.push(entry);

        if entry.reverse == 0 {
            self.ctx.repetition.reset();
        }
        let (side, hash) = (self.ctx.pos.side_to_move(), self.ctx.pos.hash());
        self.ctx.repetition.push(side, hash);
        debug!(mv = %m.to_uci(), "root move made");
        Ok(())
    }

    /// Plays a move given in coordinate notation or SAN.
    pub fn make_root_move_text(&mut self, text: &str) -> Result<Move, EngineError> {
        let mut m = match Move::from_uci(text.trim()) {
            Some(m) => m,
            None => parse_san(&mut self.ctx.pos, text)?,
        };
        self.make_root_move(&mut m)?;
        Ok(m)
    }

    /// Takes back the last root move and returns it.
    pub fn unmake_root_move(&mut self) -> Result<Move, EngineError> {
        let entry = self.history.pop().ok_or(EngineError::NothingToUnmake)?;
        self.ctx.pos.retreat_root(entry.flags, &entry.mv);

        if entry.reverse == 0 {
            self.rebuild_repetition();
        } else {
            let side = self.ctx.pos.side_to_move().opposite();
            self.ctx.repetition.pop(side);
        }
        debug!(mv = %entry.mv.to_uci(), "root move taken back");
        Ok(entry.mv)
    }

    /// Refills the repetition lists from the game history after taking back
    /// an irreversible move.
    fn rebuild_repetition(&mut self) {
        let current = self.history.len();
        let start = self
            .history
            .iter()
            .rposition(|e| e.reverse == 0)
            .map_or(0, |k| k + 1);
        let side_now = self.ctx.pos.side_to_move();

        self.ctx.repetition.reset();
        for (k, entry) in self.history.iter().enumerate().skip(start) {
            let side = if (current - k) % 2 == 0 {
                side_now
            } else {
                side_now.opposite()
            };
            self.ctx.repetition.push(side, entry.flags.hash);
        }
        let hash = self.ctx.pos.hash();
        self.ctx.repetition.push(side_now, hash);
    }

    /// Whether the game is drawn at the root by the fifty-move rule or by
    /// threefold repetition.
    pub fn draw_by_repetition(&self) -> Repetition {
        let pos = &self.ctx.pos;
        if pos.flags().reverse >= REPETITION_PLIES {
            Repetition::FiftyMoves
        } else if self.ctx.repetition.threefold(pos.side_to_move(), pos.hash()) {
            Repetition::Repeated
        } else {
            Repetition::None
        }
    }

    pub fn clear_tables(&mut self) {
        self.ctx.clear_tables();
    }

    /// Flag that stops a running search at its next check. Cleared when a
    /// search starts.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.ctx.control.stop_handle()
    }

    /// Searches the current position.
    ///
    /// `Ponder` searches the position after the expected reply from the
    /// last principal variation; without one it returns an empty aborted
    /// report.
    pub fn search(&mut self, limits: SearchLimits, mode: SearchMode) -> SearchReport {
        match mode {
            SearchMode::Ponder => self.ponder(limits).unwrap_or_else(empty_report),
            SearchMode::Search | SearchMode::Analyze => self.run(limits, mode),
        }
    }

    fn run(&mut self, limits: SearchLimits, mode: SearchMode) -> SearchReport {
        self.ctx.options = self.config.options;
        self.state = mode.state();
        info!(
            ?mode,
            max_depth = limits.max_depth.unwrap_or(self.config.depth_limit()),
            move_time_ms = limits.move_time.map(|t| t.as_millis() as u64),
            nodes = limits.nodes,
            "search started"
        );

        let mut report = self.ctx.run(&limits, mode, self.config.depth_limit());
        self.state = SearchState::Idle;

        if report.best_move.is_none() && report.termination == Termination::Aborted {
            // Stopped before the first iteration produced a move.
            report.best_move = legal_moves(&mut self.ctx.pos, &mut self.ctx.buf, 0)
                .first()
                .copied();
            if let Some(m) = report.best_move {
                warn!(mv = %m.to_uci(), "no move searched, playing first legal move");
            }
        }
        self.last_pv = report.pv.clone();
        report
    }

    /// Thinks on the opponent's time: plays the expected reply from the
    /// last principal variation, searches, and takes the reply back.
    pub fn ponder(&mut self, limits: SearchLimits) -> Option<SearchReport> {
        if !self.config.options.ponder {
            return None;
        }
        let mut predicted = self.ctx.pv.line(0).get(1).copied()?;
        if let Err(e) = self.make_root_move(&mut predicted) {
            debug!(error = %e, "expected reply not playable");
            return None;
        }
        info!(mv = %predicted.to_uci(), "pondering");

        let mut report = self.run(limits, SearchMode::Ponder);
        report.ponder_move = Some(predicted);
        if let Err(e) = self.unmake_root_move() {
            warn!(error = %e, "could not take back ponder move");
        }
        Some(report)
    }

    /// Whether the first move of the last principal variation solves an
    /// EPD record set up in the current position.
    ///
    /// Records with best moves need one of them. Records with only moves to
    /// avoid are solved by any other move.
    pub fn solution_correct(&mut self, record: &EpdRecord) -> bool {
        let Some(played) = self.last_pv.first().copied() else {
            return false;
        };
        let pos = &mut self.ctx.pos;
        let mut any_match = |list: &[String]| {
            list.iter().any(|san| match parse_san(pos, san) {
                Ok(m) => m.from_to() == played.from_to() && m.promoted() == played.promoted(),
                Err(e) => {
                    warn!(%san, error = %e, "could not parse solution move");
                    false
                }
            })
        };
        if any_match(&record.best_moves) {
            return true;
        }
        record.best_moves.is_empty()
            && !record.avoid_moves.is_empty()
            && !any_match(&record.avoid_moves)
    }

    /// Sets up an EPD record, searches it and checks the result.
    pub fn solve_epd(
        &mut self,
        record: &EpdRecord,
        limits: SearchLimits,
    ) -> Result<EpdOutcome, EngineError> {
        self.set_position(&record.fen())?;
        let report = self.search(limits, SearchMode::Search);
        let correct = self.solution_correct(record);
        info!(
            id = record.id.as_deref().unwrap_or("-"),
            correct,
            best = report.best_move.map(|m| m.to_uci()).as_deref().unwrap_or("-"),
            "epd position done"
        );
        Ok(EpdOutcome {
            id: record.id.clone(),
            correct,
            report,
        })
    }
}

fn empty_report() -> SearchReport {
    SearchReport {
        score: 0,
        depth: 0,
        pv: Vec::new(),
        best_move: None,
        ponder_move: None,
        nodes: 0,
        qnodes: 0,
        elapsed: Duration::ZERO,
        termination: Termination::Aborted,
        stats: Default::default(),
    }
}
