//! Alpha-beta search.
//!
//! [`SearchContext`] bundles everything a search touches: the position with
//! its per-ply flags, the shared move buffer, the hash tables, killers and
//! the principal variation. The search itself is a recursive negamax
//! ([`negamax`](SearchContext::negamax)) ending in a capture-only
//! quiescence search, driven by iterative deepening with aspiration
//! windows.
//!
//! Aborting is cooperative. Every few thousand nodes the search looks at
//! the clock, the node budget and an external stop flag; once any of them
//! fires each frame returns as soon as it has undone its current move.

mod iterate;
mod negamax;
mod pv;
mod quiesce;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chess_core::Move;

use crate::config::EngineOptions;
use crate::evaluate::Evaluator;
use crate::movegen::MoveBuffer;
use crate::order::Killers;
use crate::repetition::RepetitionHistory;
use crate::tt::TranspositionTable;
use crate::Position;

pub use pv::PvTable;

/// Larger than any score.
pub const INFINITY: i32 = 50000;
/// Score of being mated at the root; mated `n` plies deep scores `MATE + n`.
pub const MATE: i32 = -30000;
pub const DRAW: i32 = 0;
/// Half width of the aspiration window.
pub const WINDOW: i32 = 40;
pub const NULL_DEPTH_REDUCTION: u32 = 2;
/// Nodes with at least this much depth left pick every move in key order.
pub const FULL_ORDER_DEPTH: u32 = 2;
/// Elsewhere only this many legal moves are picked; the rest follow in
/// generation order.
pub const ORDERING_THRESHOLD: usize = 6;
/// Iteration scores beyond this magnitude announce a forced mate.
pub const WIN_THRESHOLD: i32 = -MATE - 250;

/// What the engine is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Searching,
    Pondering,
    Analyzing,
}

/// How a search was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Find a move to play.
    #[default]
    Search,
    /// Think about the expected reply during the opponent's time.
    Ponder,
    /// Analyse until a limit or an external stop.
    Analyze,
}

impl SearchMode {
    pub fn state(self) -> SearchState {
        match self {
            SearchMode::Search => SearchState::Searching,
            SearchMode::Ponder => SearchState::Pondering,
            SearchMode::Analyze => SearchState::Analyzing,
        }
    }
}

/// Limits for one search. Unset limits do not apply; the depth limit then
/// comes from the engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchLimits {
    pub max_depth: Option<usize>,
    pub move_time: Option<Duration>,
    pub nodes: Option<u64>,
}

impl SearchLimits {
    pub fn depth(depth: usize) -> Self {
        SearchLimits {
            max_depth: Some(depth),
            ..Self::default()
        }
    }

    pub fn move_time(time: Duration) -> Self {
        SearchLimits {
            move_time: Some(time),
            ..Self::default()
        }
    }
}

/// Counters collected during one root search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Full-width nodes.
    pub nodes: u64,
    /// Quiescence nodes.
    pub qnodes: u64,
    pub evals: u64,
    /// Evaluations that went past the lazy material cutoff.
    pub full_evals: u64,
    pub moves_generated: u64,
    pub moves_searched: u64,
    pub pawn_hits: u64,
    pub pawn_misses: u64,
    pub tt_hits: u64,
}

/// Why iterating stopped before the requested depth could be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxDepthReason {
    /// The side to move mates.
    Win,
    /// The side to move gets mated.
    Loss,
    Draw,
    /// The depth limit was reached with an ordinary score.
    DepthLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every iteration up to the depth limit finished.
    Completed(MaxDepthReason),
    /// The clock, the node budget or a stop request ended the search.
    Aborted,
}

/// Result of a root search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReport {
    /// Score for the side to move at the root.
    pub score: i32,
    /// Last iteration started.
    pub depth: usize,
    pub pv: Vec<Move>,
    pub best_move: Option<Move>,
    /// Expected reply to the best move.
    pub ponder_move: Option<Move>,
    pub nodes: u64,
    pub qnodes: u64,
    pub elapsed: Duration,
    pub termination: Termination,
    pub stats: SearchStats,
}

/// Clock, node budget and stop flag of a running search.
pub(crate) struct SearchControl {
    stop: Arc<AtomicBool>,
    started: Instant,
    move_time: Option<Duration>,
    node_limit: Option<u64>,
    check_interval: u64,
    since_check: u64,
    aborted: bool,
}

impl SearchControl {
    pub(crate) fn new(stop: Arc<AtomicBool>, check_interval: u64) -> Self {
        SearchControl {
            stop,
            started: Instant::now(),
            move_time: None,
            node_limit: None,
            check_interval: check_interval.max(1),
            since_check: 0,
            aborted: false,
        }
    }

    /// Arms the control for a new root search.
    pub(crate) fn start(&mut self, limits: &SearchLimits) {
        self.stop.store(false, Ordering::Relaxed);
        self.started = Instant::now();
        self.move_time = limits.move_time;
        self.node_limit = limits.nodes;
        self.since_check = 0;
        self.aborted = false;
    }

    pub(crate) fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[inline]
    pub(crate) fn aborted(&self) -> bool {
        self.aborted
    }

    /// Counts a node without looking at the limits.
    #[inline]
    pub(crate) fn count(&mut self) {
        self.since_check += 1;
    }

    /// Counts a node and, once per interval, checks the limits. Returns
    /// whether the search has to unwind.
    pub(crate) fn tick(&mut self, nodes: u64) -> bool {
        self.since_check += 1;
        if self.since_check > self.check_interval {
            self.since_check = 0;
            self.poll(nodes);
        }
        self.aborted
    }

    fn poll(&mut self, nodes: u64) {
        if self.stop.load(Ordering::Relaxed)
            || self.move_time.is_some_and(|t| self.started.elapsed() >= t)
            || self.node_limit.is_some_and(|n| nodes >= n)
        {
            self.aborted = true;
        }
    }
}

/// Mutable state shared by every frame of a search.
pub struct SearchContext {
    pub(crate) pos: Position,
    pub(crate) buf: MoveBuffer,
    pub(crate) tt: TranspositionTable,
    pub(crate) eval: Evaluator,
    pub(crate) killers: Killers,
    pub(crate) pv: PvTable,
    pub(crate) repetition: RepetitionHistory,
    /// Options in effect for the running search.
    pub(crate) options: EngineOptions,
    pub(crate) stats: SearchStats,
    pub(crate) control: SearchControl,
    /// Null move is allowed by the options and sound in the root phase.
    null_move_active: bool,
    /// The previous ply was a null move.
    last_ply_null: bool,
}

impl SearchContext {
    pub(crate) fn new(
        pos: Position,
        tt: TranspositionTable,
        eval: Evaluator,
        options: EngineOptions,
        control: SearchControl,
    ) -> Self {
        SearchContext {
            pos,
            buf: MoveBuffer::new(),
            tt,
            eval,
            killers: Killers::new(),
            pv: PvTable::new(),
            repetition: RepetitionHistory::new(),
            options,
            stats: SearchStats::default(),
            control,
            null_move_active: options.null_move,
            last_ply_null: false,
        }
    }

    /// Empties both hash tables.
    pub fn clear_tables(&mut self) {
        self.tt.clear();
        self.eval.clear_pawn_table();
    }

    /// Forgets everything learned in earlier searches.
    pub(crate) fn reset_search_memory(&mut self) {
        self.tt.clear();
        self.eval.reset();
        self.killers.clear();
        self.pv.clear_from(0);
        self.stats = SearchStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_polls_once_per_interval() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut control = SearchControl::new(Arc::clone(&stop), 4);
        control.start(&SearchLimits::default());
        stop.store(true, Ordering::Relaxed);
        let mut ticks = 0;
        while !control.tick(ticks) {
            ticks += 1;
        }
        assert_eq!(ticks, 4);
        assert!(control.aborted());
    }

    #[test]
    fn node_limit_aborts() {
        let mut control = SearchControl::new(Arc::new(AtomicBool::new(false)), 1);
        control.start(&SearchLimits {
            nodes: Some(10),
            ..SearchLimits::default()
        });
        assert!(!control.tick(5));
        assert!(!control.tick(5));
        assert!(control.tick(10) || control.tick(10));
        control.start(&SearchLimits::default());
        assert!(!control.aborted());
    }

    #[test]
    fn mode_maps_to_state() {
        assert_eq!(SearchMode::Search.state(), SearchState::Searching);
        assert_eq!(SearchMode::Ponder.state(), SearchState::Pondering);
        assert_eq!(SearchMode::Analyze.state(), SearchState::Analyzing);
    }
}
