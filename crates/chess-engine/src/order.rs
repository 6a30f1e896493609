//! Move ordering.
//!
//! Ordering only assigns keys; nothing is sorted. The search calls [`pick`]
//! before each move to swap the best remaining key into place, so moves
//! that are never reached because of a cutoff are never ordered.

use chess_core::Move;
use tracing::warn;

use crate::{Position, MAX_SEARCH_DEPTH};

/// Key of the transposition table move. Larger than any other key.
pub const TRANSREF_BONUS: i32 = 2000;
pub const KILLER_BONUS: i32 = 80;
/// Added to the exchange value of captures and promotions.
pub const CAPTURE_BONUS: i32 = 30;
/// Use count a killer keeps when its ply is revisited.
pub const RESET_USE_COUNT: u32 = 3;

/// Lower than any key a move can carry.
const LOW_KEY: i32 = -20000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Killer {
    from_to: Option<u16>,
    uses: u32,
}

/// Two quiet moves per ply that recently caused a cutoff.
#[derive(Debug, Clone)]
pub struct Killers {
    slots: Vec<[Killer; 2]>,
}

impl Killers {
    pub fn new() -> Self {
        Killers {
            slots: vec![[Killer::default(); 2]; MAX_SEARCH_DEPTH + 1],
        }
    }

    pub fn clear(&mut self) {
        self.slots.fill([Killer::default(); 2]);
    }

    /// Records a cutoff move at `ply`. A known killer gains a use, a new
    /// one replaces the less used slot.
    pub fn update(&mut self, ply: usize, from_to: u16) {
        let slots = &mut self.slots[ply];
        if let Some(known) = slots.iter_mut().find(|k| k.from_to == Some(from_to)) {
            known.uses += 1;
            return;
        }
        let victim = if slots[0].uses < slots[1].uses { 0 } else { 1 };
        slots[victim] = Killer {
            from_to: Some(from_to),
            uses: 1,
        };
    }

    /// Caps the use counts at `ply` so that an old killer cannot hold its
    /// slot for the rest of the iteration.
    pub fn reset_use_count(&mut self, ply: usize) {
        if let Some(slots) = self.slots.get_mut(ply) {
            for killer in slots {
                killer.uses = killer.uses.min(RESET_USE_COUNT);
            }
        }
    }

    #[inline]
    pub fn is_killer(&self, ply: usize, from_to: u16) -> bool {
        self.slots[ply].iter().any(|k| k.from_to == Some(from_to))
    }

    /// Seeds the first slot of each ply with the previous principal
    /// variation so it is tried first once more.
    pub fn seed_from_pv(&mut self, pv: &[Move]) {
        for (slots, m) in self.slots.iter_mut().zip(pv) {
            slots[0] = Killer {
                from_to: Some(m.from_to()),
                uses: RESET_USE_COUNT,
            };
        }
    }
}

impl Default for Killers {
    fn default() -> Self {
        Self::new()
    }
}

fn warn_missing(tt_move: Option<u16>, ply: usize) {
    if let Some(from_to) = tt_move {
        warn!(ply, from_to, "transposition move not generated");
    }
}

/// Keys the moves of an interior node: the transposition move first, then
/// captures by exchange value, then killers.
///
/// With `killers` given and `depth > 0` the use counts of the next ply are
/// reset as well.
pub fn order_moves(
    pos: &mut Position,
    moves: &mut [Move],
    mut tt_move: Option<u16>,
    depth: u32,
    mut killers: Option<&mut Killers>,
) {
    let ply = pos.ply();
    let side = pos.side_to_move();
    let killers_active = depth > 0 && killers.is_some();
    if killers_active {
        if let Some(k) = killers.as_deref_mut() {
            k.reset_use_count(ply + 1);
        }
    }

    for m in moves.iter_mut() {
        if tt_move == Some(m.from_to()) {
            m.key = TRANSREF_BONUS;
            tt_move = None;
            continue;
        }
        if m.is_tactical() {
            m.key = pos.see(side, m) + CAPTURE_BONUS;
            continue;
        }
        if killers_active && killers.as_deref().is_some_and(|k| k.is_killer(ply, m.from_to())) {
            m.key = KILLER_BONUS;
        }
    }

    warn_missing(tt_move, ply);
}

/// Keys the moves of a node close to the root, where every move is picked
/// in order anyway: the transposition move and killers only.
pub fn order_root_moves(
    moves: &mut [Move],
    mut tt_move: Option<u16>,
    depth: u32,
    ply: usize,
    killers: Option<&Killers>,
) {
    for m in moves.iter_mut() {
        if tt_move == Some(m.from_to()) {
            m.key = TRANSREF_BONUS;
            tt_move = None;
            continue;
        }
        if depth > 0 && killers.is_some_and(|k| k.is_killer(ply, m.from_to())) {
            m.key = KILLER_BONUS;
        }
    }

    warn_missing(tt_move, ply);
}

/// Swaps the highest keyed move of `moves[start..]` into `start`. Ties go
/// to the earlier move.
pub fn pick(moves: &mut [Move], start: usize) {
    let mut best_index = start;
    let mut best_key = LOW_KEY;
    for (i, m) in moves.iter().enumerate().skip(start) {
        if m.key > best_key {
            best_key = m.key;
            best_index = i;
        }
    }
    debug_assert!(best_key != LOW_KEY, "pick: no move above the lowest key");
    moves.swap(start, best_index);
}
