//! Draw detection by repetition and the fifty-move rule.
//!
//! Each side keeps the keys of the positions it had to move in since the
//! last irreversible move. Root moves push onto these lists; the search
//! writes its keys after the root entries, one slot per two plies, and
//! overwrites them freely since they are never read past the current line.

use chess_core::Color;

use crate::MAX_SEARCH_DEPTH;

/// Plies after which the fifty-move rule ends the game.
pub const REPETITION_PLIES: u32 = 100;

/// Entries a list needs to cover the whole reversible window plus a search.
const LIST_SIZE: usize = REPETITION_PLIES as usize / 2 + MAX_SEARCH_DEPTH / 2;

/// Outcome of a repetition check inside the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetition {
    None,
    /// The position occurred before on this line.
    Repeated,
    /// A hundred plies without capture or pawn move.
    FiftyMoves,
}

#[derive(Debug, Clone)]
pub struct RepetitionHistory {
    lists: [Vec<u64>; 2],
    /// Number of root positions stored per side.
    heads: [usize; 2],
}

impl RepetitionHistory {
    pub fn new() -> Self {
        RepetitionHistory {
            lists: [Vec::with_capacity(LIST_SIZE), Vec::with_capacity(LIST_SIZE)],
            heads: [0, 0],
        }
    }

    /// Forgets every stored position, as after an irreversible move.
    pub fn reset(&mut self) {
        self.heads = [0, 0];
        self.lists[0].clear();
        self.lists[1].clear();
    }

    /// Records a root position with `side` to move.
    pub fn push(&mut self, side: Color, hash: u64) {
        let c = side.index();
        self.lists[c].truncate(self.heads[c]);
        self.lists[c].push(hash);
        self.heads[c] += 1;
    }

    /// Drops the last root position recorded for `side`.
    pub fn pop(&mut self, side: Color) {
        let c = side.index();
        self.heads[c] = self.heads[c].saturating_sub(1);
        self.lists[c].truncate(self.heads[c]);
    }

    /// Root positions recorded for `side`, oldest first.
    pub fn root_entries(&self, side: Color) -> &[u64] {
        let c = side.index();
        &self.lists[c][..self.heads[c]]
    }

    /// Search-time check at `ply` with `side` to move.
    ///
    /// Stores `hash` for this ply, then compares it against the earlier
    /// positions of the same side within the reversible window. The entry
    /// one full move back is skipped; it cannot be identical.
    pub fn check(&mut self, side: Color, ply: usize, reverse: u32, hash: u64) -> Repetition {
        if ply == 0 {
            return Repetition::None;
        }
        if reverse >= REPETITION_PLIES {
            return Repetition::FiftyMoves;
        }

        let c = side.index();
        let slot = self.heads[c] + (ply - 1) / 2;
        let list = &mut self.lists[c];
        if list.len() <= slot {
            list.resize(slot + 1, 0);
        }
        list[slot] = hash;

        let entries = (reverse / 2).saturating_sub(1) as usize;
        let earliest = slot.saturating_sub(1 + entries);
        if slot < 1 {
            return Repetition::None;
        }
        if list[earliest..slot - 1].iter().any(|&h| h == hash) {
            Repetition::Repeated
        } else {
            Repetition::None
        }
    }

    /// Threefold repetition of `hash` among the root positions of `side`.
    pub fn threefold(&self, side: Color, hash: u64) -> bool {
        self.root_entries(side).iter().filter(|&&h| h == hash).count() >= 3
    }
}

impl Default for RepetitionHistory {
    fn default() -> Self {
        Self::new()
    }
}
