use chess_core::{Move, Square};

use crate::MAX_SEARCH_DEPTH;

/// Triangular principal variation: line `p` holds the best continuation
/// found so far from ply `p` on.
#[derive(Debug, Clone)]
pub struct PvTable {
    lines: Vec<Vec<Move>>,
}

impl PvTable {
    pub fn new() -> Self {
        PvTable {
            lines: vec![Vec::with_capacity(MAX_SEARCH_DEPTH); MAX_SEARCH_DEPTH + 1],
        }
    }

    /// Best line from `ply` on.
    pub fn line(&self, ply: usize) -> &[Move] {
        &self.lines[ply]
    }

    /// Makes `m` followed by the line one ply deeper the line at `ply`.
    pub fn update(&mut self, ply: usize, m: Move) {
        let (head, tail) = self.lines.split_at_mut(ply + 1);
        let line = &mut head[ply];
        line.clear();
        line.push(m);
        if let Some(rest) = tail.first() {
            line.extend_from_slice(rest);
        }
    }

    /// Ends the line at `ply`: nothing better than a leaf score was found.
    pub fn cut(&mut self, ply: usize) {
        self.lines[ply].clear();
    }

    /// Replaces the line at `ply` with an unresolved table move.
    pub fn update_from_hash(&mut self, ply: usize, from_to: u16) {
        let line = &mut self.lines[ply];
        line.clear();
        if let Some(m) = unpack(from_to) {
            line.push(m);
        }
    }

    /// Empties every line from `ply` on.
    pub fn clear_from(&mut self, ply: usize) {
        for line in &mut self.lines[ply..] {
            line.clear();
        }
    }

    /// Root line reduced to a single move, as after an aborted re-search.
    pub fn set_root(&mut self, m: Move) {
        self.clear_from(0);
        self.lines[0].push(m);
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuilds a move from its packed squares.
pub(crate) fn unpack(from_to: u16) -> Option<Move> {
    let from = Square::from_raw((from_to & 0xff) as u8)?;
    let to = Square::from_raw((from_to >> 8) as u8)?;
    Some(Move::hash_move(from, to))
}
