//! Perft (performance test) for move generator validation.
//!
//! Perft counts the number of leaf nodes at a given depth, which can be
//! compared against known-correct values to validate the move generator
//! together with make/undo.

use super::{generate_moves, MoveBuffer};
use crate::Position;

/// Counts the number of leaf nodes at the given depth.
///
/// Move lists of successive plies are stacked in `buf` from `start` on.
pub fn perft(position: &mut Position, buf: &mut MoveBuffer, start: usize, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let end = generate_moves(position, buf, start);
    let mut nodes = 0u64;
    for k in start..end {
        let m = buf[k];
        if position.make_move(&m) {
            position.flip();
            nodes += if depth == 1 {
                1
            } else {
                perft(position, buf, end, depth - 1)
            };
            position.unflip();
        }
        position.undo_move(&m);
    }
    buf.clear(start, end);
    nodes
}

/// Perft with divide - shows node count for each legal root move.
/// Useful for debugging to identify which moves have incorrect counts.
pub fn perft_divide(position: &mut Position, depth: u32) -> Vec<(String, u64)> {
    let mut buf = MoveBuffer::new();
    let end = generate_moves(position, &mut buf, 0);
    let mut results = Vec::with_capacity(end);

    for k in 0..end {
        let m = buf[k];
        if position.make_move(&m) {
            position.flip();
            let nodes = if depth > 1 {
                perft(position, &mut buf, end, depth - 1)
            } else {
                1
            };
            position.unflip();
            results.push((m.to_uci(), nodes));
        }
        position.undo_move(&m);
    }

    results.sort_by(|a, b| a.0.cmp(&b.0));
    results
}
