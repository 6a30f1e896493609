//! Transposition table and pawn structure table.
//!
//! Both are direct-mapped arrays indexed by the low bits of a Zobrist key.
//! A store always overwrites whatever occupies the slot; there is no depth
//! preference and no aging. The full key is kept as a signature so that a
//! probe only answers for the position it was stored for.

use tracing::warn;

use crate::pawns::PawnInfo;
use crate::EngineError;

pub const TT_BITS_MIN: u32 = 10;
pub const TT_BITS_MAX: u32 = 24;
pub const TT_BITS_DEFAULT: u32 = 21;

pub const PAWN_BITS_MIN: u32 = 9;
pub const PAWN_BITS_MAX: u32 = 15;
pub const PAWN_BITS_DEFAULT: u32 = 13;

/// Scores beyond this magnitude are mate scores and carry a ply distance.
pub const MATE_THRESHOLD: i32 = 29800;

/// How a stored score relates to the true value of the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Bound {
    Exact = 1,
    /// The search failed high; the true value is at least the score.
    Lower = 2,
    /// The search failed low; the true value is at most the score.
    Upper = 4,
}

impl Bound {
    /// Whether the stored move is worth trying first away from the root.
    /// Moves stored with a fail-low bound were never proven best.
    #[inline]
    pub const fn move_useful(self) -> bool {
        self as u8 & (Bound::Exact as u8 | Bound::Lower as u8) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TtEntry {
    signature: u64,
    /// Packed from/to of the best or refuting move.
    best: Option<u16>,
    score: i32,
    height: u8,
    bound: Bound,
}

/// Result of a successful transposition table probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtHit {
    pub best: Option<u16>,
    /// Score with mate distances relative to the probing node.
    pub score: i32,
    /// Remaining depth of the search that stored the entry.
    pub height: u32,
    pub bound: Bound,
}

/// Allocates `1 << bits` empty slots, halving on failure down to `min_bits`.
fn allocate<T: Clone>(
    mut bits: u32,
    min_bits: u32,
    what: &str,
) -> Result<(Vec<Option<T>>, u32), EngineError> {
    loop {
        let len = 1usize << bits;
        let mut entries = Vec::new();
        match entries.try_reserve_exact(len) {
            Ok(()) => {
                entries.resize(len, None);
                return Ok((entries, bits));
            }
            Err(_) if bits > min_bits => {
                warn!(bits, "{what} allocation failed, halving");
                bits -= 1;
            }
            Err(_) => return Err(EngineError::TableAllocation { bits }),
        }
    }
}

/// Clamps a requested size; anything out of range reverts to the default.
fn checked_bits(bits: u32, min: u32, max: u32, default: u32, what: &str) -> u32 {
    if (min..=max).contains(&bits) {
        bits
    } else {
        warn!(bits, default, "{what} size out of range, using default");
        default
    }
}

pub struct TranspositionTable {
    entries: Vec<Option<TtEntry>>,
    mask: u64,
    bits: u32,
}

impl TranspositionTable {
    pub fn new(bits: u32) -> Result<Self, EngineError> {
        let bits = checked_bits(
            bits,
            TT_BITS_MIN,
            TT_BITS_MAX,
            TT_BITS_DEFAULT,
            "transposition table",
        );
        let (entries, bits) = allocate(bits, TT_BITS_MIN, "transposition table")?;
        Ok(TranspositionTable {
            entries,
            mask: (1u64 << bits) - 1,
            bits,
        })
    }

    /// Index bits actually allocated.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    /// Stores a search result found at `ply` plies from the root.
    ///
    /// Exact mate scores are converted from distance-to-root into
    /// distance-from-this-node before they are written.
    pub fn store(
        &mut self,
        hash: u64,
        best: Option<u16>,
        score: i32,
        height: u32,
        bound: Bound,
        ply: usize,
    ) {
        let mut score = score;
        if bound == Bound::Exact && score.abs() > MATE_THRESHOLD {
            score += if score > 0 { ply as i32 } else { -(ply as i32) };
        }
        let index = self.index(hash);
        self.entries[index] = Some(TtEntry {
            signature: hash,
            best,
            score,
            height: height.min(u8::MAX as u32) as u8,
            bound,
        });
    }

    /// Looks `hash` up for a node `ply` plies from the root.
    pub fn probe(&self, hash: u64, ply: usize) -> Option<TtHit> {
        let entry = self.entries[self.index(hash)]?;
        if entry.signature != hash {
            return None;
        }
        let mut score = entry.score;
        if entry.bound == Bound::Exact {
            if score > MATE_THRESHOLD {
                score -= ply as i32;
            } else if score < -MATE_THRESHOLD {
                score += ply as i32;
            }
        }
        Some(TtHit {
            best: entry.best,
            score,
            height: entry.height as u32,
            bound: entry.bound,
        })
    }

    pub fn clear(&mut self) {
        self.entries.fill(None);
    }
}

/// Cache of pawn structure evaluations keyed by the pawn-only hash.
pub struct PawnTable {
    entries: Vec<Option<(u64, PawnInfo)>>,
    mask: u64,
    bits: u32,
}

impl PawnTable {
    pub fn new(bits: u32) -> Result<Self, EngineError> {
        let bits = checked_bits(
            bits,
            PAWN_BITS_MIN,
            PAWN_BITS_MAX,
            PAWN_BITS_DEFAULT,
            "pawn table",
        );
        let (entries, bits) = allocate(bits, PAWN_BITS_MIN, "pawn table")?;
        Ok(PawnTable {
            entries,
            mask: (1u64 << bits) - 1,
            bits,
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn probe(&self, pawn_hash: u64) -> Option<PawnInfo> {
        match self.entries[(pawn_hash & self.mask) as usize] {
            Some((signature, info)) if signature == pawn_hash => Some(info),
            _ => None,
        }
    }

    pub fn store(&mut self, pawn_hash: u64, info: PawnInfo) {
        self.entries[(pawn_hash & self.mask) as usize] = Some((pawn_hash, info));
    }

    /// Empties the table. A cleared slot never matches, not even the
    /// all-zero key of a position without pawns.
    pub fn clear(&mut self) {
        self.entries.fill(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATED_AT_5: i32 = -30000 + 5;

    #[test]
    fn out_of_range_sizes_fall_back_to_default() {
        assert_eq!(TranspositionTable::new(40).unwrap().bits(), TT_BITS_DEFAULT);
        assert_eq!(TranspositionTable::new(3).unwrap().bits(), TT_BITS_DEFAULT);
        assert_eq!(TranspositionTable::new(12).unwrap().bits(), 12);
        assert_eq!(PawnTable::new(16).unwrap().bits(), PAWN_BITS_DEFAULT);
        assert_eq!(PawnTable::new(9).unwrap().bits(), 9);
    }

    #[test]
    fn store_and_probe() {
        let mut tt = TranspositionTable::new(12).unwrap();
        tt.store(0xDEAD_BEEF, Some(0x1404), 35, 4, Bound::Lower, 2);
        let hit = tt.probe(0xDEAD_BEEF, 7).unwrap();
        assert_eq!(hit.best, Some(0x1404));
        assert_eq!(hit.score, 35);
        assert_eq!(hit.height, 4);
        assert_eq!(hit.bound, Bound::Lower);
    }

    #[test]
    fn signature_mismatch_misses() {
        let mut tt = TranspositionTable::new(10).unwrap();
        tt.store(5, None, 0, 1, Bound::Exact, 0);
        // Same slot, different key.
        assert!(tt.probe(5 + (1 << 10), 0).is_none());
        assert!(tt.probe(5, 0).is_some());
    }

    #[test]
    fn always_replace() {
        let mut tt = TranspositionTable::new(10).unwrap();
        tt.store(7, None, 10, 9, Bound::Exact, 0);
        tt.store(7 + (1 << 10), None, 20, 1, Bound::Upper, 0);
        assert!(tt.probe(7, 0).is_none());
        assert_eq!(tt.probe(7 + (1 << 10), 0).unwrap().score, 20);
    }

    #[test]
    fn mate_distance_is_relative_to_probing_node() {
        let mut tt = TranspositionTable::new(10).unwrap();
        // Stored 3 plies from the root: mated 2 plies below this node.
        tt.store(1, None, MATED_AT_5, 2, Bound::Exact, 3);
        // Reached again 1 ply from the root: mate is now 3 plies from root.
        assert_eq!(tt.probe(1, 1).unwrap().score, -30000 + 3);

        tt.store(2, None, -MATED_AT_5, 2, Bound::Exact, 3);
        assert_eq!(tt.probe(2, 5).unwrap().score, 30000 - 7);
    }

    #[test]
    fn bounds_keep_mate_scores_unchanged() {
        let mut tt = TranspositionTable::new(10).unwrap();
        tt.store(1, None, MATED_AT_5, 2, Bound::Upper, 3);
        assert_eq!(tt.probe(1, 1).unwrap().score, MATED_AT_5);
    }

    #[test]
    fn clear_empties_table() {
        let mut tt = TranspositionTable::new(10).unwrap();
        tt.store(1, None, 0, 1, Bound::Exact, 0);
        tt.clear();
        assert!(tt.probe(1, 0).is_none());
    }

    #[test]
    fn pawnless_key_does_not_hit_cleared_table() {
        let mut table = PawnTable::new(9).unwrap();
        assert!(table.probe(0).is_none());
        table.store(0, PawnInfo::default());
        assert!(table.probe(0).is_some());
        table.clear();
        assert!(table.probe(0).is_none());
    }

    #[test]
    fn move_usefulness_by_bound() {
        assert!(Bound::Exact.move_useful());
        assert!(Bound::Lower.move_useful());
        assert!(!Bound::Upper.move_useful());
    }
}
