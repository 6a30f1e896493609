//! Chess position representation.
//!
//! The board is a 128-slot 0x88 array whose occupied slots hold an index
//! into the piece list. The piece list is split into four fixed ranges:
//!
//! | range  | contents        |
//! |--------|-----------------|
//! | 0..16  | white officers  |
//! | 16..24 | white pawns     |
//! | 32..48 | black officers  |
//! | 48..56 | black pawns     |
//!
//! Each range is filled up to a high-water mark. A captured piece leaves a
//! `None` hole behind, which keeps indices stable so that undo can put the
//! piece back in its old slot. Promotions append to the officer range.
//!
//! Everything make/undo must restore besides the board lives in the per-ply
//! [`PlyFlags`] array: ply `n + 1` is written from ply `n` by `make_move`,
//! so going back a ply is just reading the older slot again.

use chess_core::{Color, FenParser, Piece, Square};
use tracing::warn;

use crate::material::Material;
use crate::zobrist::ZOBRIST;
use crate::{EngineError, MAX_MOVE_FLAGS};

/// Size of the piece list.
pub const PLIST_SIZE: usize = 56;
const OFFICER_SLOTS: u8 = 16;
const PAWN_SLOTS: u8 = 8;

/// Castling rights flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    /// Creates new castling rights from flags.
    #[inline]
    pub const fn new(flags: u8) -> Self {
        CastlingRights(flags & 0b1111)
    }

    /// Returns true if the given side can castle kingside.
    #[inline]
    pub const fn can_castle_kingside(self, color: Color) -> bool {
        let flag = match color {
            Color::White => Self::WHITE_KINGSIDE,
            Color::Black => Self::BLACK_KINGSIDE,
        };
        (self.0 & flag) != 0
    }

    /// Returns true if the given side can castle queenside.
    #[inline]
    pub const fn can_castle_queenside(self, color: Color) -> bool {
        let flag = match color {
            Color::White => Self::WHITE_QUEENSIDE,
            Color::Black => Self::BLACK_QUEENSIDE,
        };
        (self.0 & flag) != 0
    }

    /// Removes castling rights for a color.
    #[inline]
    pub fn remove_color(&mut self, color: Color) {
        let mask = match color {
            Color::White => !(Self::WHITE_KINGSIDE | Self::WHITE_QUEENSIDE),
            Color::Black => !(Self::BLACK_KINGSIDE | Self::BLACK_QUEENSIDE),
        };
        self.0 &= mask;
    }

    /// Rights left after a move touching `from` and `to`.
    ///
    /// Leaving a king square drops both rights of that side; leaving or
    /// arriving on a rook corner drops the right tied to that corner, which
    /// covers both rook moves and rook captures.
    #[inline]
    pub const fn after_move(self, from: Square, to: Square) -> Self {
        CastlingRights(self.0 & Self::keep_mask(from) & Self::keep_mask(to))
    }

    const fn keep_mask(sq: Square) -> u8 {
        match sq.raw() {
            0x04 => !(Self::WHITE_KINGSIDE | Self::WHITE_QUEENSIDE),
            0x07 => !Self::WHITE_KINGSIDE,
            0x00 => !Self::WHITE_QUEENSIDE,
            0x74 => !(Self::BLACK_KINGSIDE | Self::BLACK_QUEENSIDE),
            0x77 => !Self::BLACK_KINGSIDE,
            0x70 => !Self::BLACK_QUEENSIDE,
            _ => 0xff,
        }
    }

    /// Rights held by exactly one of the two; their keys toggle in the hash.
    #[inline]
    pub const fn toggled(self, other: CastlingRights) -> Self {
        CastlingRights(self.0 ^ other.0)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the raw flags.
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// One piece-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceEntry {
    pub piece: Piece,
    pub square: Square,
}

/// State saved per ply.
///
/// `just_deleted` and `last_promoted` are written into the slot of the ply
/// that makes the move and read back by undo at the same ply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlyFlags {
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    /// Plies since the last capture, pawn move or castling-rights change.
    pub reverse: u32,
    pub hash: u64,
    pub pawn_hash: u64,
    pub material: [Material; 2],
    pub king: [Square; 2],
    /// Piece-list slot emptied by the capture made at this ply.
    pub just_deleted: Option<u8>,
    /// Piece-list slot of the pawn that promoted at this ply.
    pub last_promoted: Option<u8>,
}

impl Default for PlyFlags {
    fn default() -> Self {
        PlyFlags {
            castling: CastlingRights::NONE,
            en_passant: None,
            reverse: 0,
            hash: 0,
            pawn_hash: 0,
            material: [Material::default(); 2],
            king: [Square::E1, Square::E8],
            just_deleted: None,
            last_promoted: None,
        }
    }
}

/// Complete chess position state.
#[derive(Debug, Clone)]
pub struct Position {
    pub(crate) board: [Option<u8>; 128],
    pub(crate) plist: [Option<PieceEntry>; PLIST_SIZE],
    /// High-water marks (exclusive) of the officer ranges.
    pub(crate) max_officer: [u8; 2],
    /// High-water marks (exclusive) of the pawn ranges.
    pub(crate) max_pawn: [u8; 2],
    pub(crate) side: Color,
    pub(crate) ply: usize,
    pub(crate) flags: Vec<PlyFlags>,
    pub(crate) fullmove: u32,
}

#[inline]
pub(crate) const fn officer_start(color: Color) -> u8 {
    color.index() as u8 * 32
}

#[inline]
pub(crate) const fn pawn_start(color: Color) -> u8 {
    color.index() as u8 * 32 + 16
}

/// Color owning a piece-list slot.
#[inline]
pub(crate) const fn slot_color(slot: u8) -> Color {
    if slot & 32 != 0 {
        Color::Black
    } else {
        Color::White
    }
}

impl Position {
    fn empty() -> Self {
        Position {
            board: [None; 128],
            plist: [None; PLIST_SIZE],
            max_officer: [officer_start(Color::White), officer_start(Color::Black)],
            max_pawn: [pawn_start(Color::White), pawn_start(Color::Black)],
            side: Color::White,
            ply: 0,
            flags: vec![PlyFlags::default(); MAX_MOVE_FLAGS],
            fullmove: 1,
        }
    }

    /// Creates the standard starting position.
    pub fn startpos() -> Self {
        match Self::from_fen(FenParser::STARTPOS) {
            Ok(position) => position,
            Err(e) => unreachable!("start position rejected: {e}"),
        }
    }

    /// Creates a position from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        Self::from_parsed(&FenParser::parse(fen)?)
    }

    /// Creates a position from already validated FEN fields.
    pub fn from_parsed(parsed: &FenParser) -> Result<Self, EngineError> {
        let mut position = Position::empty();

        for (rank_idx, rank_str) in parsed.piece_placement.split('/').enumerate() {
            let rank = 7 - rank_idx as u8;
            let mut file = 0u8;
            for c in rank_str.chars() {
                if let Some(digit) = c.to_digit(10) {
                    file += digit as u8;
                } else if let Some((piece, color)) = Piece::from_fen_char(c) {
                    if let Some(sq) = Square::from_coords(file, rank) {
                        position.put_piece(piece, color, sq)?;
                    }
                    file += 1;
                }
            }
        }

        for color in Color::ALL {
            if position.officers_of(color).iter().all(|e| e.piece != Piece::King) {
                return Err(EngineError::MissingKing(color));
            }
            let officers = position.max_officer[color.index()] - officer_start(color);
            let pawns = position.max_pawn[color.index()] - pawn_start(color);
            // Promotions append to the officer range.
            if officers + pawns > OFFICER_SLOTS {
                return Err(EngineError::TooManyPieces(color));
            }
        }

        position.side = parsed.side_to_move;
        position.fullmove = parsed.fullmove_number.max(1);

        let mut rights = 0u8;
        for c in parsed.castling.chars() {
            rights |= match c {
                'K' => CastlingRights::WHITE_KINGSIDE,
                'Q' => CastlingRights::WHITE_QUEENSIDE,
                'k' => CastlingRights::BLACK_KINGSIDE,
                'q' => CastlingRights::BLACK_QUEENSIDE,
                _ => 0,
            };
        }
        let castling = position.consistent_castling(CastlingRights::new(rights));

        let en_passant = parsed.en_passant.filter(|ep| {
            let expected_rank = match parsed.side_to_move {
                Color::White => 5,
                Color::Black => 2,
            };
            let ok = ep.rank_index() == expected_rank;
            if !ok {
                warn!(square = %ep, "ignoring en passant square on the wrong rank");
            }
            ok
        });

        let mut flags = PlyFlags {
            castling,
            en_passant,
            reverse: parsed.halfmove_clock,
            ..PlyFlags::default()
        };
        for color in Color::ALL {
            flags.material[color.index()] = position.compute_material(color);
            if let Some(king) = position
                .officers_of(color)
                .into_iter()
                .find(|e| e.piece == Piece::King)
            {
                flags.king[color.index()] = king.square;
            }
        }
        position.flags[0] = flags;
        position.flags[0].hash = position.compute_hash();
        position.flags[0].pawn_hash = position.compute_pawn_hash();

        Ok(position)
    }

    /// Drops castling rights whose king or rook is not on its home square.
    fn consistent_castling(&self, rights: CastlingRights) -> CastlingRights {
        let mut bits = rights.raw();
        let checks = [
            (CastlingRights::WHITE_KINGSIDE, Color::White, Square::E1, Square::H1),
            (CastlingRights::WHITE_QUEENSIDE, Color::White, Square::E1, Square::A1),
            (CastlingRights::BLACK_KINGSIDE, Color::Black, Square::E8, Square::H8),
            (CastlingRights::BLACK_QUEENSIDE, Color::Black, Square::E8, Square::A8),
        ];
        for (flag, color, king, rook) in checks {
            if bits & flag != 0
                && (self.piece_at(king) != Some((Piece::King, color))
                    || self.piece_at(rook) != Some((Piece::Rook, color)))
            {
                warn!(flag, "dropping castling right without king and rook at home");
                bits &= !flag;
            }
        }
        CastlingRights::new(bits)
    }

    fn put_piece(&mut self, piece: Piece, color: Color, sq: Square) -> Result<(), EngineError> {
        let c = color.index();
        let slot = if piece == Piece::Pawn {
            if self.max_pawn[c] >= pawn_start(color) + PAWN_SLOTS {
                return Err(EngineError::TooManyPieces(color));
            }
            self.max_pawn[c] += 1;
            self.max_pawn[c] - 1
        } else {
            if self.max_officer[c] >= officer_start(color) + OFFICER_SLOTS {
                return Err(EngineError::TooManyPieces(color));
            }
            self.max_officer[c] += 1;
            self.max_officer[c] - 1
        };
        self.plist[slot as usize] = Some(PieceEntry { piece, square: sq });
        self.board[sq.index()] = Some(slot);
        Ok(())
    }

    /// Converts the position to a FEN string.
    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let piece = Square::from_coords(file, rank).and_then(|sq| self.piece_at(sq));
                match piece {
                    Some((piece, color)) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
            if rank > 0 {
                placement.push('/');
            }
        }

        let flags = self.flags();
        let mut castling = String::new();
        for (flag, c) in [
            (CastlingRights::WHITE_KINGSIDE, 'K'),
            (CastlingRights::WHITE_QUEENSIDE, 'Q'),
            (CastlingRights::BLACK_KINGSIDE, 'k'),
            (CastlingRights::BLACK_QUEENSIDE, 'q'),
        ] {
            if flags.castling.raw() & flag != 0 {
                castling.push(c);
            }
        }
        if castling.is_empty() {
            castling.push('-');
        }

        FenParser {
            piece_placement: placement,
            side_to_move: self.side,
            castling,
            en_passant: flags.en_passant,
            halfmove_clock: flags.reverse,
            fullmove_number: self.fullmove,
        }
        .to_fen()
    }

    /// Returns the piece and color at the given square, if any.
    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        let slot = self.board[sq.index()]?;
        let entry = self.plist[slot as usize]?;
        Some((entry.piece, slot_color(slot)))
    }

    /// Piece-list slot occupying a square.
    #[inline]
    pub(crate) fn slot_at(&self, sq: Square) -> Option<u8> {
        self.board[sq.index()]
    }

    #[inline]
    pub fn is_empty(&self, sq: Square) -> bool {
        self.board[sq.index()].is_none()
    }

    /// Live officers (king included) of a color, in piece-list order.
    pub fn officers_of(&self, color: Color) -> Vec<PieceEntry> {
        let start = officer_start(color) as usize;
        let end = self.max_officer[color.index()] as usize;
        self.plist[start..end].iter().flatten().copied().collect()
    }

    /// Live pawns of a color, in piece-list order.
    pub fn pawns_of(&self, color: Color) -> Vec<PieceEntry> {
        let start = pawn_start(color) as usize;
        let end = self.max_pawn[color.index()] as usize;
        self.plist[start..end].iter().flatten().copied().collect()
    }

    /// Officer slot range `[start, high-water)` of a color.
    #[inline]
    pub(crate) fn officer_slots(&self, color: Color) -> std::ops::Range<usize> {
        officer_start(color) as usize..self.max_officer[color.index()] as usize
    }

    /// Pawn slot range `[start, high-water)` of a color.
    #[inline]
    pub(crate) fn pawn_slots(&self, color: Color) -> std::ops::Range<usize> {
        pawn_start(color) as usize..self.max_pawn[color.index()] as usize
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side
    }

    /// Current search ply (0 at the root).
    #[inline]
    pub fn ply(&self) -> usize {
        self.ply
    }

    /// Flags of the current ply.
    #[inline]
    pub fn flags(&self) -> &PlyFlags {
        &self.flags[self.ply]
    }

    #[inline]
    pub fn flags_at(&self, ply: usize) -> &PlyFlags {
        &self.flags[ply]
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.flags[self.ply].hash
    }

    #[inline]
    pub fn pawn_hash(&self) -> u64 {
        self.flags[self.ply].pawn_hash
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.flags[self.ply].king[color.index()]
    }

    #[inline]
    pub fn material(&self, color: Color) -> Material {
        self.flags[self.ply].material[color.index()]
    }

    /// Passes the move to the other side one ply deeper.
    #[inline]
    pub fn flip(&mut self) {
        self.ply += 1;
        self.side = self.side.opposite();
    }

    /// Reverts [`flip`](Self::flip).
    #[inline]
    pub fn unflip(&mut self) {
        self.ply -= 1;
        self.side = self.side.opposite();
    }

    /// Recomputes the position key from scratch.
    pub fn compute_hash(&self) -> u64 {
        let flags = self.flags();
        let mut hash = 0;
        for color in Color::ALL {
            for e in self.officers_of(color).iter().chain(&self.pawns_of(color)) {
                hash ^= ZOBRIST.piece_key(e.piece, color, e.square);
            }
        }
        if self.side == Color::Black {
            hash ^= ZOBRIST.black_to_move;
        }
        hash ^= ZOBRIST.castling_key(flags.castling);
        if let Some(ep) = flags.en_passant {
            hash ^= ZOBRIST.en_passant_key(ep);
        }
        hash
    }

    /// Recomputes the pawn structure key from scratch.
    pub fn compute_pawn_hash(&self) -> u64 {
        Color::ALL
            .into_iter()
            .flat_map(|color| {
                self.pawns_of(color)
                    .into_iter()
                    .map(move |e| ZOBRIST.piece_key(Piece::Pawn, color, e.square))
            })
            .fold(0, |acc, key| acc ^ key)
    }

    /// Recomputes a side's material from the piece list.
    pub fn compute_material(&self, color: Color) -> Material {
        let mut material = Material::default();
        for e in self.officers_of(color).iter().chain(&self.pawns_of(color)) {
            material.add(e.piece);
        }
        material
    }

    /// Checks the board/piece-list bijection and every incremental value
    /// against a recomputation. Returns a description of the first mismatch.
    pub fn validate(&self) -> Result<(), String> {
        for sq in Square::all() {
            if let Some(slot) = self.board[sq.index()] {
                match self.plist[slot as usize] {
                    Some(e) if e.square == sq => {}
                    other => return Err(format!("board {sq} points to slot {slot} holding {other:?}")),
                }
            }
        }
        for (slot, entry) in self.plist.iter().enumerate() {
            if let Some(e) = entry {
                if self.board[e.square.index()] != Some(slot as u8) {
                    return Err(format!("slot {slot} ({:?}) not on board", e));
                }
            }
        }
        for color in Color::ALL {
            let king = self.king_square(color);
            if self.piece_at(king) != Some((Piece::King, color)) {
                return Err(format!("{color} king square {king} holds no king"));
            }
            if self.compute_material(color) != self.material(color) {
                return Err(format!("{color} material out of sync"));
            }
        }
        if self.compute_hash() != self.hash() {
            return Err("position key out of sync".to_string());
        }
        if self.compute_pawn_hash() != self.pawn_hash() {
            return Err("pawn key out of sync".to_string());
        }
        Ok(())
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}
