//! Standard Algebraic Notation (SAN) parsing and generation.
//!
//! Parsing accepts the decorated forms ("Nbxd2+", "e8=Q#") as well as the
//! stripped forms found in test suites ("Nbd2", "e8Q", "ed5").
//! Examples: "e4", "Nf3", "Bxc6", "O-O", "e8=Q", "Nbd2", "R1e1"

use chess_core::{strip_san, Move, Piece, Special, Square};
use thiserror::Error;

use crate::movegen::{legal_moves, MoveBuffer};
use crate::Position;

/// Error type for SAN parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanError {
    #[error("empty SAN string")]
    Empty,

    #[error("invalid SAN format: {0}")]
    InvalidFormat(String),

    #[error("no legal move matches: {0}")]
    NoMatchingMove(String),

    #[error("ambiguous move: {0}")]
    AmbiguousMove(String),
}

/// Converts a legal move to SAN. `pos` is the position before the move and
/// is left unchanged.
pub fn move_to_san(pos: &mut Position, m: &Move) -> String {
    let mut buf = MoveBuffer::new();
    let legal = legal_moves(pos, &mut buf, 0);

    let mut san = String::new();
    if m.special() == Special::Castling {
        san.push_str(if m.to().file_index() == 6 { "O-O" } else { "O-O-O" });
        return add_check_suffix(pos, &mut buf, m, san);
    }

    let from = m.from();
    let to = m.to();
    let piece = pos.piece_at(from).map_or(Piece::Pawn, |(p, _)| p);
    let is_capture = m.captured().is_some() || m.special() == Special::EnPassant;

    if piece != Piece::Pawn {
        san.push(piece_to_san_char(piece));
        san.push_str(&disambiguation(pos, &legal, m, piece));
    }
    if is_capture {
        if piece == Piece::Pawn {
            san.push(file_char(from));
        }
        san.push('x');
    }
    san.push_str(&to.to_algebraic());
    if let Some(promoted) = m.promoted() {
        san.push('=');
        san.push(piece_to_san_char(promoted));
    }

    add_check_suffix(pos, &mut buf, m, san)
}

/// Formats a line of moves played from `pos`. Stops at the first move that
/// is not legal in the position it is played in.
pub fn line_to_san(pos: &Position, line: &[Move]) -> Vec<String> {
    let mut pos = pos.clone();
    let mut buf = MoveBuffer::new();
    let mut out = Vec::with_capacity(line.len());
    for m in line {
        let mut m = *m;
        if !pos.verify_move(&mut buf, 0, &mut m) {
            break;
        }
        out.push(move_to_san(&mut pos, &m));
        if !pos.make_move(&m) {
            break;
        }
        pos.flip();
    }
    out
}

/// Parses a SAN string into the matching legal move.
pub fn parse_san(pos: &mut Position, san: &str) -> Result<Move, SanError> {
    let san = san.trim().trim_end_matches(['!', '?']);
    if san.is_empty() {
        return Err(SanError::Empty);
    }

    let mut buf = MoveBuffer::new();
    let legal = legal_moves(pos, &mut buf, 0);

    let castling = match san.trim_end_matches(['+', '#']) {
        "O-O" | "0-0" => Some(6),
        "O-O-O" | "0-0-0" => Some(2),
        _ => None,
    };
    if let Some(file) = castling {
        return legal
            .into_iter()
            .find(|m| m.special() == Special::Castling && m.to().file_index() == file)
            .ok_or_else(|| SanError::NoMatchingMove(san.to_string()));
    }

    let parsed = parse_components(&strip_san(san))?;
    let matching: Vec<Move> = legal
        .into_iter()
        .filter(|m| parsed.matches(pos, m))
        .collect();

    match matching.as_slice() {
        [] => Err(SanError::NoMatchingMove(san.to_string())),
        [m] => Ok(*m),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

/// Parsed components of a SAN string.
#[derive(Debug)]
struct ParsedSan {
    piece: Piece,
    from_file: Option<u8>,
    from_rank: Option<u8>,
    to: Square,
    promotion: Option<Piece>,
}

impl ParsedSan {
    fn matches(&self, pos: &Position, m: &Move) -> bool {
        m.to() == self.to
            && pos.piece_at(m.from()).is_some_and(|(p, _)| p == self.piece)
            && self.from_file.map_or(true, |f| m.from().file_index() == f)
            && self.from_rank.map_or(true, |r| m.from().rank_index() == r)
            && m.promoted() == self.promotion
    }
}

/// Splits an undecorated SAN move into piece, origin hints, target square
/// and promotion piece.
fn parse_components(san: &str) -> Result<ParsedSan, SanError> {
    let invalid = || SanError::InvalidFormat(san.to_string());
    let mut chars: Vec<char> = san.chars().collect();

    let piece = match chars.first() {
        Some(&c) if c.is_ascii_uppercase() => {
            chars.remove(0);
            san_char_to_piece(c).ok_or_else(invalid)?
        }
        Some(_) => Piece::Pawn,
        None => return Err(SanError::Empty),
    };

    let promotion = match chars.last() {
        Some(&c) if c.is_ascii_uppercase() => {
            chars.pop();
            match san_char_to_piece(c) {
                Some(p) if Piece::PROMOTIONS.contains(&p) => Some(p),
                _ => return Err(invalid()),
            }
        }
        _ => None,
    };

    if chars.len() < 2 || chars.len() > 4 {
        return Err(invalid());
    }
    let (hint, target) = chars.split_at(chars.len() - 2);
    let target: String = target.iter().collect();
    let to = Square::from_algebraic(&target).ok_or_else(invalid)?;

    let mut from_file = None;
    let mut from_rank = None;
    for &c in hint {
        match c {
            'a'..='h' if from_file.is_none() && from_rank.is_none() => {
                from_file = Some(c as u8 - b'a');
            }
            '1'..='8' if from_rank.is_none() => from_rank = Some(c as u8 - b'1'),
            _ => return Err(invalid()),
        }
    }

    Ok(ParsedSan {
        piece,
        from_file,
        from_rank,
        to,
        promotion,
    })
}

/// Origin hint needed to tell `m` apart from other legal moves of the same
/// piece kind to the same square.
fn disambiguation(pos: &Position, legal: &[Move], m: &Move, piece: Piece) -> String {
    let from = m.from();
    let rivals: Vec<&Move> = legal
        .iter()
        .filter(|o| {
            o.to() == m.to()
                && o.from() != from
                && pos.piece_at(o.from()).is_some_and(|(p, _)| p == piece)
        })
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|o| o.from().file_index() != from.file_index()) {
        file_char(from).to_string()
    } else if rivals.iter().all(|o| o.from().rank_index() != from.rank_index()) {
        rank_char(from).to_string()
    } else {
        from.to_algebraic()
    }
}

fn add_check_suffix(pos: &mut Position, buf: &mut MoveBuffer, m: &Move, mut san: String) -> String {
    if pos.make_move(m) {
        pos.flip();
        let them = pos.side_to_move();
        if pos.in_check(them) {
            let mate = legal_moves(pos, buf, 0).is_empty();
            san.push(if mate { '#' } else { '+' });
        }
        pos.unflip();
    }
    pos.undo_move(m);
    san
}

fn piece_to_san_char(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn san_char_to_piece(c: char) -> Option<Piece> {
    match c {
        'N' => Some(Piece::Knight),
        'B' => Some(Piece::Bishop),
        'R' => Some(Piece::Rook),
        'Q' => Some(Piece::Queen),
        'K' => Some(Piece::King),
        'P' => Some(Piece::Pawn),
        _ => None,
    }
}

fn file_char(sq: Square) -> char {
    (b'a' + sq.file_index()) as char
}

fn rank_char(sq: Square) -> char {
    (b'1' + sq.rank_index()) as char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn san_of(fen: &str, uci: &str) -> String {
        let mut pos = Position::from_fen(fen).unwrap();
        let mut m = Move::from_uci(uci).unwrap();
        let mut buf = MoveBuffer::new();
        assert!(pos.verify_move(&mut buf, 0, &mut m), "{uci} illegal");
        move_to_san(&mut pos, &m)
    }

    fn parse(fen: &str, san: &str) -> Result<String, SanError> {
        let mut pos = Position::from_fen(fen).unwrap();
        parse_san(&mut pos, san).map(|m| m.to_uci())
    }

    #[test]
    fn line_is_formatted_move_by_move() {
        let pos = Position::startpos();
        let line: Vec<Move> = ["e2e4", "e7e5", "g1f3", "b8c6", "e1e2"]
            .iter()
            .filter_map(|m| Move::from_uci(m))
            .collect();
        assert_eq!(line_to_san(&pos, &line), ["e4", "e5", "Nf3", "Nc6", "Ke2"]);
        let bad: Vec<Move> = ["e2e4", "e2e4"].iter().filter_map(|m| Move::from_uci(m)).collect();
        assert_eq!(line_to_san(&pos, &bad), ["e4"]);
    }

    #[test]
    fn san_pawn_push() {
        assert_eq!(san_of(chess_core::FenParser::STARTPOS, "e2e4"), "e4");
    }

    #[test]
    fn san_knight_move() {
        assert_eq!(san_of(chess_core::FenParser::STARTPOS, "g1f3"), "Nf3");
    }

    #[test]
    fn san_pawn_capture() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2";
        assert_eq!(san_of(fen, "e4d5"), "exd5");
    }

    #[test]
    fn san_castling() {
        let fen = "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1";
        assert_eq!(san_of(fen, "e1g1"), "O-O");
        assert_eq!(san_of(fen, "e1c1"), "O-O-O");
    }

    #[test]
    fn san_promotion() {
        assert_eq!(san_of("8/P7/8/8/8/8/8/4K1k1 w - - 0 1", "a7a8q"), "a8=Q");
        assert_eq!(san_of("8/P7/8/8/8/8/8/4K1k1 w - - 0 1", "a7a8n"), "a8=N");
    }

    #[test]
    fn san_disambiguation() {
        assert_eq!(san_of("8/8/8/8/8/8/8/1N1K1N1k w - - 0 1", "b1d2"), "Nbd2");
        assert_eq!(san_of("7k/8/8/R7/8/8/8/R3K3 w - - 0 1", "a1a3"), "R1a3");
        assert_eq!(
            san_of("k7/8/8/8/8/2Q1Q3/8/2Q1K3 w - - 0 1", "c3d2"),
            "Qc3d2"
        );
    }

    #[test]
    fn san_check_and_mate() {
        assert_eq!(san_of("8/8/8/8/8/8/8/4K1Qk w - - 0 1", "g1h2"), "Qh2+");
        assert_eq!(san_of("6k1/5ppp/8/8/8/8/8/R3K3 w Q - 0 1", "a1a8"), "Ra8#");
    }

    #[test]
    fn parse_decorated_and_stripped() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2";
        assert_eq!(parse(fen, "exd5").unwrap(), "e4d5");
        assert_eq!(parse(fen, "ed5").unwrap(), "e4d5");
        assert_eq!(parse(fen, "Nf3!").unwrap(), "g1f3");
        assert_eq!(parse("8/P7/8/8/8/8/8/4K1k1 w - - 0 1", "a8=Q+").unwrap(), "a7a8q");
        assert_eq!(parse("8/P7/8/8/8/8/8/4K1k1 w - - 0 1", "a8R").unwrap(), "a7a8r");
    }

    #[test]
    fn parse_castling() {
        let fen = "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R b KQkq - 0 1";
        assert_eq!(parse(fen, "O-O").unwrap(), "e8g8");
        assert_eq!(parse(fen, "0-0-0").unwrap(), "e8c8");
    }

    #[test]
    fn parse_rejects_bad_input() {
        let start = chess_core::FenParser::STARTPOS;
        assert_eq!(parse(start, ""), Err(SanError::Empty));
        assert!(matches!(parse(start, "Ke4"), Err(SanError::NoMatchingMove(_))));
        assert!(matches!(parse(start, "xyz"), Err(SanError::InvalidFormat(_))));
        assert!(matches!(parse(start, "O-O"), Err(SanError::NoMatchingMove(_))));
        // Promotion without a piece matches nothing.
        assert!(parse("8/P7/8/8/8/8/8/4K1k1 w - - 0 1", "a8").is_err());
        assert!(matches!(
            parse("8/8/8/8/8/8/8/1N1K1N1k w - - 0 1", "Nd2"),
            Err(SanError::AmbiguousMove(_))
        ));
    }

    #[test]
    fn san_roundtrip() {
        // Castling, en passant, promotions with and without capture.
        let fen = "r3k2r/pPp2ppp/2n2n2/3pP3/1b6/2NP1N2/P1P2PPP/R1BQK2R w KQkq d6 0 8";
        let mut pos = Position::from_fen(fen).unwrap();
        let before = pos.to_fen();
        let mut buf = MoveBuffer::new();
        let moves = legal_moves(&mut pos, &mut buf, 0);
        let sans: Vec<String> = moves.iter().map(|m| move_to_san(&mut pos, m)).collect();
        for expected in ["O-O", "exd6", "bxa8=N", "b8=N", "exf6"] {
            assert!(sans.iter().any(|s| s == expected), "{expected} missing from {sans:?}");
        }
        for m in moves {
            let san = move_to_san(&mut pos, &m);
            let parsed = parse_san(&mut pos, &san).unwrap();
            assert_eq!(m, parsed, "roundtrip failed for {san}");
        }
        assert_eq!(pos.to_fen(), before);
    }
}
