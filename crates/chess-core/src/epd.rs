//! EPD (Extended Position Description) test records.
//!
//! An EPD line is a four-field FEN, optionally followed by the two clocks,
//! followed by `opcode operand;` operations. Only the operations used by
//! test suites are interpreted: `bm` (best moves), `am` (moves to avoid)
//! and `id`.

use crate::{FenError, FenParser};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EpdError {
    #[error(transparent)]
    Fen(#[from] FenError),

    #[error("operation '{0}' has no operand")]
    MissingOperand(String),
}

/// A parsed EPD record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpdRecord {
    pub position: FenParser,
    /// Moves in SAN that solve the position.
    pub best_moves: Vec<String>,
    /// Moves in SAN that must not be played.
    pub avoid_moves: Vec<String>,
    pub id: Option<String>,
}

impl EpdRecord {
    /// Parses one EPD line.
    pub fn parse(line: &str) -> Result<Self, EpdError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(FenError::InvalidPartCount(tokens.len()).into());
        }

        // Clocks are only present when they parse as numbers.
        let mut fen_len = 4;
        while fen_len < 6
            && tokens
                .get(fen_len)
                .is_some_and(|t| t.parse::<u32>().is_ok())
        {
            fen_len += 1;
        }
        let position = FenParser::parse_fields(&tokens[..fen_len])?;

        let mut record = EpdRecord {
            position,
            best_moves: Vec::new(),
            avoid_moves: Vec::new(),
            id: None,
        };

        let operations = tokens[fen_len..].join(" ");
        for op in operations.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (opcode, operand) = match op.split_once(char::is_whitespace) {
                Some((code, rest)) => (code, rest.trim()),
                None => (op, ""),
            };
            match opcode {
                "bm" | "am" | "id" if operand.is_empty() => {
                    return Err(EpdError::MissingOperand(opcode.to_string()));
                }
                "bm" => record
                    .best_moves
                    .extend(operand.split_whitespace().map(str::to_string)),
                "am" => record
                    .avoid_moves
                    .extend(operand.split_whitespace().map(str::to_string)),
                "id" => record.id = Some(operand.trim_matches('"').to_string()),
                _ => {}
            }
        }

        Ok(record)
    }

    /// The position as a full six-field FEN string.
    pub fn fen(&self) -> String {
        self.position.to_fen()
    }
}

/// Strips capture, check, mate and promotion decorations from a SAN move.
pub fn strip_san(san: &str) -> String {
    san.chars()
        .filter(|c| !matches!(c, 'x' | '+' | '#' | '='))
        .collect()
}
