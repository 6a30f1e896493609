//! Engine configuration.
//!
//! Configuration is read from TOML. Every field is optional and falls back
//! to the built-in default, so an empty file is a valid configuration:
//!
//! ```toml
//! tt_bits = 20
//! max_depth = 12
//!
//! [options]
//! null_move = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::tt::{PAWN_BITS_DEFAULT, TT_BITS_DEFAULT};
use crate::MAX_SEARCH_DEPTH;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Search heuristics that can be switched on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineOptions {
    /// Probe and store the transposition table.
    #[serde(default = "enabled")]
    pub transref: bool,
    /// Always run the full evaluation, never the lazy material cutoff.
    #[serde(default)]
    pub full_eval: bool,
    #[serde(default = "enabled")]
    pub killers: bool,
    #[serde(default = "enabled")]
    pub null_move: bool,
    /// Think on the opponent's time after a search.
    #[serde(default = "enabled")]
    pub ponder: bool,
    /// Log every finished iteration.
    #[serde(default = "enabled")]
    pub post: bool,
}

fn enabled() -> bool {
    true
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            transref: true,
            full_eval: false,
            killers: true,
            null_move: true,
            ponder: true,
            post: true,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Transposition table size as a power of two.
    #[serde(default = "default_tt_bits")]
    pub tt_bits: u32,
    /// Pawn hash table size as a power of two.
    #[serde(default = "default_pawn_bits")]
    pub pawn_bits: u32,
    /// Default iteration limit when a search names none.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Nodes between two checks of the clock and the stop flag.
    #[serde(default = "default_node_check_interval")]
    pub node_check_interval: u64,
    #[serde(default)]
    pub options: EngineOptions,
}

fn default_tt_bits() -> u32 {
    TT_BITS_DEFAULT
}

fn default_pawn_bits() -> u32 {
    PAWN_BITS_DEFAULT
}

fn default_max_depth() -> usize {
    MAX_SEARCH_DEPTH / 2
}

fn default_node_check_interval() -> u64 {
    4096
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tt_bits: default_tt_bits(),
            pawn_bits: default_pawn_bits(),
            max_depth: default_max_depth(),
            node_check_interval: default_node_check_interval(),
            options: EngineOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Iteration limit clamped to what the per-ply arrays can hold.
    pub fn depth_limit(&self) -> usize {
        self.max_depth.clamp(1, MAX_SEARCH_DEPTH - 2)
    }
}
