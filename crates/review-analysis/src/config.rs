//! Configuration for engine search and move classification.
//!
//! All tunables live in one immutable [`ReviewConfig`] value that is passed
//! into the classifier and detectors, keeping those functions pure. The
//! config can be loaded from a TOML file (`review.toml` by default) with
//! per-field defaults for anything omitted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Search limit for one engine evaluation.
///
/// Node-limited search is the default: it bounds compute per position
/// predictably regardless of tactical complexity, so results are more
/// comparable across positions than a fixed ply depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchLimit {
    /// Search a fixed number of nodes.
    Nodes(u64),
    /// Search to a fixed depth in plies.
    Depth(u32),
}

impl SearchLimit {
    /// Renders the limit as the argument portion of a UCI `go` command.
    pub fn to_go_args(self) -> String {
        match self {
            SearchLimit::Nodes(n) => format!("nodes {}", n),
            SearchLimit::Depth(d) => format!("depth {}", d),
        }
    }
}

impl Default for SearchLimit {
    fn default() -> Self {
        SearchLimit::Nodes(300_000)
    }
}

/// Engine process settings, fixed for the lifetime of a session.
///
/// Hash size and thread count are set once at initialization and never
/// changed mid-session; classification depends on the engine producing
/// reproducible scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the UCI engine executable.
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,
    /// Transposition table size in MiB.
    #[serde(default = "default_hash_mb")]
    pub hash_mb: u32,
    /// Search thread count. Kept at 1 for deterministic output.
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Search limit per evaluated position.
    #[serde(default)]
    pub search: SearchLimit,
    /// Budget for one position evaluation, in milliseconds. On expiry the
    /// evaluation resolves with the last partial score observed.
    #[serde(default = "default_position_timeout_ms")]
    pub position_timeout_ms: u64,
    /// Budget for the initial UCI handshake, in milliseconds.
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("stockfish")
}

fn default_hash_mb() -> u32 {
    64
}

fn default_threads() -> u32 {
    1
}

fn default_position_timeout_ms() -> u64 {
    10_000
}

fn default_init_timeout_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            hash_mb: default_hash_mb(),
            threads: default_threads(),
            search: SearchLimit::default(),
            position_timeout_ms: default_position_timeout_ms(),
            init_timeout_ms: default_init_timeout_ms(),
        }
    }
}

/// Classification thresholds and win-probability curve constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Logistic curve steepness for centipawn to win-probability conversion.
    /// Empirically calibrated, not derived from first principles.
    #[serde(default = "default_win_prob_k")]
    pub win_prob_k: f64,
    /// Win-probability drop (percentage points) at which a move becomes an
    /// inaccuracy.
    #[serde(default = "default_inaccuracy_drop")]
    pub inaccuracy_drop: f64,
    /// Drop at which a move becomes a mistake.
    #[serde(default = "default_mistake_drop")]
    pub mistake_drop: f64,
    /// Drop at which a move becomes a blunder.
    #[serde(default = "default_blunder_drop")]
    pub blunder_drop: f64,
    /// Centipawn-loss ceiling for the Excellent display label.
    #[serde(default = "default_excellent_cp")]
    pub excellent_cp: i32,
    /// Cap applied to centipawn loss so one catastrophe does not dominate
    /// aggregate statistics.
    #[serde(default = "default_cp_loss_cap")]
    pub cp_loss_cap: i32,
    /// Sentinel magnitude encoding forced mate.
    #[serde(default = "default_mate_score")]
    pub mate_score: i32,
    /// Scores beyond this magnitude are treated as mate, not centipawns.
    #[serde(default = "default_mate_threshold")]
    pub mate_threshold: i32,
    /// Contestability gate: above this absolute evaluation the position is
    /// considered decided and only blunder-sized drops are classified.
    #[serde(default = "default_decided_cp")]
    pub decided_cp: i32,
}

fn default_win_prob_k() -> f64 {
    0.00368208
}

fn default_inaccuracy_drop() -> f64 {
    5.0
}

fn default_mistake_drop() -> f64 {
    10.0
}

fn default_blunder_drop() -> f64 {
    15.0
}

fn default_excellent_cp() -> i32 {
    20
}

fn default_cp_loss_cap() -> i32 {
    500
}

fn default_mate_score() -> i32 {
    10_000
}

fn default_mate_threshold() -> i32 {
    9_000
}

fn default_decided_cp() -> i32 {
    800
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            win_prob_k: default_win_prob_k(),
            inaccuracy_drop: default_inaccuracy_drop(),
            mistake_drop: default_mistake_drop(),
            blunder_drop: default_blunder_drop(),
            excellent_cp: default_excellent_cp(),
            cp_loss_cap: default_cp_loss_cap(),
            mate_score: default_mate_score(),
            mate_threshold: default_mate_threshold(),
            decided_cp: default_decided_cp(),
        }
    }
}

/// Tactical detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TacticsConfig {
    /// Minimum evaluation gain (centipawns) for a geometric pattern to be
    /// reported as an opportunity at all.
    #[serde(default = "default_min_gain_cp")]
    pub min_gain_cp: i32,
    /// Minimum material value (pawns) for a fork target.
    #[serde(default = "default_min_fork_value")]
    pub min_fork_value: i32,
}

fn default_min_gain_cp() -> i32 {
    150
}

fn default_min_fork_value() -> i32 {
    3
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            min_gain_cp: default_min_gain_cp(),
            min_fork_value: default_min_fork_value(),
        }
    }
}

/// Top-level configuration for a review session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Engine process settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Classification settings.
    #[serde(default)]
    pub classify: ClassifyConfig,
    /// Tactical detection settings.
    #[serde(default)]
    pub tactics: TacticsConfig,
}

impl ReviewConfig {
    /// Loads configuration from a TOML file, or returns defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from `review.toml` in the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("review.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReviewConfig::default();
        assert_eq!(config.engine.threads, 1);
        assert_eq!(config.engine.search, SearchLimit::Nodes(300_000));
        assert_eq!(config.engine.position_timeout_ms, 10_000);
        assert_eq!(config.engine.init_timeout_ms, 30_000);
        assert_eq!(config.classify.cp_loss_cap, 500);
        assert_eq!(config.classify.mate_threshold, 9_000);
        assert_eq!(config.classify.decided_cp, 800);
        assert_eq!(config.tactics.min_gain_cp, 150);
    }

    #[test]
    fn parse_partial_toml() {
        let toml_content = r#"
[engine]
path = "/usr/bin/stockfish"
position_timeout_ms = 5000

[classify]
blunder_drop = 20.0
"#;
        let config: ReviewConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.engine.path, PathBuf::from("/usr/bin/stockfish"));
        assert_eq!(config.engine.position_timeout_ms, 5000);
        assert_eq!(config.engine.hash_mb, 64); // default
        assert_eq!(config.classify.blunder_drop, 20.0);
        assert_eq!(config.classify.mistake_drop, 10.0); // default
    }

    #[test]
    fn parse_search_limit_variants() {
        let nodes: ReviewConfig = toml::from_str("[engine]\nsearch = { nodes = 50000 }").unwrap();
        assert_eq!(nodes.engine.search, SearchLimit::Nodes(50_000));
        assert_eq!(nodes.engine.search.to_go_args(), "nodes 50000");

        let depth: ReviewConfig = toml::from_str("[engine]\nsearch = { depth = 12 }").unwrap();
        assert_eq!(depth.engine.search, SearchLimit::Depth(12));
        assert_eq!(depth.engine.search.to_go_args(), "depth 12");
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let config = ReviewConfig::load_from(Path::new("/nonexistent/review.toml")).unwrap();
        assert_eq!(config.engine.hash_mb, 64);
    }

    #[test]
    fn config_roundtrip() {
        let config = ReviewConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: ReviewConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.classify.win_prob_k, config.classify.win_prob_k);
        assert_eq!(parsed.engine.search, config.engine.search);
    }
}
