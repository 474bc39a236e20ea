//! Engine-backed game review.
//!
//! This crate turns a played game into per-move quality records plus
//! tactical and free-piece events, using an external UCI engine for
//! evaluation and a narrow rules capability for board queries.
//!
//! # Overview
//!
//! - [`UciEngine`] - Exclusive wrapper around one UCI engine process
//! - [`Evaluation`] - Raw engine score (centipawn or mate) with
//!   perspective conversions
//! - [`MoveQuality`] - Six-label move classification from win-probability
//!   drops
//! - [`GameAnalyzer`] - Per-ply orchestration producing a [`GameReport`]
//! - [`detect_opportunity`] / [`detect_free_piece`] - Tactical motif and
//!   hanging-piece detection
//!
//! # Example
//!
//! ```ignore
//! use review_analysis::{GameAnalyzer, ReviewConfig};
//! use review_core::Color;
//!
//! let config = ReviewConfig::load()?;
//! let mut analyzer = GameAnalyzer::new(config);
//! let moves: Vec<String> = ["e4", "e5", "Qh5"].iter().map(|s| s.to_string()).collect();
//! let report = analyzer.analyze_game(&moves, Some(Color::White))?;
//! println!("White accuracy: {:.1}%", report.white_stats.accuracy_percent);
//! ```

pub mod accuracy;
pub mod analyzer;
pub mod config;
pub mod engine;
pub mod evaluation;
pub mod free_piece;
pub mod quality;
pub mod tactics;

pub use accuracy::{aggregate_accuracy, volatilities};
pub use analyzer::{
    AnalyzerError, GameAnalyzer, GameReport, MoveRecord, PlayerStats, PlyError, PlyErrorKind,
};
pub use config::{ClassifyConfig, ConfigError, EngineConfig, ReviewConfig, SearchLimit, TacticsConfig};
pub use engine::{EngineError, LineEvaluation, PositionEvaluation, UciEngine};
pub use evaluation::{centipawn_loss, to_mover_perspective, to_white_perspective, Evaluation};
pub use free_piece::{detect_free_piece, FreePieceEvent};
pub use quality::{classify, cp_to_win_probability, move_accuracy, MoveQuality};
pub use tactics::{detect_opportunity, TacticKind, TacticalOpportunity};
