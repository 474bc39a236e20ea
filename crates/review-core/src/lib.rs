//! Board primitives and the rules capability for game review.
//!
//! This crate provides the fundamental chess types consumed by the analysis
//! layer:
//! - [`Piece`] and [`Color`] for piece representation
//! - [`Square`] for board coordinates
//! - [`UciMove`] for move representation
//! - [`Board`] with FEN parsing, move generation, and move application
//! - [`BoardView`] and [`RulesEngine`], the narrow read-only capability the
//!   tactical detectors depend on, with [`StandardRules`] as the reference
//!   implementation

mod board;
mod color;
mod mov;
mod piece;
mod rules;
mod san;
mod square;

pub use board::{Board, FenError, STARTPOS_FEN};
pub use color::Color;
pub use mov::UciMove;
pub use piece::Piece;
pub use rules::{BoardView, RulesEngine, RulesError, StandardRules};
pub use san::SanError;
pub use square::Square;
