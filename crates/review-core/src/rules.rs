//! The narrow rules capability consumed by the analysis layer.
//!
//! The tactical detectors only need read-only board queries, and the
//! orchestrator only needs FEN construction, SAN resolution, and move
//! application. Both are expressed as traits so any conforming rules
//! implementation can back them; [`StandardRules`] is the built-in one.

use crate::{Board, Color, FenError, Piece, SanError, Square, UciMove};
use thiserror::Error;

/// Errors surfaced by a rules implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    /// The position string could not be parsed.
    #[error(transparent)]
    Fen(#[from] FenError),
    /// The SAN move could not be resolved to a legal move.
    #[error(transparent)]
    San(#[from] SanError),
    /// The move is not legal in the given position.
    #[error("Illegal move: {0}")]
    IllegalMove(String),
}

/// Read-only board queries needed by the tactical and free-piece detectors.
pub trait BoardView {
    /// Returns the piece and color on a square.
    fn piece_at(&self, sq: Square) -> Option<(Piece, Color)>;

    /// Returns the side to move.
    fn side_to_move(&self) -> Color;

    /// Returns every square attacked by the piece on `sq`. Sliding attacks
    /// include the first blocker of either color.
    fn attacks_from(&self, sq: Square) -> Vec<Square>;

    /// Returns the legal moves for the piece on `sq`.
    fn legal_moves_from(&self, sq: Square) -> Vec<UciMove>;

    /// Returns true if `mv` captures a piece (including en passant).
    fn is_capture(&self, mv: UciMove) -> bool;

    /// Returns true if any piece of `by` attacks `sq`.
    fn is_square_attacked(&self, sq: Square, by: Color) -> bool;
}

/// The rules capability: position construction and move application on top
/// of [`BoardView`] queries.
pub trait RulesEngine {
    type Board: BoardView + Clone;

    /// Builds a board from a FEN string.
    fn board_from_fen(&self, fen: &str) -> Result<Self::Board, RulesError>;

    /// Serializes a board back to FEN.
    fn to_fen(&self, board: &Self::Board) -> String;

    /// Resolves a SAN move against a position.
    fn resolve_san(&self, board: &Self::Board, san: &str) -> Result<UciMove, RulesError>;

    /// Applies a legal move, returning the resulting position.
    fn apply(&self, board: &Self::Board, mv: UciMove) -> Result<Self::Board, RulesError>;
}

impl BoardView for Board {
    fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        Board::piece_at(self, sq)
    }

    fn side_to_move(&self) -> Color {
        Board::side_to_move(self)
    }

    fn attacks_from(&self, sq: Square) -> Vec<Square> {
        Board::attacks_from(self, sq)
    }

    fn legal_moves_from(&self, sq: Square) -> Vec<UciMove> {
        Board::legal_moves_from(self, sq)
    }

    fn is_capture(&self, mv: UciMove) -> bool {
        Board::is_capture(self, mv)
    }

    fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        Board::is_square_attacked(self, sq, by)
    }
}

/// The built-in rules implementation backed by [`Board`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl RulesEngine for StandardRules {
    type Board = Board;

    fn board_from_fen(&self, fen: &str) -> Result<Board, RulesError> {
        Ok(Board::from_fen(fen)?)
    }

    fn to_fen(&self, board: &Board) -> String {
        board.to_fen()
    }

    fn resolve_san(&self, board: &Board, san: &str) -> Result<UciMove, RulesError> {
        Ok(crate::san::resolve_san(board, san)?)
    }

    fn apply(&self, board: &Board, mv: UciMove) -> Result<Board, RulesError> {
        if !board.legal_moves_from(mv.from).contains(&mv) {
            return Err(RulesError::IllegalMove(mv.to_uci()));
        }
        board
            .apply(mv)
            .ok_or_else(|| RulesError::IllegalMove(mv.to_uci()))
    }
}
