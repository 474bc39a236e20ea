//! Move representation in UCI coordinate form.

use crate::{Piece, Square};
use std::fmt;

/// A move in coordinate notation: source square, destination square, and an
/// optional promotion piece.
///
/// This is the wire form used by UCI engines ("e2e4", "e7e8q") and the
/// common currency between the engine layer and the rules capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
}

impl UciMove {
    /// Creates a move without promotion.
    pub const fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// Parses a UCI move string like "e2e4" or "e7e8q".
    pub fn from_uci(s: &str) -> Option<Self> {
        if s.len() != 4 && s.len() != 5 {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let promotion = match s.as_bytes().get(4) {
            None => None,
            Some(b'q') => Some(Piece::Queen),
            Some(b'r') => Some(Piece::Rook),
            Some(b'b') => Some(Piece::Bishop),
            Some(b'n') => Some(Piece::Knight),
            Some(_) => return None,
        };
        Some(Self {
            from,
            to,
            promotion,
        })
    }

    /// Returns the UCI string form.
    pub fn to_uci(self) -> String {
        let promo = match self.promotion {
            Some(Piece::Queen) => "q",
            Some(Piece::Rook) => "r",
            Some(Piece::Bishop) => "b",
            Some(Piece::Knight) => "n",
            _ => "",
        };
        format!("{}{}{}", self.from, self.to, promo)
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}
