//! Standard algebraic notation resolution against a board.

use crate::{Board, Piece, UciMove};
use thiserror::Error;

/// Errors produced while resolving a SAN move.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanError {
    /// The SAN string could not be parsed.
    #[error("Malformed SAN move: {0}")]
    Malformed(String),
    /// No legal move matches the SAN string in this position.
    #[error("No legal move matches SAN: {0}")]
    NoMatch(String),
    /// More than one legal move matches the SAN string.
    #[error("Ambiguous SAN move: {0} ({1} candidates)")]
    Ambiguous(String, usize),
}

/// Resolves a SAN move like "Nf3", "exd5", or "O-O" to a [`UciMove`] that is
/// legal for the side to move.
pub fn resolve_san(board: &Board, san: &str) -> Result<UciMove, SanError> {
    let clean = san.trim_end_matches(['+', '#', '!', '?']);
    if clean.is_empty() {
        return Err(SanError::Malformed(san.to_string()));
    }

    let legal = board.legal_moves();
    let side = board.side_to_move();

    if clean == "O-O" || clean == "0-0" || clean == "O-O-O" || clean == "0-0-0" {
        let kingside = clean == "O-O" || clean == "0-0";
        let target_file = if kingside { 6 } else { 2 };
        return legal
            .iter()
            .copied()
            .find(|m| {
                board.piece_at(m.from) == Some((Piece::King, side))
                    && m.from.file() == 4
                    && m.to.file() == target_file
            })
            .ok_or_else(|| SanError::NoMatch(san.to_string()));
    }

    let (piece, rest) = match clean.chars().next() {
        Some(c) if c.is_ascii_uppercase() => {
            let p = Piece::from_san_char(c).ok_or_else(|| SanError::Malformed(san.to_string()))?;
            (p, &clean[1..])
        }
        _ => (Piece::Pawn, clean),
    };

    let (rest, promotion) = match rest.find('=') {
        Some(eq) => {
            let promo = rest[eq + 1..]
                .chars()
                .next()
                .and_then(Piece::from_san_char)
                .ok_or_else(|| SanError::Malformed(san.to_string()))?;
            (&rest[..eq], Some(promo))
        }
        None => (rest, None),
    };

    let rest = rest.replace('x', "");
    if rest.len() < 2 {
        return Err(SanError::Malformed(san.to_string()));
    }
    let (disambig, dest_str) = rest.split_at(rest.len() - 2);
    let dest = crate::Square::from_algebraic(dest_str)
        .ok_or_else(|| SanError::Malformed(san.to_string()))?;

    let mut candidates: Vec<UciMove> = legal
        .into_iter()
        .filter(|m| {
            m.to == dest
                && board.piece_at(m.from) == Some((piece, side))
                && m.promotion == promotion
        })
        .collect();

    if candidates.len() > 1 && !disambig.is_empty() {
        candidates.retain(|m| {
            disambig.chars().all(|c| match c {
                'a'..='h' => m.from.file() == c as u8 - b'a',
                '1'..='8' => m.from.rank() == c as u8 - b'1',
                _ => false,
            })
        });
    }

    match candidates.len() {
        1 => Ok(candidates[0]),
        0 => Err(SanError::NoMatch(san.to_string())),
        n => Err(SanError::Ambiguous(san.to_string(), n)),
    }
}
