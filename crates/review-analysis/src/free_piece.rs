//! Hanging-piece detection with one-ply recapture lookahead.
//!
//! A piece is "free" when some capture wins it outright: either the
//! cheapest attacker costs no more than the target, or any recapture still
//! leaves the exchange net-favorable. The one-ply lookahead is what keeps
//! defended pieces from being flagged as free.

use review_core::{BoardView, Color, Piece, RulesEngine, Square, UciMove};
use serde::{Deserialize, Serialize};

/// An opponent piece left hanging on one ply, and whether the tracked
/// player took it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreePieceEvent {
    /// Ply number (1-based) of the opponent move that left the piece free.
    pub ply: usize,
    /// The tracked player who could capture.
    pub player_color: Color,
    /// The hanging piece.
    pub opponent_piece: Piece,
    /// Square of the hanging piece.
    pub piece_square: String,
    /// Material value of the hanging piece, in pawns.
    pub piece_value: i32,
    /// True iff the played reply captured on that square.
    pub was_captured: bool,
    /// A capturing move that wins the piece (UCI).
    pub best_capture_move: Option<String>,
    /// The reply actually played (UCI), if the game continued.
    pub played_move: Option<String>,
    /// Squares of every free piece in the position, primary first.
    pub all_free_pieces: Vec<String>,
    /// Position after the opponent's move, for replay.
    pub fen: String,
}

struct FreePiece {
    square: Square,
    piece: Piece,
    capture: UciMove,
}

/// Detects hanging opponent pieces in the position after an opponent move,
/// with the tracked player to move.
///
/// `alternatives` are engine-suggested moves (UCI) for the position; when
/// one of them captures the primary piece it is preferred as the reported
/// capture move. Kings are never reported.
pub fn detect_free_piece<R: RulesEngine>(
    rules: &R,
    board: &R::Board,
    played_reply: Option<UciMove>,
    alternatives: &[String],
    player_color: Color,
    ply: usize,
    fen: &str,
) -> Option<FreePieceEvent> {
    if board.side_to_move() != player_color {
        return None;
    }
    let opponent = player_color.opposite();

    let mut free: Vec<FreePiece> = Vec::new();
    for sq in Square::all() {
        let Some((piece, color)) = board.piece_at(sq) else {
            continue;
        };
        if color != opponent || piece == Piece::King || piece.value() < Piece::Pawn.value() {
            continue;
        }
        if let Some(capture) = winning_capture(rules, board, sq, piece, player_color) {
            free.push(FreePiece {
                square: sq,
                piece,
                capture,
            });
        }
    }

    // The highest-value free piece is the primary report.
    free.sort_by(|a, b| b.piece.value().cmp(&a.piece.value()));
    let primary = free.first()?;

    let was_captured = match played_reply {
        Some(reply) => reply.to == primary.square && board.is_capture(reply),
        None => false,
    };

    let best_capture_move = alternatives
        .iter()
        .filter_map(|uci| UciMove::from_uci(uci))
        .find(|mv| mv.to == primary.square && board.is_capture(*mv))
        .unwrap_or(primary.capture)
        .to_uci();

    Some(FreePieceEvent {
        ply,
        player_color,
        opponent_piece: primary.piece,
        piece_square: primary.square.to_algebraic(),
        piece_value: primary.piece.value(),
        was_captured,
        best_capture_move: Some(best_capture_move),
        played_move: played_reply.map(UciMove::to_uci),
        all_free_pieces: free.iter().map(|f| f.square.to_algebraic()).collect(),
        fen: fen.to_string(),
    })
}

/// Finds a capture of the piece on `target_sq` that wins material, trying
/// the cheapest attacker first.
fn winning_capture<R: RulesEngine>(
    rules: &R,
    board: &R::Board,
    target_sq: Square,
    target: Piece,
    player_color: Color,
) -> Option<UciMove> {
    let mut captures: Vec<(i32, UciMove)> = Vec::new();
    for from in Square::all() {
        let Some((attacker, color)) = board.piece_at(from) else {
            continue;
        };
        if color != player_color {
            continue;
        }
        for mv in board.legal_moves_from(from) {
            if mv.to == target_sq {
                // A king's capture is only legal when unprotected anyway;
                // rank it above even exchanges.
                let cost = if attacker == Piece::King {
                    0
                } else {
                    attacker.value()
                };
                captures.push((cost, mv));
            }
        }
    }
    captures.sort_by_key(|(cost, _)| *cost);

    for (cost, mv) in captures {
        let after = match rules.apply(board, mv) {
            Ok(after) => after,
            Err(_) => continue,
        };
        let recapturable = can_recapture(&after, target_sq, player_color.opposite());
        // Free when nothing recaptures, or the exchange stays ahead.
        if !recapturable || target.value() > cost {
            return Some(mv);
        }
    }
    None
}

/// One-ply lookahead: does the opponent have a legal recapture on `sq`?
fn can_recapture<B: BoardView>(board: &B, sq: Square, opponent: Color) -> bool {
    Square::all()
        .filter(|&from| matches!(board.piece_at(from), Some((_, c)) if c == opponent))
        .any(|from| board.legal_moves_from(from).iter().any(|mv| mv.to == sq))
}
