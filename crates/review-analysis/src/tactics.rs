//! Tactical motif detection: forks, pins, skewers, discovered attacks.
//!
//! Detection is geometric only: it consumes the position and the engine's
//! already-computed best move, and never runs additional search. The board
//! is reached through the narrow [`BoardView`] capability, so any rules
//! implementation can back it.

use crate::config::TacticsConfig;
use review_core::{BoardView, Color, Piece, RulesEngine, Square, UciMove};
use serde::{Deserialize, Serialize};

/// The recognized tactical motifs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TacticKind {
    Fork,
    Pin,
    Skewer,
    DiscoveredAttack,
}

impl TacticKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            TacticKind::Fork => "fork",
            TacticKind::Pin => "pin",
            TacticKind::Skewer => "skewer",
            TacticKind::DiscoveredAttack => "discovered_attack",
        }
    }
}

impl std::fmt::Display for TacticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tactical opportunity available to the tracked player on one ply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TacticalOpportunity {
    /// Ply number (1-based) at which the opportunity existed.
    pub ply: usize,
    /// The player who had the opportunity.
    pub player_color: Color,
    /// The detected motif.
    pub tactic_type: TacticKind,
    /// The piece executing the tactic.
    pub attacking_piece: Piece,
    /// Squares of the pieces targeted by the motif.
    pub target_squares: Vec<String>,
    /// True iff the played move equals the engine's best move.
    pub was_found: bool,
    /// The engine's best move (UCI).
    pub best_move: String,
    /// The move actually played (UCI).
    pub played_move: String,
    /// Evaluation swing that made the opportunity significant.
    pub eval_gain_cp: i32,
    /// Position before the move, for replay.
    pub fen: String,
}

const ORTHOGONAL: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Detects whether the engine's best move executes a tactical motif.
///
/// Returns `None` when the evaluation gain is below the significance floor,
/// even if a geometric pattern exists; trivial "tactics" are noise.
#[allow(clippy::too_many_arguments)]
pub fn detect_opportunity<R: RulesEngine>(
    rules: &R,
    board_before: &R::Board,
    best_move: UciMove,
    played_move: UciMove,
    eval_gain_cp: i32,
    player_color: Color,
    ply: usize,
    fen: &str,
    config: &TacticsConfig,
) -> Option<TacticalOpportunity> {
    if eval_gain_cp < config.min_gain_cp {
        return None;
    }
    let (moving_piece, color) = board_before.piece_at(best_move.from)?;
    if color != player_color {
        return None;
    }
    let board_after = rules.apply(board_before, best_move).ok()?;

    let detection = find_fork(&board_after, best_move.to, player_color, config)
        .or_else(|| find_discovered_attack(board_before, &board_after, best_move, player_color))
        .or_else(|| find_pin_or_skewer(&board_after, best_move.to, player_color))?;

    let attacking_piece = match detection.kind {
        // The discovered piece, not the moved one, delivers the attack.
        TacticKind::DiscoveredAttack => detection.attacker_piece,
        _ => match board_after.piece_at(best_move.to) {
            Some((p, _)) => p,
            None => moving_piece,
        },
    };

    Some(TacticalOpportunity {
        ply,
        player_color,
        tactic_type: detection.kind,
        attacking_piece,
        target_squares: detection
            .targets
            .into_iter()
            .map(|sq| sq.to_algebraic())
            .collect(),
        was_found: played_move == best_move,
        best_move: best_move.to_uci(),
        played_move: played_move.to_uci(),
        eval_gain_cp,
        fen: fen.to_string(),
    })
}

struct Detection {
    kind: TacticKind,
    targets: Vec<Square>,
    attacker_piece: Piece,
}

/// Fork: the moved piece attacks two or more enemy pieces of significant
/// value (or the king) from its new square, and those targets do not defend
/// each other.
fn find_fork<B: BoardView>(
    board_after: &B,
    attacker_sq: Square,
    color: Color,
    config: &TacticsConfig,
) -> Option<Detection> {
    let attacker_piece = board_after.piece_at(attacker_sq)?.0;
    let targets: Vec<Square> = board_after
        .attacks_from(attacker_sq)
        .into_iter()
        .filter(|&sq| match board_after.piece_at(sq) {
            Some((piece, c)) if c != color => {
                piece == Piece::King || piece.value() >= config.min_fork_value
            }
            _ => false,
        })
        .collect();

    for (i, &a) in targets.iter().enumerate() {
        for &b in &targets[i + 1..] {
            // A forked king is in check and cannot stay to defend the other
            // target, so defense only disqualifies non-king pairs.
            let royal = matches!(board_after.piece_at(a), Some((Piece::King, _)))
                || matches!(board_after.piece_at(b), Some((Piece::King, _)));
            let a_defends_b = board_after.attacks_from(a).contains(&b);
            let b_defends_a = board_after.attacks_from(b).contains(&a);
            if royal || (!a_defends_b && !b_defends_a) {
                return Some(Detection {
                    kind: TacticKind::Fork,
                    targets: vec![a, b],
                    attacker_piece,
                });
            }
        }
    }
    None
}

/// Pin or skewer: the moved slider lines up two enemy units so that moving
/// the front one exposes the back one. A front piece worth no more than the
/// back piece is pinned; a front piece worth more is skewered.
fn find_pin_or_skewer<B: BoardView>(
    board_after: &B,
    attacker_sq: Square,
    color: Color,
) -> Option<Detection> {
    let (piece, _) = board_after.piece_at(attacker_sq)?;
    if !piece.is_slider() {
        return None;
    }
    let dirs: Vec<(i8, i8)> = match piece {
        Piece::Rook => ORTHOGONAL.to_vec(),
        Piece::Bishop => DIAGONAL.to_vec(),
        _ => ORTHOGONAL.iter().chain(&DIAGONAL).copied().collect(),
    };

    for (df, dr) in dirs {
        let Some((front_sq, front)) = first_piece_on_ray(board_after, attacker_sq, df, dr) else {
            continue;
        };
        if front.1 == color {
            continue;
        }
        let Some((back_sq, back)) = first_piece_on_ray(board_after, front_sq, df, dr) else {
            continue;
        };
        if back.1 == color {
            continue;
        }
        let back_is_king = back.0 == Piece::King;
        // The alignment only matters when the back piece is worth winning.
        if !back_is_king && back.0.value() < 3 && front.0.value() < 3 {
            continue;
        }
        let kind = if back_is_king || front.0.value() <= back.0.value() {
            TacticKind::Pin
        } else {
            TacticKind::Skewer
        };
        return Some(Detection {
            kind,
            targets: vec![front_sq, back_sq],
            attacker_piece: piece,
        });
    }
    None
}

/// Discovered attack: the best move vacates a square, unmasking an attack
/// from a friendly slider onto a valuable target behind it.
fn find_discovered_attack<B: BoardView>(
    board_before: &B,
    board_after: &B,
    mv: UciMove,
    color: Color,
) -> Option<Detection> {
    for slider_sq in squares_of_sliders(board_before, color) {
        if slider_sq == mv.from {
            continue;
        }
        let (slider, _) = board_before.piece_at(slider_sq)?;
        let Some((df, dr)) = ray_direction(slider_sq, mv.from) else {
            continue;
        };
        let aligned = match slider {
            Piece::Rook => df == 0 || dr == 0,
            Piece::Bishop => df != 0 && dr != 0,
            Piece::Queen => true,
            _ => false,
        };
        if !aligned {
            continue;
        }
        // The vacated square must have been the blocker.
        match first_piece_on_ray(board_before, slider_sq, df, dr) {
            Some((sq, _)) if sq == mv.from => {}
            _ => continue,
        }
        // After the move the ray must now reach a valuable enemy piece.
        if let Some((target_sq, (target, target_color))) =
            first_piece_on_ray(board_after, slider_sq, df, dr)
        {
            if target_color != color
                && target_sq != mv.to
                && (target == Piece::King || target.value() >= 5)
            {
                return Some(Detection {
                    kind: TacticKind::DiscoveredAttack,
                    targets: vec![target_sq],
                    attacker_piece: slider,
                });
            }
        }
    }
    None
}

fn squares_of_sliders<B: BoardView>(board: &B, color: Color) -> Vec<Square> {
    Square::all()
        .filter(|&sq| matches!(board.piece_at(sq), Some((p, c)) if c == color && p.is_slider()))
        .collect()
}

/// Returns the unit direction from `from` to `to` when they share a rank,
/// file, or diagonal.
fn ray_direction(from: Square, to: Square) -> Option<(i8, i8)> {
    let df = to.file() as i8 - from.file() as i8;
    let dr = to.rank() as i8 - from.rank() as i8;
    if df == 0 && dr == 0 {
        return None;
    }
    if df == 0 || dr == 0 || df.abs() == dr.abs() {
        Some((df.signum(), dr.signum()))
    } else {
        None
    }
}

/// Scans a ray and returns the first occupied square with its piece.
fn first_piece_on_ray<B: BoardView>(
    board: &B,
    from: Square,
    df: i8,
    dr: i8,
) -> Option<(Square, (Piece, Color))> {
    let mut current = from;
    while let Some(next) = current.offset(df, dr) {
        if let Some(occupant) = board.piece_at(next) {
            return Some((next, occupant));
        }
        current = next;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_core::{Board, StandardRules};

    fn detect(
        fen: &str,
        best: &str,
        played: &str,
        gain: i32,
        color: Color,
    ) -> Option<TacticalOpportunity> {
        let rules = StandardRules;
        let board = Board::from_fen(fen).unwrap();
        detect_opportunity(
            &rules,
            &board,
            UciMove::from_uci(best).unwrap(),
            UciMove::from_uci(played).unwrap(),
            gain,
            color,
            1,
            fen,
            &TacticsConfig::default(),
        )
    }

    #[test]
    fn knight_fork_on_royal_family() {
        // Nc7+ forks the black king on e8 and rook on a8.
        let fen = "r3k3/8/8/3N4/8/8/8/4K3 w - - 0 1";
        let opp = detect(fen, "d5c7", "d5c7", 300, Color::White).unwrap();
        assert_eq!(opp.tactic_type, TacticKind::Fork);
        assert_eq!(opp.attacking_piece, Piece::Knight);
        assert!(opp.was_found);
        assert!(opp.target_squares.contains(&"e8".to_string()));
        assert!(opp.target_squares.contains(&"a8".to_string()));
    }

    #[test]
    fn fork_missed_when_other_move_played() {
        let fen = "r3k3/8/8/3N4/8/8/8/4K3 w - - 0 1";
        let opp = detect(fen, "d5c7", "e1d1", 300, Color::White).unwrap();
        assert!(!opp.was_found);
        assert_eq!(opp.played_move, "e1d1");
    }

    #[test]
    fn mutually_defending_pieces_are_not_forked() {
        // Nd5 attacks both rooks on c7 and e7, but they defend each other
        // along the seventh rank.
        let fen = "4k3/2r1r3/8/8/8/2N5/8/4K3 w - - 0 1";
        assert!(detect(fen, "c3d5", "c3d5", 300, Color::White).is_none());
    }

    #[test]
    fn rook_pin_against_king() {
        // Re1 pins the knight on e5 against the king on e8.
        let fen = "4k3/8/8/4n3/8/8/8/R5K1 w - - 0 1";
        let opp = detect(fen, "a1e1", "a1e1", 200, Color::White).unwrap();
        assert_eq!(opp.tactic_type, TacticKind::Pin);
        assert_eq!(opp.target_squares, vec!["e5".to_string(), "e8".to_string()]);
    }

    #[test]
    fn skewer_when_front_outvalues_back() {
        // Bc3 hits the queen on e5 with the rook on g7 behind it.
        let fen = "4k3/6r1/8/4q3/8/8/1B6/3K4 w - - 0 1";
        let opp = detect(fen, "b2c3", "b2c3", 400, Color::White).unwrap();
        assert_eq!(opp.tactic_type, TacticKind::Skewer);
        assert_eq!(opp.target_squares, vec!["e5".to_string(), "g7".to_string()]);
    }

    #[test]
    fn discovered_attack_by_vacating_blocker() {
        // The knight on d4 blocks the rook on d1 from the queen on d8;
        // moving the knight discovers the attack.
        let fen = "3qk3/8/8/8/3N4/8/8/3RK3 w - - 0 1";
        let opp = detect(fen, "d4f5", "d4f5", 250, Color::White).unwrap();
        assert_eq!(opp.tactic_type, TacticKind::DiscoveredAttack);
        assert_eq!(opp.attacking_piece, Piece::Rook);
        assert_eq!(opp.target_squares, vec!["d8".to_string()]);
    }

    #[test]
    fn below_gain_floor_returns_none() {
        let fen = "r3k3/8/8/3N4/8/8/8/4K3 w - - 0 1";
        assert!(detect(fen, "d5c7", "d5c7", 100, Color::White).is_none());
    }

    #[test]
    fn opponent_piece_is_not_an_opportunity() {
        let fen = "r3k3/8/8/3N4/8/8/8/4K3 w - - 0 1";
        assert!(detect(fen, "d5c7", "d5c7", 300, Color::Black).is_none());
    }
}
