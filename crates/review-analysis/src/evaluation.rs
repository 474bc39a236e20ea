//! Position evaluation types and perspective conversions.
//!
//! Engine scores arrive relative to the side to move. This module converts
//! between that form, White's perspective, and the mover's perspective, and
//! computes clamped centipawn loss. Everything here is deterministic and
//! pure; all downstream classification depends on that.

use crate::config::ClassifyConfig;
use review_core::Color;
use serde::{Deserialize, Serialize};

/// A raw engine evaluation, relative to the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Evaluation {
    /// Centipawn score (positive = side to move is better).
    Centipawns(i32),
    /// Forced mate in N moves (positive = side to move mates).
    Mate(i32),
}

impl Evaluation {
    /// Builds an evaluation from the `cp`/`mate` fields of a UCI info line.
    pub fn from_uci_score(cp: Option<i32>, mate: Option<i32>) -> Option<Self> {
        match (cp, mate) {
            (_, Some(m)) => Some(Evaluation::Mate(m)),
            (Some(c), None) => Some(Evaluation::Centipawns(c)),
            (None, None) => None,
        }
    }

    /// Collapses the evaluation into a single centipawn number using the
    /// mate sentinel encoding: mate in N maps just inside `mate_score`,
    /// closer mates scoring higher. Consumers must check against the mate
    /// threshold before treating the result as ordinary centipawns.
    pub fn to_centipawns(self, mate_score: i32) -> i32 {
        match self {
            Evaluation::Centipawns(cp) => cp,
            Evaluation::Mate(n) => {
                if n > 0 {
                    mate_score - 10 * n
                } else {
                    -mate_score - 10 * n
                }
            }
        }
    }

    /// Returns true if this is a mate score.
    pub fn is_mate(self) -> bool {
        matches!(self, Evaluation::Mate(_))
    }
}

/// Converts a mover-relative score to White's perspective.
pub fn to_white_perspective(cp_mover: i32, mover: Color) -> i32 {
    cp_mover * mover.sign()
}

/// Converts a White-perspective score to the given mover's perspective.
pub fn to_mover_perspective(cp_white: i32, mover: Color) -> i32 {
    cp_white * mover.sign()
}

/// Returns true if a sentinel-encoded score signals forced mate.
pub fn is_mate_score(cp: i32, config: &ClassifyConfig) -> bool {
    cp.abs() > config.mate_threshold
}

/// Centipawn loss of a move: how much worse the mover stands after the move
/// than the best line promised before it, never negative and capped so a
/// single catastrophe does not dominate aggregates.
///
/// Both inputs are White-perspective, sentinel-encoded scores. Two mate
/// scores on the same side cost nothing (a slower mate is still a mate);
/// flipping a mate score to the other side costs the full cap.
pub fn centipawn_loss(
    eval_before_white: i32,
    eval_after_white: i32,
    mover: Color,
    config: &ClassifyConfig,
) -> i32 {
    let before_is_mate = is_mate_score(eval_before_white, config);
    let after_is_mate = is_mate_score(eval_after_white, config);
    if before_is_mate && after_is_mate {
        if (eval_before_white > 0) == (eval_after_white > 0) {
            return 0;
        }
        return config.cp_loss_cap;
    }

    let before_mover = to_mover_perspective(eval_before_white, mover);
    let after_mover = to_mover_perspective(eval_after_white, mover);
    (before_mover - after_mover).clamp(0, config.cp_loss_cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> ClassifyConfig {
        ClassifyConfig::default()
    }

    #[test]
    fn from_uci_score_prefers_mate() {
        assert_eq!(
            Evaluation::from_uci_score(Some(120), None),
            Some(Evaluation::Centipawns(120))
        );
        assert_eq!(
            Evaluation::from_uci_score(None, Some(3)),
            Some(Evaluation::Mate(3))
        );
        assert_eq!(
            Evaluation::from_uci_score(Some(0), Some(-2)),
            Some(Evaluation::Mate(-2))
        );
        assert_eq!(Evaluation::from_uci_score(None, None), None);
    }

    #[test]
    fn mate_sentinel_encoding() {
        assert_eq!(Evaluation::Mate(1).to_centipawns(10_000), 9_990);
        assert_eq!(Evaluation::Mate(3).to_centipawns(10_000), 9_970);
        assert_eq!(Evaluation::Mate(-1).to_centipawns(10_000), -9_990);
        assert_eq!(Evaluation::Mate(-5).to_centipawns(10_000), -9_950);
        // Closer mates score higher.
        assert!(
            Evaluation::Mate(1).to_centipawns(10_000) > Evaluation::Mate(5).to_centipawns(10_000)
        );
    }

    #[test]
    fn mate_sentinel_crosses_threshold() {
        let cfg = config();
        assert!(is_mate_score(Evaluation::Mate(2).to_centipawns(cfg.mate_score), &cfg));
        assert!(is_mate_score(
            Evaluation::Mate(-7).to_centipawns(cfg.mate_score),
            &cfg
        ));
        assert!(!is_mate_score(850, &cfg));
    }

    #[test]
    fn perspective_conversions() {
        assert_eq!(to_white_perspective(50, Color::White), 50);
        assert_eq!(to_white_perspective(50, Color::Black), -50);
        assert_eq!(to_mover_perspective(-30, Color::Black), 30);
    }

    #[test]
    fn cp_loss_basic() {
        let cfg = config();
        // White goes from +100 to +80 (White perspective): loses 20.
        assert_eq!(centipawn_loss(100, 80, Color::White, &cfg), 20);
        // Black goes from -100 (White persp) to -120: Black gained, loss 0.
        assert_eq!(centipawn_loss(-100, -120, Color::Black, &cfg), 0);
        // Black goes from +100 to +120: Black lost 20.
        assert_eq!(centipawn_loss(100, 120, Color::Black, &cfg), 20);
    }

    #[test]
    fn cp_loss_is_capped() {
        let cfg = config();
        assert_eq!(centipawn_loss(300, -600, Color::White, &cfg), 500);
    }

    #[test]
    fn cp_loss_mate_pairs() {
        let cfg = config();
        // Slower mate for the same side costs nothing.
        assert_eq!(centipawn_loss(9_990, 9_950, Color::White, &cfg), 0);
        // Handing the mate to the opponent costs the full cap.
        assert_eq!(centipawn_loss(9_990, -9_990, Color::White, &cfg), 500);
    }

    proptest! {
        #[test]
        fn cp_loss_never_negative(
            before in -12_000i32..12_000,
            after in -12_000i32..12_000,
            white in proptest::bool::ANY,
        ) {
            let mover = if white { Color::White } else { Color::Black };
            let loss = centipawn_loss(before, after, mover, &config());
            prop_assert!(loss >= 0);
            prop_assert!(loss <= config().cp_loss_cap);
        }

        #[test]
        fn perspective_roundtrip(cp in -20_000i32..20_000, white in proptest::bool::ANY) {
            let mover = if white { Color::White } else { Color::Black };
            prop_assert_eq!(to_mover_perspective(to_white_perspective(cp, mover), mover), cp);
        }
    }
}
