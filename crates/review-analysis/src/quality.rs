//! Win-probability conversion and move quality classification.

use crate::config::ClassifyConfig;
use crate::evaluation::is_mate_score;
use serde::{Deserialize, Serialize};

/// Classification of move quality.
///
/// `Best`, `Excellent`, and `Good` are display-only subdivisions of the
/// non-penalized range; `Inaccuracy`, `Mistake`, and `Blunder` come from
/// win-probability drop thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveQuality {
    /// The engine's best move.
    Best,
    /// Minimal centipawn loss.
    Excellent,
    /// Small centipawn loss, no meaningful probability drop.
    Good,
    /// Noticeable win-probability drop.
    Inaccuracy,
    /// Significant win-probability drop.
    Mistake,
    /// Major win-probability drop, or walking into forced mate.
    Blunder,
}

impl MoveQuality {
    /// Severity rank, 0 (best) through 5 (blunder). Used to check that
    /// classification is monotonic in the probability drop.
    pub const fn severity(self) -> u8 {
        match self {
            MoveQuality::Best => 0,
            MoveQuality::Excellent => 1,
            MoveQuality::Good => 2,
            MoveQuality::Inaccuracy => 3,
            MoveQuality::Mistake => 4,
            MoveQuality::Blunder => 5,
        }
    }

    /// Lowercase label for reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            MoveQuality::Best => "best",
            MoveQuality::Excellent => "excellent",
            MoveQuality::Good => "good",
            MoveQuality::Inaccuracy => "inaccuracy",
            MoveQuality::Mistake => "mistake",
            MoveQuality::Blunder => "blunder",
        }
    }
}

impl std::fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Converts a centipawn score into a win probability in `[0, 100]`.
///
/// Logistic curve: exactly 50 at 0, symmetric about 50, asymptotic to
/// 0 and 100. The steepness constant comes from [`ClassifyConfig`].
pub fn cp_to_win_probability(cp: i32, config: &ClassifyConfig) -> f64 {
    let k = config.win_prob_k;
    50.0 + 50.0 * (2.0 / (1.0 + (-k * cp as f64).exp()) - 1.0)
}

/// Per-move accuracy in `[0, 100]` from the win-probability drop against
/// the best move's resulting probability. The best line is the full-credit
/// baseline; the penalty grows non-linearly with the drop.
pub fn move_accuracy(win_prob_best: f64, win_prob_played: f64) -> f64 {
    let drop = (win_prob_best - win_prob_played).max(0.0);
    let raw = 103.1668 * (-0.04354 * drop).exp() - 3.1669;
    (raw + 1.0).clamp(0.0, 100.0)
}

/// Classifies one move from its win-probability drop and evaluations.
///
/// Both evaluations are from the mover's perspective, sentinel-encoded.
/// Returns `None` when the contestability gate suppresses classification:
/// once the position is heavily decided, marginal imperfections carry no
/// signal and only blunder-sized drops are labeled at all.
///
/// A mover left facing forced mate is always a blunder, no matter how small
/// the computed drop is in an already-lost position.
pub fn classify(
    win_prob_drop: f64,
    eval_before_mover: i32,
    eval_after_mover: i32,
    cp_loss: i32,
    config: &ClassifyConfig,
) -> Option<MoveQuality> {
    if eval_after_mover < 0 && is_mate_score(eval_after_mover, config) {
        return Some(MoveQuality::Blunder);
    }

    let decided = eval_before_mover.abs() >= config.decided_cp;
    if decided && win_prob_drop < config.blunder_drop {
        return None;
    }

    if win_prob_drop >= config.blunder_drop {
        Some(MoveQuality::Blunder)
    } else if win_prob_drop >= config.mistake_drop {
        Some(MoveQuality::Mistake)
    } else if win_prob_drop >= config.inaccuracy_drop {
        Some(MoveQuality::Inaccuracy)
    } else if cp_loss == 0 {
        Some(MoveQuality::Best)
    } else if cp_loss <= config.excellent_cp {
        Some(MoveQuality::Excellent)
    } else {
        Some(MoveQuality::Good)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> ClassifyConfig {
        ClassifyConfig::default()
    }

    #[test]
    fn win_prob_is_fifty_at_zero() {
        assert_eq!(cp_to_win_probability(0, &config()), 50.0);
    }

    #[test]
    fn win_prob_orders_with_eval() {
        let cfg = config();
        assert!(cp_to_win_probability(100, &cfg) > 50.0);
        assert!(cp_to_win_probability(-100, &cfg) < 50.0);
        assert!(cp_to_win_probability(500, &cfg) > cp_to_win_probability(100, &cfg));
    }

    #[test]
    fn win_prob_asymptotes() {
        let cfg = config();
        assert!(cp_to_win_probability(20_000, &cfg) > 99.9);
        assert!(cp_to_win_probability(20_000, &cfg) <= 100.0);
        assert!(cp_to_win_probability(-20_000, &cfg) < 0.1);
        assert!(cp_to_win_probability(-20_000, &cfg) >= 0.0);
    }

    #[test]
    fn accuracy_full_credit_for_best_move() {
        assert!((move_accuracy(62.0, 62.0) - 100.0).abs() < 1.0);
        // A better-than-best result never exceeds 100.
        assert!(move_accuracy(50.0, 60.0) <= 100.0);
    }

    #[test]
    fn accuracy_decreases_with_drop() {
        let a = move_accuracy(60.0, 55.0);
        let b = move_accuracy(60.0, 45.0);
        let c = move_accuracy(60.0, 20.0);
        assert!(a > b && b > c);
        assert!(c >= 0.0);
    }

    #[test]
    fn classify_thresholds() {
        let cfg = config();
        assert_eq!(classify(0.0, 20, 25, 0, &cfg), Some(MoveQuality::Best));
        assert_eq!(classify(1.0, 20, 5, 10, &cfg), Some(MoveQuality::Excellent));
        assert_eq!(classify(3.0, 20, -20, 40, &cfg), Some(MoveQuality::Good));
        assert_eq!(
            classify(6.0, 20, -40, 60, &cfg),
            Some(MoveQuality::Inaccuracy)
        );
        assert_eq!(classify(12.0, 20, -90, 120, &cfg), Some(MoveQuality::Mistake));
        assert_eq!(classify(25.0, 20, -250, 300, &cfg), Some(MoveQuality::Blunder));
    }

    #[test]
    fn mate_facing_mover_is_always_blunder() {
        let cfg = config();
        // Zero drop in an already-lost position still blunders into mate.
        assert_eq!(classify(0.0, -9_990, -9_990, 0, &cfg), Some(MoveQuality::Blunder));
        assert_eq!(classify(0.4, 300, -9_970, 500, &cfg), Some(MoveQuality::Blunder));
    }

    #[test]
    fn mate_boundary_is_exclusive() {
        let cfg = config();
        // Exactly at the threshold is still a centipawn score, and the
        // decided-position gate applies as usual.
        assert_eq!(classify(6.0, -8_000, -cfg.mate_threshold, 80, &cfg), None);
        // One past the threshold is mate and blunder-forced.
        assert_eq!(
            classify(0.0, -8_000, -cfg.mate_threshold - 1, 0, &cfg),
            Some(MoveQuality::Blunder)
        );
    }

    #[test]
    fn decided_position_suppresses_marginal_labels() {
        let cfg = config();
        // Up 900, a 6-point drop would normally be an inaccuracy.
        assert_eq!(classify(6.0, 900, 750, 80, &cfg), None);
        // A blunder-sized drop is still classified.
        assert_eq!(classify(20.0, 900, 100, 500, &cfg), Some(MoveQuality::Blunder));
        // Losing heavily is equally gated.
        assert_eq!(classify(6.0, -900, -980, 80, &cfg), None);
    }

    proptest! {
        #[test]
        fn win_prob_symmetric_about_fifty(cp in -15_000i32..15_000) {
            let cfg = config();
            let sum = cp_to_win_probability(cp, &cfg) + cp_to_win_probability(-cp, &cfg);
            prop_assert!((sum - 100.0).abs() < 1e-9);
        }

        #[test]
        fn win_prob_in_range(cp in -50_000i32..50_000) {
            let p = cp_to_win_probability(cp, &config());
            prop_assert!((0.0..=100.0).contains(&p));
        }

        #[test]
        fn classification_monotonic_in_drop(
            drop_a in 0.0f64..60.0,
            drop_b in 0.0f64..60.0,
        ) {
            let cfg = config();
            let (lo, hi) = if drop_a <= drop_b { (drop_a, drop_b) } else { (drop_b, drop_a) };
            // Fixed, non-decided evaluations and fixed cp loss.
            let a = classify(lo, 50, -50, 30, &cfg).unwrap();
            let b = classify(hi, 50, -50, 30, &cfg).unwrap();
            prop_assert!(a.severity() <= b.severity());
        }

        #[test]
        fn accuracy_in_range(best in 0.0f64..100.0, played in 0.0f64..100.0) {
            let acc = move_accuracy(best, played);
            prop_assert!((0.0..=100.0).contains(&acc));
        }
    }
}
