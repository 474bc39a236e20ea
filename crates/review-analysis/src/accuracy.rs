//! Game-level accuracy aggregation with position-volatility weighting.
//!
//! A small inaccuracy in a tactically sharp position carries a weaker skill
//! signal than the same slip in a quiet one, so each move's accuracy is
//! weighted down by the local volatility of the win-probability curve.

/// Sliding-window size (in plies) for volatility estimation.
pub const VOLATILITY_WINDOW: usize = 3;

/// Volatility divisor controlling how quickly sharp positions lose weight.
const VOLATILITY_SCALE: f64 = 10.0;

/// Computes per-ply volatility of a win-probability series as the standard
/// deviation over a centered sliding window of [`VOLATILITY_WINDOW`] values.
pub fn volatilities(win_probs: &[f64]) -> Vec<f64> {
    let n = win_probs.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let start = i.saturating_sub(VOLATILITY_WINDOW / 2);
        let end = (i + VOLATILITY_WINDOW / 2 + 1).min(n);
        out.push(std_dev(&win_probs[start..end]));
    }
    out
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Combines one player's per-move accuracies into a single 0-100 game score.
///
/// Each accuracy is weighted by `1 / (1 + volatility / scale)`, so quiet
/// positions count fully and sharp ones progressively less. Falls back to an
/// unweighted mean with fewer than two data points or when the volatility
/// series does not line up; returns 100 for an empty input.
pub fn aggregate_accuracy(accuracies: &[f64], volatilities: &[f64]) -> f64 {
    if accuracies.is_empty() {
        return 100.0;
    }
    if accuracies.len() < 2 || volatilities.len() != accuracies.len() {
        let mean = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
        return mean.clamp(0.0, 100.0);
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (&acc, &vol) in accuracies.iter().zip(volatilities) {
        let weight = 1.0 / (1.0 + vol.max(0.0) / VOLATILITY_SCALE);
        weighted_sum += acc * weight;
        weight_total += weight;
    }
    if weight_total == 0.0 {
        return 100.0;
    }
    (weighted_sum / weight_total).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_perfect() {
        assert_eq!(aggregate_accuracy(&[], &[]), 100.0);
    }

    #[test]
    fn single_point_uses_unweighted_mean() {
        assert_eq!(aggregate_accuracy(&[100.0], &[5.0]), 100.0);
        assert_eq!(aggregate_accuracy(&[40.0], &[]), 40.0);
    }

    #[test]
    fn all_zero_accuracies_aggregate_to_zero() {
        assert_eq!(aggregate_accuracy(&[0.0, 0.0, 0.0], &[]), 0.0);
    }

    #[test]
    fn mismatched_volatilities_fall_back_to_mean() {
        let result = aggregate_accuracy(&[80.0, 60.0], &[1.0]);
        assert!((result - 70.0).abs() < 1e-9);
    }

    #[test]
    fn volatile_penalties_count_less() {
        // One bad move: weighting it by high volatility should raise the
        // aggregate relative to weighting it by low volatility.
        let quiet_blunder = aggregate_accuracy(&[95.0, 30.0, 95.0], &[0.0, 0.0, 0.0]);
        let sharp_blunder = aggregate_accuracy(&[95.0, 30.0, 95.0], &[0.0, 25.0, 0.0]);
        assert!(sharp_blunder > quiet_blunder);
    }

    #[test]
    fn aggregate_stays_in_range() {
        let result = aggregate_accuracy(&[100.0, 100.0, 100.0], &[3.0, 8.0, 1.0]);
        assert!((99.9..=100.0).contains(&result));
    }

    #[test]
    fn volatility_of_flat_series_is_zero() {
        let vols = volatilities(&[50.0, 50.0, 50.0, 50.0]);
        assert!(vols.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn volatility_spikes_on_swings() {
        let vols = volatilities(&[50.0, 50.0, 90.0, 10.0, 50.0]);
        assert!(vols[3] > vols[0]);
        assert_eq!(vols.len(), 5);
    }

    #[test]
    fn volatility_of_short_series() {
        assert_eq!(volatilities(&[]).len(), 0);
        assert_eq!(volatilities(&[50.0]), vec![0.0]);
    }
}
