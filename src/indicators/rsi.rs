// =============================================================================
// Relative Strength Index (RSI) — simple rolling averages
// =============================================================================
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Over each trailing window of `period` deltas, take the plain mean
//          of gains and the plain mean of losses (no Wilder smoothing).
// Step 3 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Zero-loss convention: only gains => 100, no movement at all => 50.
// =============================================================================

/// Compute the rolling RSI series for the given `closes` and `period`.
///
/// The returned vector has one value per close starting at index `period`
/// (each value needs `period` deltas, i.e. `period + 1` closes).
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period + 1` => empty vec
/// - Any non-finite window => empty vec
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    for window in deltas.windows(period) {
        let (sum_gain, sum_loss) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

        match rsi_from_averages(sum_gain / period_f, sum_loss / period_f) {
            Some(rsi) => result.push(rsi),
            None => return Vec::new(),
        }
    }

    result
}

/// Most recent RSI value, or `None` with insufficient data.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<f64> {
    calculate_rsi(closes, period).last().copied()
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}
