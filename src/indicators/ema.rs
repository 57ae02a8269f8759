// =============================================================================
// Exponential Moving Average (EMA) & MACD
// =============================================================================
//
// Recursive, non-adjusted EMA:
//   alpha  = 2 / (span + 1)
//   EMA_0  = x_0
//   EMA_t  = alpha * x_t + (1 - alpha) * EMA_{t-1}
//
// MACD line = EMA(fast) - EMA(slow), signal = EMA(signal) of the MACD line,
// histogram = MACD - signal.  Only the last values leave this module.
// =============================================================================

/// Compute the EMA series for `values` with the given `span`.
///
/// The output has the same length as the input; the first value seeds the
/// recursion.  Returns an empty `Vec` for empty input or `span == 0`.
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    result.push(prev);

    for &x in &values[1..] {
        prev = alpha * x + (1.0 - alpha) * prev;
        result.push(prev);
    }

    result
}

/// Last-observation snapshot of the MACD trio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Calculate MACD(fast, slow, signal) on `closes`.
///
/// Returns `None` for empty input, zero spans, or a non-finite result.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdResult> {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    if ema_fast.is_empty() || ema_slow.is_empty() {
        return None;
    }

    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal_line = calculate_ema(&line, signal);

    let macd = *line.last()?;
    let signal = *signal_line.last()?;
    let histogram = macd - signal;

    if macd.is_finite() && signal.is_finite() {
        Some(MacdResult {
            macd,
            signal,
            histogram,
        })
    } else {
        None
    }
}
