// =============================================================================
// Classic Pivot Levels
// =============================================================================
//
//   pivot      = (recent high + recent low + latest close) / 3
//   resistance = 2 * pivot - recent low
//   support    = 2 * pivot - recent high
//
// The recent range covers the trailing `lookback` bars, or every bar when
// fewer are available.

use crate::types::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotLevels {
    pub pivot: f64,
    pub resistance: f64,
    pub support: f64,
    pub recent_high: f64,
    pub recent_low: f64,
}

pub fn calculate_pivots(bars: &[PriceBar], lookback: usize) -> Option<PivotLevels> {
    let latest = bars.last()?;
    if lookback == 0 {
        return None;
    }

    let window = &bars[bars.len().saturating_sub(lookback)..];
    let recent_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let recent_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    let pivot = (recent_high + recent_low + latest.close) / 3.0;
    let levels = PivotLevels {
        pivot,
        resistance: 2.0 * pivot - recent_low,
        support: 2.0 * pivot - recent_high,
        recent_high,
        recent_low,
    };

    (levels.resistance.is_finite() && levels.support.is_finite()).then_some(levels)
}
