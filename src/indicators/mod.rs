// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator functions plus `IndicatorSet`, the
// last-observation snapshot the technical analyzer consumes.  Every rolling
// statistic is reduced to its most recent value; an indicator whose window is
// longer than the available history is `None`.

pub mod bollinger;
pub mod ema;
pub mod pivot;
pub mod rsi;
pub mod sma;

use serde::Serialize;

use crate::runtime_config::IndicatorParams;
use crate::types::PriceBar;

use bollinger::calculate_bollinger;
use ema::calculate_macd;
use pivot::calculate_pivots;
use rsi::current_rsi;
use sma::{sma_last, volume_trend};

/// A moving average together with the period it was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovingAverage {
    pub period: usize,
    pub value: Option<f64>,
}

/// Last-value snapshot of every indicator derived from a bar history.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IndicatorSet {
    pub latest_close: Option<f64>,
    pub rsi: Option<f64>,
    pub band_upper: Option<f64>,
    pub band_middle: Option<f64>,
    pub band_lower: Option<f64>,
    /// Short to long, in the configured period order.
    pub moving_averages: Vec<MovingAverage>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub volume_ma_short: Option<f64>,
    pub volume_ma_long: Option<f64>,
    pub volume_change_pct: Option<f64>,
    pub pivot: Option<f64>,
    pub resistance: Option<f64>,
    pub support: Option<f64>,
    pub recent_high: Option<f64>,
    pub recent_low: Option<f64>,
    /// Closes in the history that are NaN or infinite.
    pub non_finite_closes: usize,
}

impl IndicatorSet {
    /// Compute the snapshot over an ascending bar history.
    ///
    /// An empty history yields an empty set (`is_empty() == true`).
    pub fn from_bars(bars: &[PriceBar], params: &IndicatorParams) -> Self {
        if bars.is_empty() {
            return Self::default();
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let bands = calculate_bollinger(&closes, params.band_period, params.band_std_multiplier);
        let macd = calculate_macd(&closes, params.macd_fast, params.macd_slow, params.macd_signal);
        let volume = volume_trend(&volumes, params.volume_ma_short, params.volume_ma_long);
        let pivots = calculate_pivots(bars, params.pivot_lookback);

        let moving_averages = params
            .ma_periods
            .iter()
            .map(|&period| MovingAverage {
                period,
                value: sma_last(&closes, period),
            })
            .collect();

        Self {
            latest_close: closes.last().copied(),
            rsi: current_rsi(&closes, params.rsi_period),
            band_upper: bands.map(|b| b.upper),
            band_middle: bands.map(|b| b.middle),
            band_lower: bands.map(|b| b.lower),
            moving_averages,
            macd: macd.map(|m| m.macd),
            macd_signal: macd.map(|m| m.signal),
            macd_histogram: macd.map(|m| m.histogram),
            volume_ma_short: volume.ma_short,
            volume_ma_long: volume.ma_long,
            volume_change_pct: volume.change_pct,
            pivot: pivots.map(|p| p.pivot),
            resistance: pivots.map(|p| p.resistance),
            support: pivots.map(|p| p.support),
            recent_high: pivots.map(|p| p.recent_high),
            recent_low: pivots.map(|p| p.recent_low),
            non_finite_closes: closes.iter().filter(|c| !c.is_finite()).count(),
        }
    }

    /// True when no bars were available; technical analysis is skipped.
    pub fn is_empty(&self) -> bool {
        self.latest_close.is_none()
    }

    /// Moving-average values short to long, `None` if any is undefined.
    pub fn ma_values(&self) -> Option<Vec<f64>> {
        self.moving_averages.iter().map(|m| m.value).collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate};

    use crate::types::PriceBar;

    /// Ascending daily bars with the given closes; high/low bracket the close
    /// by 1% and volume is constant.
    pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: start + Duration::days(i as i64),
                open: close,
                close,
                high: close * 1.01,
                low: close * 0.99,
                volume: 10_000.0,
                amount: close * 1_000_000.0,
                amplitude: 2.0,
                pct_change: 0.0,
                price_change: 0.0,
                turnover: 1.5,
            })
            .collect()
    }
}
