// =============================================================================
// Technical Analysis — momentum, bands, MA stack, MACD, volume
// =============================================================================
//
// Classifies the indicator snapshot into five categories and scores it:
//
//   score = 50 + momentum + band + MA stack + MACD + volume   (clamped)
//
// An undefined indicator (window longer than the history) compares false,
// which lands it in the inside / mixed / normal branch.
// =============================================================================

use anyhow::{ensure, Result};
use serde::Serialize;

use crate::indicators::IndicatorSet;
use crate::runtime_config::TechnicalThresholds;
use crate::types::SubAnalysis;

// ---------------------------------------------------------------------------
// Classifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MomentumState {
    Overbought,
    Oversold,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BandPosition {
    AboveUpper,
    BelowLower,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MaAlignment {
    Bullish,
    Bearish,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MacdState {
    BullishCross,
    BearishCross,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolumeState {
    Expanding,
    Contracting,
    Normal,
}

impl MomentumState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Overbought => "overbought",
            Self::Oversold => "oversold",
            Self::Normal => "normal",
        }
    }
}

impl BandPosition {
    pub fn label(self) -> &'static str {
        match self {
            Self::AboveUpper => "above upper band",
            Self::BelowLower => "below lower band",
            Self::Inside => "inside the bands",
        }
    }
}

impl MaAlignment {
    pub fn label(self) -> &'static str {
        match self {
            Self::Bullish => "bullish stack",
            Self::Bearish => "bearish stack",
            Self::Mixed => "mixed",
        }
    }
}

impl MacdState {
    pub fn label(self) -> &'static str {
        match self {
            Self::BullishCross => "bullish cross",
            Self::BearishCross => "bearish cross",
            Self::Mixed => "mixed",
        }
    }
}

impl VolumeState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Expanding => "expanding",
            Self::Contracting => "contracting",
            Self::Normal => "normal",
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalAnalysis {
    pub current_price: f64,
    pub indicators: IndicatorSet,
    pub momentum: MomentumState,
    pub momentum_comment: String,
    pub band_position: BandPosition,
    pub band_comment: String,
    pub ma_alignment: MaAlignment,
    pub ma_comment: String,
    pub macd_state: MacdState,
    pub macd_comment: String,
    pub volume_state: VolumeState,
    pub volume_comment: String,
}

/// Run the technical analysis over an indicator snapshot.
///
/// An empty snapshot yields `NoData`; non-finite indicator values yield
/// `Error`.  Both carry `neutral_score`.
pub fn analyze(
    indicators: &IndicatorSet,
    thresholds: &TechnicalThresholds,
    neutral_score: f64,
) -> SubAnalysis<TechnicalAnalysis> {
    if indicators.is_empty() {
        return SubAnalysis::no_data("No technical indicator data available", neutral_score);
    }

    match evaluate(indicators, thresholds) {
        Ok((analysis, score)) => {
            let comment = format!(
                "RSI {}, price {}, MA {}, MACD {}, volume {}",
                analysis.momentum.label(),
                analysis.band_position.label(),
                analysis.ma_alignment.label(),
                analysis.macd_state.label(),
                analysis.volume_state.label()
            );
            SubAnalysis::success(comment, score, analysis)
        }
        Err(e) => SubAnalysis::error(format!("Technical analysis failed: {e}"), neutral_score),
    }
}

fn evaluate(ind: &IndicatorSet, t: &TechnicalThresholds) -> Result<(TechnicalAnalysis, f64)> {
    let price = ind.latest_close.unwrap_or_default();
    ensure!(price.is_finite(), "latest close is not a finite number");
    ensure!(
        ind.non_finite_closes == 0,
        "{} closes in the history are not finite numbers",
        ind.non_finite_closes
    );
    for (name, value) in [
        ("rsi", ind.rsi),
        ("band_upper", ind.band_upper),
        ("band_lower", ind.band_lower),
        ("macd", ind.macd),
        ("macd_signal", ind.macd_signal),
        ("volume_change_pct", ind.volume_change_pct),
    ] {
        if let Some(v) = value {
            ensure!(v.is_finite(), "indicator {name} is not finite ({v})");
        }
    }

    let mut score = 50.0;

    // ── Momentum ──────────────────────────────────────────────────────────
    let (momentum, momentum_comment) = match ind.rsi {
        Some(v) if v > t.rsi_overbought => (
            MomentumState::Overbought,
            format!(
                "RSI above {:.0}: short-term upside momentum is strong, watch for a pullback",
                t.rsi_overbought
            ),
        ),
        Some(v) if v < t.rsi_oversold => (
            MomentumState::Oversold,
            format!(
                "RSI below {:.0}: short-term selling is heavy, a rebound may follow",
                t.rsi_oversold
            ),
        ),
        Some(_) => (
            MomentumState::Normal,
            "RSI is in its normal range, market sentiment is neutral".to_string(),
        ),
        None => (
            MomentumState::Normal,
            "RSI is undefined for this history length".to_string(),
        ),
    };
    score += match ind.rsi {
        Some(v) if (t.rsi_mid_low..=t.rsi_mid_high).contains(&v) => t.rsi_mid_bonus,
        Some(v) if (t.rsi_oversold..=t.rsi_overbought).contains(&v) => t.rsi_wide_bonus,
        Some(_) => t.rsi_extreme_bonus,
        None => t.rsi_wide_bonus,
    };

    // ── Bands ─────────────────────────────────────────────────────────────
    let band_position = match (ind.band_upper, ind.band_lower) {
        (Some(upper), _) if price > upper => BandPosition::AboveUpper,
        (_, Some(lower)) if price < lower => BandPosition::BelowLower,
        _ => BandPosition::Inside,
    };
    let band_comment = match band_position {
        BandPosition::AboveUpper => format!(
            "has broken above the upper band ({:.2}): short-term strength, but pullback pressure is likely",
            ind.band_upper.unwrap_or_default()
        ),
        BandPosition::BelowLower => format!(
            "has broken below the lower band ({:.2}): short-term weakness, but a rebound is possible",
            ind.band_lower.unwrap_or_default()
        ),
        BandPosition::Inside => "is trading inside the bands, volatility is normal".to_string(),
    };
    score += match band_position {
        BandPosition::AboveUpper => t.band_above_upper_bonus,
        BandPosition::BelowLower => t.band_below_lower_bonus,
        BandPosition::Inside => t.band_inside_bonus,
    };

    // ── Moving-average stack ──────────────────────────────────────────────
    let ma_alignment = match ind.ma_values() {
        Some(v) if v.len() > 1 && v.windows(2).all(|w| w[0] > w[1]) => MaAlignment::Bullish,
        Some(v) if v.len() > 1 && v.windows(2).all(|w| w[0] < w[1]) => MaAlignment::Bearish,
        _ => MaAlignment::Mixed,
    };
    let ma_comment = match ma_alignment {
        MaAlignment::Bullish => {
            "Short-term averages sit above the long-term ones in a bullish stack; the medium-term trend is improving"
        }
        MaAlignment::Bearish => {
            "Short-term averages sit below the long-term ones in a bearish stack; the medium-term trend is weakening"
        }
        MaAlignment::Mixed => "The moving averages are intertwined with no clear trend",
    }
    .to_string();
    score += match ma_alignment {
        MaAlignment::Bullish => t.ma_bullish_bonus,
        MaAlignment::Mixed => t.ma_mixed_bonus,
        MaAlignment::Bearish => t.ma_bearish_bonus,
    };

    // ── MACD ──────────────────────────────────────────────────────────────
    let macd_state = match (ind.macd, ind.macd_signal, ind.macd_histogram) {
        (Some(m), Some(s), Some(h)) if m > s && h > 0.0 => MacdState::BullishCross,
        (Some(m), Some(s), Some(h)) if m < s && h < 0.0 => MacdState::BearishCross,
        _ => MacdState::Mixed,
    };
    let macd_comment = match macd_state {
        MacdState::BullishCross => {
            "MACD is above its signal line with a positive histogram; upside momentum is building"
        }
        MacdState::BearishCross => {
            "MACD is below its signal line with a negative histogram; downside momentum is building"
        }
        MacdState::Mixed => "MACD is oscillating without a clear direction",
    }
    .to_string();
    score += match macd_state {
        MacdState::BullishCross => t.macd_bullish_bonus,
        MacdState::Mixed => t.macd_mixed_bonus,
        MacdState::BearishCross => t.macd_bearish_bonus,
    };

    // ── Volume ────────────────────────────────────────────────────────────
    let (volume_state, volume_comment) = match ind.volume_change_pct {
        Some(c) if c > t.volume_expanding_pct => (
            VolumeState::Expanding,
            format!("Volume is up {c:.1}% on its 5-day mean; market activity is rising"),
        ),
        Some(c) if c < t.volume_contracting_pct => (
            VolumeState::Contracting,
            format!(
                "Volume is down {:.1}% on its 5-day mean; market activity is fading",
                c.abs()
            ),
        ),
        _ => (VolumeState::Normal, "Volume is at a normal level".to_string()),
    };
    score += match volume_state {
        VolumeState::Expanding => t.volume_expanding_bonus,
        VolumeState::Normal => t.volume_normal_bonus,
        VolumeState::Contracting => t.volume_contracting_bonus,
    };

    let analysis = TechnicalAnalysis {
        current_price: price,
        indicators: ind.clone(),
        momentum,
        momentum_comment,
        band_position,
        band_comment,
        ma_alignment,
        ma_comment,
        macd_state,
        macd_comment,
        volume_state,
        volume_comment,
    };

    Ok((analysis, score))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::bars_from_closes;
    use crate::indicators::MovingAverage;
    use crate::runtime_config::IndicatorParams;
    use crate::types::AnalysisStatus;

    fn snapshot(closes: &[f64]) -> IndicatorSet {
        IndicatorSet::from_bars(&bars_from_closes(closes), &IndicatorParams::default())
    }

    fn manual() -> IndicatorSet {
        IndicatorSet {
            latest_close: Some(10.0),
            rsi: Some(50.0),
            band_upper: Some(11.0),
            band_middle: Some(10.0),
            band_lower: Some(9.0),
            moving_averages: [5, 10, 20, 50]
                .iter()
                .map(|&period| MovingAverage {
                    period,
                    value: Some(10.0),
                })
                .collect(),
            macd: Some(0.0),
            macd_signal: Some(0.0),
            macd_histogram: Some(0.0),
            volume_ma_short: Some(100.0),
            volume_ma_long: Some(100.0),
            volume_change_pct: Some(0.0),
            ..IndicatorSet::default()
        }
    }

    #[test]
    fn empty_indicators_is_no_data() {
        let sub = analyze(&IndicatorSet::default(), &TechnicalThresholds::default(), 50.0);
        assert_eq!(sub.status, AnalysisStatus::NoData);
        assert_eq!(sub.score, 50.0);
    }

    #[test]
    fn constant_closes_take_normal_and_mixed_branches() {
        let sub = analyze(&snapshot(&vec![10.0; 60]), &TechnicalThresholds::default(), 50.0);
        let detail = sub.detail.as_ref().unwrap();
        assert_eq!(detail.momentum, MomentumState::Normal);
        assert_eq!(detail.band_position, BandPosition::Inside);
        assert_eq!(detail.ma_alignment, MaAlignment::Mixed);
        assert_eq!(detail.macd_state, MacdState::Mixed);
        assert_eq!(detail.volume_state, VolumeState::Normal);
        // 50 + 15 (mid RSI) + 10 (inside) + 10 (mixed MA) + 10 (mixed MACD) + 5 (normal volume)
        assert_eq!(sub.score, 100.0);
    }

    #[test]
    fn rising_series_is_bullish_stack_and_overbought() {
        let closes: Vec<f64> = (1..=80).map(|x| 10.0 + x as f64 * 0.1).collect();
        let sub = analyze(&snapshot(&closes), &TechnicalThresholds::default(), 50.0);
        let detail = sub.detail.unwrap();
        assert_eq!(detail.momentum, MomentumState::Overbought);
        assert_eq!(detail.ma_alignment, MaAlignment::Bullish);
        assert_eq!(detail.macd_state, MacdState::BullishCross);
        assert!((0.0..=100.0).contains(&sub.score));
    }

    #[test]
    fn falling_series_is_bearish_stack() {
        let closes: Vec<f64> = (1..=80).map(|x| 30.0 - x as f64 * 0.1).collect();
        let sub = analyze(&snapshot(&closes), &TechnicalThresholds::default(), 50.0);
        let detail = sub.detail.unwrap();
        assert_eq!(detail.momentum, MomentumState::Oversold);
        assert_eq!(detail.ma_alignment, MaAlignment::Bearish);
        assert_eq!(detail.macd_state, MacdState::BearishCross);
        // 50 + 5 (extreme RSI) + 10 (inside) + 5 (bearish MA) + 5 (bearish MACD) + 5
        assert_eq!(sub.score, 80.0);
    }

    #[test]
    fn rsi_boundaries_are_inclusive_for_bonus_and_strict_for_status() {
        let t = TechnicalThresholds::default();

        let mut ind = manual();
        ind.rsi = Some(70.0);
        let sub = analyze(&ind, &t, 50.0);
        assert_eq!(sub.detail.as_ref().unwrap().momentum, MomentumState::Normal);
        // 50 + 10 (wide) + 10 + 10 + 10 + 5
        assert_eq!(sub.score, 95.0);

        ind.rsi = Some(70.01);
        let sub = analyze(&ind, &t, 50.0);
        assert_eq!(sub.detail.as_ref().unwrap().momentum, MomentumState::Overbought);
        assert_eq!(sub.score, 90.0);

        ind.rsi = Some(40.0);
        assert_eq!(analyze(&ind, &t, 50.0).score, 100.0);

        ind.rsi = Some(30.0);
        let sub = analyze(&ind, &t, 50.0);
        assert_eq!(sub.detail.as_ref().unwrap().momentum, MomentumState::Normal);
        assert_eq!(sub.score, 95.0);
    }

    #[test]
    fn band_breaks_are_scored() {
        let t = TechnicalThresholds::default();
        let mut ind = manual();

        ind.latest_close = Some(11.5);
        let sub = analyze(&ind, &t, 50.0);
        assert_eq!(sub.detail.as_ref().unwrap().band_position, BandPosition::AboveUpper);
        assert_eq!(sub.score, 95.0);

        ind.latest_close = Some(8.5);
        let sub = analyze(&ind, &t, 50.0);
        assert_eq!(sub.detail.as_ref().unwrap().band_position, BandPosition::BelowLower);
        assert_eq!(sub.score, 100.0);
    }

    #[test]
    fn volume_thresholds_are_strict() {
        let t = TechnicalThresholds::default();
        let mut ind = manual();
        ind.rsi = Some(20.0); // keep the total below the clamp

        ind.volume_change_pct = Some(50.0);
        let base = analyze(&ind, &t, 50.0);
        assert_eq!(base.detail.as_ref().unwrap().volume_state, VolumeState::Normal);

        ind.volume_change_pct = Some(50.5);
        let expanding = analyze(&ind, &t, 50.0);
        assert_eq!(expanding.detail.as_ref().unwrap().volume_state, VolumeState::Expanding);
        assert_eq!(expanding.score - base.score, 5.0);

        ind.volume_change_pct = Some(-31.0);
        let contracting = analyze(&ind, &t, 50.0);
        assert_eq!(contracting.detail.as_ref().unwrap().volume_state, VolumeState::Contracting);
        assert_eq!(base.score - contracting.score, 3.0);
    }

    #[test]
    fn non_finite_indicator_is_error() {
        let mut ind = manual();
        ind.rsi = Some(f64::NAN);
        let sub = analyze(&ind, &TechnicalThresholds::default(), 50.0);
        assert_eq!(sub.status, AnalysisStatus::Error);
        assert_eq!(sub.score, 50.0);
        assert!(sub.detail.is_none());
    }

    #[test]
    fn nan_close_inside_history_is_error() {
        let mut closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        closes.push(f64::NAN);
        closes.extend((1..=40).rev().map(|x| x as f64 * 0.5));
        let ind = snapshot(&closes);
        assert_eq!(ind.non_finite_closes, 1);
        assert!(ind.rsi.is_none());

        let sub = analyze(&ind, &TechnicalThresholds::default(), 50.0);
        assert_eq!(sub.status, AnalysisStatus::Error);
        assert_eq!(sub.score, 50.0);
        assert!(sub.comment.contains("not finite"));
    }

    #[test]
    fn analysis_is_deterministic() {
        let closes: Vec<f64> = (0..70).map(|i| 10.0 + ((i * 7) % 11) as f64 * 0.3).collect();
        let ind = snapshot(&closes);
        let a = analyze(&ind, &TechnicalThresholds::default(), 50.0);
        let b = analyze(&ind, &TechnicalThresholds::default(), 50.0);
        assert_eq!(a, b);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
    }
}
