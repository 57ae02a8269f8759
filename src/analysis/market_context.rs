// =============================================================================
// Market Context — broad index trend
// =============================================================================
//
// Each index is "up" when its short MA sits above its long MA and "down" when
// below.  Both up is a bull market, both down a bear market, anything else is
// a range.  Industry data is not modelled; a fixed bonus stands in for it.
// =============================================================================

use anyhow::{ensure, Result};
use serde::Serialize;

use crate::indicators::sma::sma_last;
use crate::runtime_config::MarketThresholds;
use crate::types::{PriceBar, SubAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketRegime {
    Bull,
    Bear,
    Range,
}

impl MarketRegime {
    pub fn label(self) -> &'static str {
        match self {
            Self::Bull => "bull market",
            Self::Bear => "bear market",
            Self::Range => "range-bound",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexTrend {
    pub name: String,
    pub latest_close: f64,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub direction: IndexDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketContextAnalysis {
    pub primary: IndexTrend,
    pub secondary: IndexTrend,
    pub regime: MarketRegime,
    pub market_comment: String,
    pub industry_comment: String,
}

/// A named index history, ascending by date.
pub struct IndexSeries<'a> {
    pub name: &'a str,
    pub bars: &'a [PriceBar],
}

pub fn analyze(
    primary: IndexSeries<'_>,
    secondary: IndexSeries<'_>,
    thresholds: &MarketThresholds,
    neutral_score: f64,
) -> SubAnalysis<MarketContextAnalysis> {
    if primary.bars.is_empty() || secondary.bars.is_empty() {
        return SubAnalysis::no_data(
            "Market index data is unavailable; market context could not be assessed",
            neutral_score,
        );
    }

    match evaluate(&primary, &secondary, thresholds) {
        Ok((analysis, score)) => {
            let comment = format!("Broad market is {}", analysis.regime.label());
            SubAnalysis::success(comment, score, analysis)
        }
        Err(e) => SubAnalysis::error(format!("Market context analysis failed: {e}"), neutral_score),
    }
}

fn index_trend(series: &IndexSeries<'_>, t: &MarketThresholds) -> Result<IndexTrend> {
    let closes: Vec<f64> = series.bars.iter().map(|b| b.close).collect();
    ensure!(
        closes.iter().all(|c| c.is_finite()),
        "{} has non-finite closes",
        series.name
    );

    let ma_short = sma_last(&closes, t.ma_short);
    let ma_long = sma_last(&closes, t.ma_long);
    let direction = match (ma_short, ma_long) {
        (Some(s), Some(l)) if s > l => IndexDirection::Up,
        (Some(s), Some(l)) if s < l => IndexDirection::Down,
        _ => IndexDirection::Flat,
    };

    Ok(IndexTrend {
        name: series.name.to_string(),
        latest_close: closes.last().copied().unwrap_or_default(),
        ma_short,
        ma_long,
        direction,
    })
}

fn evaluate(
    primary: &IndexSeries<'_>,
    secondary: &IndexSeries<'_>,
    t: &MarketThresholds,
) -> Result<(MarketContextAnalysis, f64)> {
    let primary = index_trend(primary, t)?;
    let secondary = index_trend(secondary, t)?;

    let regime = match (primary.direction, secondary.direction) {
        (IndexDirection::Up, IndexDirection::Up) => MarketRegime::Bull,
        (IndexDirection::Down, IndexDirection::Down) => MarketRegime::Bear,
        _ => MarketRegime::Range,
    };

    let market_comment = match regime {
        MarketRegime::Bull => format!(
            "Both major indices have their {}-day average above the {}-day; the market is in an uptrend",
            t.ma_short, t.ma_long
        ),
        MarketRegime::Bear => format!(
            "Both major indices have their {}-day average below the {}-day; the market is in a downtrend",
            t.ma_short, t.ma_long
        ),
        MarketRegime::Range => "The major indices diverge; the market is consolidating".to_string(),
    };

    let mut score = 50.0;
    score += match regime {
        MarketRegime::Bull => t.bull_bonus,
        MarketRegime::Range => t.mixed_bonus,
        MarketRegime::Bear => t.bear_bonus,
    };
    score += t.industry_bonus;

    let analysis = MarketContextAnalysis {
        primary,
        secondary,
        regime,
        market_comment,
        industry_comment: "Industry trend is neutral; industry-level data is not analysed".to_string(),
    };

    Ok((analysis, score))
}
