// =============================================================================
// Shared types used across the Stock Pulse pipeline
// =============================================================================
//
// Market records produced by the data provider and the common shape every
// sub-analyzer emits.  Records are plain data: ordering and filtering is the
// provider's job, interpretation is the analyzers' job.
// =============================================================================

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market records
// ---------------------------------------------------------------------------

/// One daily OHLCV bar.  Sequences are ascending by date, one bar per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// Traded volume in lots.
    pub volume: f64,
    /// Traded amount in CNY.
    pub amount: f64,
    #[serde(default)]
    pub amplitude: f64,
    #[serde(default)]
    pub pct_change: f64,
    #[serde(default)]
    pub price_change: f64,
    #[serde(default)]
    pub turnover: f64,
}

/// Daily net fund flow split by order size.  Ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundFlowRecord {
    pub date: NaiveDate,
    pub main_net_inflow: f64,
    pub super_net_inflow: f64,
    pub large_net_inflow: f64,
    pub medium_net_inflow: f64,
    pub small_net_inflow: f64,
    /// Total traded amount of the day; 0 when unknown.
    #[serde(default)]
    pub amount: f64,
}

/// Most recent financial statement abstract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub eps: f64,
    pub net_profit_growth_pct: f64,
    pub revenue_growth_pct: f64,
    pub roe_pct: f64,
    pub gross_margin_pct: f64,
    pub net_margin_pct: f64,
    pub report_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub publish_time: DateTime<FixedOffset>,
    pub title: String,
    pub content: String,
    pub url: String,
}

/// Company identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub stock_code: String,
    pub stock_name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub listing_date: String,
}

/// Latest quote snapshot.  `date` is the Beijing time of the fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeQuote {
    pub stock_code: String,
    pub stock_name: String,
    pub current_price: f64,
    pub change_percent: f64,
    pub change_amount: f64,
    pub volume: f64,
    pub amount: f64,
    pub amplitude: f64,
    pub turnover: f64,
    pub pe_ttm: f64,
    pub pb: f64,
    pub total_market_cap: f64,
    pub circulating_market_cap: f64,
    pub date: DateTime<FixedOffset>,
}

// ---------------------------------------------------------------------------
// Sub-analysis envelope
// ---------------------------------------------------------------------------

/// Outcome class of a single sub-analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    Success,
    NoData,
    Error,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NoData => write!(f, "no data"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Status / comment / score triple emitted by every analyzer, plus the
/// analyzer-specific detail when the analysis succeeded.
///
/// `score` is always within [0, 100].  For `NoData` and `Error` it carries the
/// configured neutral default, and `detail` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubAnalysis<T> {
    pub status: AnalysisStatus,
    pub comment: String,
    pub score: f64,
    pub detail: Option<T>,
}

impl<T> SubAnalysis<T> {
    pub fn success(comment: impl Into<String>, score: f64, detail: T) -> Self {
        Self {
            status: AnalysisStatus::Success,
            comment: comment.into(),
            score: clamp_score(score),
            detail: Some(detail),
        }
    }

    pub fn no_data(comment: impl Into<String>, neutral_score: f64) -> Self {
        Self {
            status: AnalysisStatus::NoData,
            comment: comment.into(),
            score: clamp_score(neutral_score),
            detail: None,
        }
    }

    pub fn error(comment: impl Into<String>, neutral_score: f64) -> Self {
        Self {
            status: AnalysisStatus::Error,
            comment: comment.into(),
            score: clamp_score(neutral_score),
            detail: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }
}

/// Clamp a score into [0, 100].  NaN collapses to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(-12.0), 0.0);
        assert_eq!(clamp_score(130.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(f64::INFINITY), 100.0);
        assert_eq!(clamp_score(64.5), 64.5);
    }

    #[test]
    fn no_data_carries_neutral_score_and_no_detail() {
        let sub: SubAnalysis<()> = SubAnalysis::no_data("nothing", 50.0);
        assert_eq!(sub.status, AnalysisStatus::NoData);
        assert_eq!(sub.score, 50.0);
        assert!(sub.detail.is_none());
        assert!(!sub.is_success());
    }

    #[test]
    fn status_display() {
        assert_eq!(AnalysisStatus::NoData.to_string(), "no data");
        assert_eq!(AnalysisStatus::Error.to_string(), "error");
    }
}
