// =============================================================================
// Runtime Configuration — every heuristic constant of the scoring pipeline
// =============================================================================
//
// Thresholds, bonus tables, composite weights, tier boundaries and keyword
// lists all live here so they can be tuned from a JSON file without touching
// the analyzers, and so tests can inject exact boundary values.
//
// All fields carry serde defaults: an empty `{}` file yields the stock
// configuration, and adding fields never breaks loading an older file.
// Persistence uses an atomic tmp + rename pattern.
// =============================================================================

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_neutral_score() -> f64 {
    50.0
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

// =============================================================================
// Tier tables
// =============================================================================

/// One step of a tier table: values strictly greater than `above` earn `bonus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub above: f64,
    pub bonus: f64,
}

/// Descending list of strict `>` thresholds plus the bonus for everything at
/// or below the last threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    pub tiers: Vec<Tier>,
    pub floor_bonus: f64,
}

impl TierTable {
    pub fn new(tiers: &[(f64, f64)], floor_bonus: f64) -> Self {
        Self {
            tiers: tiers
                .iter()
                .map(|&(above, bonus)| Tier { above, bonus })
                .collect(),
            floor_bonus,
        }
    }

    /// Index of the first tier whose threshold `value` strictly exceeds;
    /// `tiers.len()` is the floor.  NaN always lands on the floor.
    pub fn classify(&self, value: f64) -> usize {
        self.tiers
            .iter()
            .position(|t| value > t.above)
            .unwrap_or(self.tiers.len())
    }

    pub fn bonus_at(&self, index: usize) -> f64 {
        self.tiers
            .get(index)
            .map(|t| t.bonus)
            .unwrap_or(self.floor_bonus)
    }

    pub fn bonus(&self, value: f64) -> f64 {
        self.bonus_at(self.classify(value))
    }

    fn validate(&self, name: &str) -> Result<()> {
        for pair in self.tiers.windows(2) {
            ensure!(
                pair[0].above > pair[1].above,
                "{name}: tier thresholds must be strictly descending ({} then {})",
                pair[0].above,
                pair[1].above
            );
        }
        Ok(())
    }
}

// =============================================================================
// Lookback windows & indices
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookbackWindows {
    /// Calendar days of daily bars fetched for the instrument.
    pub history_days: u32,
    /// Number of trailing fund-flow records kept.
    pub fund_flow_days: u32,
    /// Trailing window (days) for news items.
    pub news_days: u32,
    /// Calendar days of daily bars fetched for each market index.
    pub index_days: u32,
    /// Rows in the recent-trading-day table.
    pub recent_table_rows: usize,
}

impl Default for LookbackWindows {
    fn default() -> Self {
        Self {
            history_days: 365,
            fund_flow_days: 30,
            news_days: 7,
            index_days: 365,
            recent_table_rows: 5,
        }
    }
}

/// A broad market index used by the market-context analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Provider identifier, e.g. `1.000001`.
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketIndices {
    pub primary: IndexSpec,
    pub secondary: IndexSpec,
}

impl Default for MarketIndices {
    fn default() -> Self {
        Self {
            primary: IndexSpec {
                id: "1.000001".to_string(),
                name: "SSE Composite".to_string(),
            },
            secondary: IndexSpec {
                id: "0.399001".to_string(),
                name: "SZSE Component".to_string(),
            },
        }
    }
}

// =============================================================================
// Indicator parameters
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub band_period: usize,
    pub band_std_multiplier: f64,
    /// Moving-average periods: short, medium, long, trend.
    pub ma_periods: [usize; 4],
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_ma_short: usize,
    pub volume_ma_long: usize,
    pub pivot_lookback: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            band_period: 20,
            band_std_multiplier: 2.0,
            ma_periods: [5, 10, 20, 50],
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_ma_short: 5,
            volume_ma_long: 10,
            pivot_lookback: 20,
        }
    }
}

// =============================================================================
// Analyzer thresholds
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalThresholds {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Inclusive mid-range band.
    pub rsi_mid_low: f64,
    pub rsi_mid_high: f64,
    pub rsi_mid_bonus: f64,
    pub rsi_wide_bonus: f64,
    pub rsi_extreme_bonus: f64,

    pub band_above_upper_bonus: f64,
    pub band_below_lower_bonus: f64,
    pub band_inside_bonus: f64,

    pub ma_bullish_bonus: f64,
    pub ma_mixed_bonus: f64,
    pub ma_bearish_bonus: f64,

    pub macd_bullish_bonus: f64,
    pub macd_mixed_bonus: f64,
    pub macd_bearish_bonus: f64,

    /// Latest volume vs its short mean, in percent.
    pub volume_expanding_pct: f64,
    pub volume_contracting_pct: f64,
    pub volume_expanding_bonus: f64,
    pub volume_normal_bonus: f64,
    pub volume_contracting_bonus: f64,
}

impl Default for TechnicalThresholds {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_mid_low: 40.0,
            rsi_mid_high: 60.0,
            rsi_mid_bonus: 15.0,
            rsi_wide_bonus: 10.0,
            rsi_extreme_bonus: 5.0,
            band_above_upper_bonus: 5.0,
            band_below_lower_bonus: 15.0,
            band_inside_bonus: 10.0,
            ma_bullish_bonus: 20.0,
            ma_mixed_bonus: 10.0,
            ma_bearish_bonus: 5.0,
            macd_bullish_bonus: 15.0,
            macd_mixed_bonus: 10.0,
            macd_bearish_bonus: 5.0,
            volume_expanding_pct: 50.0,
            volume_contracting_pct: -30.0,
            volume_expanding_bonus: 10.0,
            volume_normal_bonus: 5.0,
            volume_contracting_bonus: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FundFlowThresholds {
    /// Records averaged for the trailing main-inflow mean.
    pub trailing_days: usize,
    /// Bonus by main-inflow ratio when main money flows in.
    pub inflow_ratio_tiers: TierTable,
    /// Bonus by the *negated* ratio when main money flows out.
    pub outflow_ratio_tiers: TierTable,
    pub institutional_agree_in_bonus: f64,
    pub institutional_agree_out_bonus: f64,
    pub institutional_mixed_bonus: f64,
    pub retail_agree_in_bonus: f64,
    pub retail_agree_out_bonus: f64,
    pub retail_mixed_bonus: f64,
}

impl Default for FundFlowThresholds {
    fn default() -> Self {
        Self {
            trailing_days: 5,
            inflow_ratio_tiers: TierTable::new(&[(10.0, 25.0), (5.0, 20.0)], 15.0),
            outflow_ratio_tiers: TierTable::new(&[(10.0, 5.0), (5.0, 10.0)], 15.0),
            institutional_agree_in_bonus: 20.0,
            institutional_agree_out_bonus: 5.0,
            institutional_mixed_bonus: 10.0,
            retail_agree_in_bonus: 10.0,
            retail_agree_out_bonus: 5.0,
            retail_mixed_bonus: 7.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketThresholds {
    pub ma_short: usize,
    pub ma_long: usize,
    pub bull_bonus: f64,
    pub mixed_bonus: f64,
    pub bear_bonus: f64,
    /// Fixed placeholder; industry-level data is not modelled.
    pub industry_bonus: f64,
}

impl Default for MarketThresholds {
    fn default() -> Self {
        Self {
            ma_short: 5,
            ma_long: 20,
            bull_bonus: 20.0,
            mixed_bonus: 10.0,
            bear_bonus: 5.0,
            industry_bonus: 10.0,
        }
    }
}

/// Four-tier tables for the financial snapshot.  Tier index 0..=3 maps to
/// excellent / good / fair / weak labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialThresholds {
    pub profit_growth: TierTable,
    pub revenue_growth: TierTable,
    pub roe: TierTable,
    pub gross_margin: TierTable,
}

impl Default for FinancialThresholds {
    fn default() -> Self {
        Self {
            profit_growth: TierTable::new(&[(30.0, 20.0), (15.0, 15.0), (0.0, 10.0)], 5.0),
            revenue_growth: TierTable::new(&[(30.0, 15.0), (15.0, 10.0), (0.0, 5.0)], 2.0),
            roe: TierTable::new(&[(15.0, 15.0), (10.0, 10.0), (5.0, 5.0)], 2.0),
            gross_margin: TierTable::new(&[(40.0, 10.0), (30.0, 7.0), (20.0, 5.0)], 3.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsThresholds {
    pub positive_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub bullish_event_keywords: Vec<String>,
    pub bearish_event_keywords: Vec<String>,
    /// Share (percent) of one polarity above which the sentiment is decided.
    pub dominance_pct: f64,
    /// Bonus by positive-news share.
    pub sentiment_tiers: TierTable,
    pub bullish_event_bonus: f64,
    pub bearish_event_penalty: f64,
    /// Major events listed in the report.
    pub max_events_shown: usize,
}

impl Default for NewsThresholds {
    fn default() -> Self {
        Self {
            positive_keywords: words(&[
                "上涨", "增长", "利好", "增持", "回购", "业绩", "突破", "创新高", "战略合作", "扩张",
            ]),
            negative_keywords: words(&[
                "下跌", "亏损", "利空", "减持", "诉讼", "监管", "处罚", "风险", "违约", "暂停",
            ]),
            bullish_event_keywords: words(&["回购", "增持", "战略合作", "业绩预增"]),
            bearish_event_keywords: words(&["减持", "诉讼", "监管", "处罚"]),
            dominance_pct: 60.0,
            sentiment_tiers: TierTable::new(&[(60.0, 20.0), (40.0, 15.0), (30.0, 10.0)], 5.0),
            bullish_event_bonus: 10.0,
            bearish_event_penalty: 5.0,
            max_events_shown: 3,
        }
    }
}

// =============================================================================
// Composite policy
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub technical: f64,
    pub fund_flow: f64,
    pub financial: f64,
    pub news: f64,
    pub market: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            technical: 0.30,
            fund_flow: 0.25,
            financial: 0.20,
            news: 0.15,
            market: 0.10,
        }
    }
}

impl CompositeWeights {
    pub fn sum(&self) -> f64 {
        self.technical + self.fund_flow + self.financial + self.news + self.market
    }
}

/// Inclusive (`>=`) lower bounds of the recommendation tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierBoundaries {
    pub strong_buy: f64,
    pub buy: f64,
    pub neutral: f64,
}

impl Default for TierBoundaries {
    fn default() -> Self {
        Self {
            strong_buy: 80.0,
            buy: 65.0,
            neutral: 50.0,
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for a Stock Pulse run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Root for runtime artefacts (logs live in `<data_dir>/logs`).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Per-request HTTP timeout for the market data provider.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Score substituted for any sub-analysis without a usable result.
    #[serde(default = "default_neutral_score")]
    pub neutral_score: f64,

    #[serde(default)]
    pub lookback: LookbackWindows,

    #[serde(default)]
    pub indices: MarketIndices,

    #[serde(default)]
    pub indicators: IndicatorParams,

    #[serde(default)]
    pub technical: TechnicalThresholds,

    #[serde(default)]
    pub fund_flow: FundFlowThresholds,

    #[serde(default)]
    pub market: MarketThresholds,

    #[serde(default)]
    pub financial: FinancialThresholds,

    #[serde(default)]
    pub news: NewsThresholds,

    #[serde(default)]
    pub weights: CompositeWeights,

    #[serde(default)]
    pub tiers: TierBoundaries,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            request_timeout_secs: default_request_timeout_secs(),
            neutral_score: default_neutral_score(),
            lookback: LookbackWindows::default(),
            indices: MarketIndices::default(),
            indicators: IndicatorParams::default(),
            technical: TechnicalThresholds::default(),
            fund_flow: FundFlowThresholds::default(),
            market: MarketThresholds::default(),
            financial: FinancialThresholds::default(),
            news: NewsThresholds::default(),
            weights: CompositeWeights::default(),
            tiers: TierBoundaries::default(),
        }
    }
}

impl RuntimeConfig {
    /// `data_dir` from the file at `path`, or the default when the file is
    /// absent or unreadable.  Used to place the log file before logging is up.
    pub fn data_dir_hint(path: impl AsRef<Path>) -> String {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|v| v.get("data_dir")?.as_str().map(str::to_string))
            .unwrap_or_else(default_data_dir)
    }

    /// Load and validate configuration from a JSON file at `path`.
    ///
    /// Returns an error when the file is missing, malformed or fails
    /// validation, so the caller can fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid runtime config in {}", path.display()))?;

        info!(path = %path.display(), "runtime config loaded");
        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Reject policy tables that would make the scoring meaningless.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        for (name, value) in [
            ("technical", w.technical),
            ("fund_flow", w.fund_flow),
            ("financial", w.financial),
            ("news", w.news),
            ("market", w.market),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "weight {name} must be a non-negative number, got {value}"
            );
        }
        ensure!(
            (w.sum() - 1.0).abs() <= 1e-6,
            "composite weights must sum to 1.0, got {}",
            w.sum()
        );

        let t = &self.tiers;
        ensure!(
            t.strong_buy > t.buy && t.buy > t.neutral,
            "tier boundaries must be strictly descending: strong_buy {} > buy {} > neutral {}",
            t.strong_buy,
            t.buy,
            t.neutral
        );

        ensure!(
            (0.0..=100.0).contains(&self.neutral_score),
            "neutral_score must lie in [0, 100], got {}",
            self.neutral_score
        );

        self.fund_flow.inflow_ratio_tiers.validate("fund_flow.inflow_ratio_tiers")?;
        self.fund_flow.outflow_ratio_tiers.validate("fund_flow.outflow_ratio_tiers")?;
        self.financial.profit_growth.validate("financial.profit_growth")?;
        self.financial.revenue_growth.validate("financial.revenue_growth")?;
        self.financial.roe.validate("financial.roe")?;
        self.financial.gross_margin.validate("financial.gross_margin")?;
        self.news.sentiment_tiers.validate("news.sentiment_tiers")?;

        let p = &self.indicators;
        ensure!(
            p.rsi_period > 0 && p.band_period > 0 && p.pivot_lookback > 0,
            "indicator periods must be positive"
        );
        ensure!(
            p.ma_periods.iter().all(|&n| n > 0),
            "moving-average periods must be positive"
        );
        ensure!(
            p.macd_fast > 0 && p.macd_slow > p.macd_fast && p.macd_signal > 0,
            "MACD periods must satisfy 0 < fast < slow and signal > 0"
        );

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = RuntimeConfig::default();
        cfg.validate().unwrap();
        assert!((cfg.weights.sum() - 1.0).abs() < 1e-12);
        assert_eq!(cfg.tiers.strong_buy, 80.0);
        assert_eq!(cfg.lookback.news_days, 7);
        assert_eq!(cfg.indices.secondary.id, "0.399001");
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.data_dir, "data");
        assert_eq!(cfg.neutral_score, 50.0);
        assert_eq!(cfg.indicators.ma_periods, [5, 10, 20, 50]);
        assert_eq!(cfg.technical.rsi_overbought, 70.0);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "weights": { "technical": 0.5, "market": 0.0, "news": 0.05 },
                        "technical": { "rsi_overbought": 80.0 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.weights.technical, 0.5);
        assert_eq!(cfg.weights.fund_flow, 0.25);
        assert_eq!(cfg.technical.rsi_overbought, 80.0);
        assert_eq!(cfg.technical.rsi_oversold, 30.0);
        cfg.validate().unwrap();
    }

    #[test]
    fn weights_not_summing_to_one_rejected() {
        let mut cfg = RuntimeConfig::default();
        cfg.weights.news = 0.30;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_weight_rejected() {
        let mut cfg = RuntimeConfig::default();
        cfg.weights.technical = 0.45;
        cfg.weights.market = -0.05;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unordered_tiers_rejected() {
        let mut cfg = RuntimeConfig::default();
        cfg.tiers.buy = 85.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.financial.roe = TierTable::new(&[(5.0, 5.0), (10.0, 10.0)], 2.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tier_table_uses_strict_greater_than() {
        let table = TierTable::new(&[(30.0, 20.0), (15.0, 15.0), (0.0, 10.0)], 5.0);
        assert_eq!(table.bonus(30.01), 20.0);
        assert_eq!(table.bonus(30.0), 15.0);
        assert_eq!(table.bonus(15.0), 10.0);
        assert_eq!(table.bonus(0.0), 5.0);
        assert_eq!(table.bonus(-3.0), 5.0);
        assert_eq!(table.classify(f64::NAN), 3);
    }

    #[test]
    fn save_then_load_keeps_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_pulse.json");

        let mut cfg = RuntimeConfig::default();
        cfg.tiers.buy = 70.0;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.tiers.buy, 70.0);
        assert_eq!(loaded.news.positive_keywords, cfg.news.positive_keywords);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RuntimeConfig::load(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn data_dir_hint_reads_file_or_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_pulse.json");
        assert_eq!(RuntimeConfig::data_dir_hint(&path), "data");

        std::fs::write(&path, r#"{"data_dir": "/var/lib/pulse", "neutral_score": "bad"}"#).unwrap();
        assert_eq!(RuntimeConfig::data_dir_hint(&path), "/var/lib/pulse");

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(RuntimeConfig::data_dir_hint(&path), "data");
    }
}
