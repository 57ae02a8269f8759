// =============================================================================
// Analysis Pipeline — fetch, analyze, score, compose, deliver
// =============================================================================
//
//   Fetch mandatory (basic info, quote, daily history)   -> abort: status error
//   Fetch optional (fund flow, financials, news, indices) -> failure: no data
//   Indicators -> five analyzers -> composite score -> report -> HTML -> mail
//                                                          mail rejected: failed
//
// Stages run strictly in sequence.  Nothing escapes `run`: provider errors,
// missing data and panics all end up in the returned `RunOutcome`.
// =============================================================================

use std::panic::AssertUnwindSafe;

use anyhow::{bail, Context, Result};
use futures_util::FutureExt;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::analysis::news::{KeywordClassifier, SentimentClassifier};
use crate::analysis::market_context::IndexSeries;
use crate::analysis::{financial, fund_flow, market_context, news, technical};
use crate::indicators::IndicatorSet;
use crate::market_data::{beijing_now, MarketDataProvider};
use crate::notifier::{report_subject, Notifier};
use crate::report::{compose, render_html, Report, ReportInput};
use crate::runtime_config::RuntimeConfig;
use crate::signals::{effective, ComponentScores, CompositeScorer};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Report produced and delivered.
    Success,
    /// Analysis could not run (mandatory data missing, unexpected fault).
    Error,
    /// Report produced but not delivered.
    Failed,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Error => 1,
            Self::Failed => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub stock_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_date: Option<String>,
    /// The composed report, when analysis got that far.
    #[serde(skip)]
    pub report: Option<Report>,
}

impl RunOutcome {
    /// Outcome for a run that could not start at all.
    pub fn aborted(stock_code: &str, message: String) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            status: RunStatus::Error,
            stock_code: stock_code.to_string(),
            message,
            report_date: None,
            report: None,
        }
    }
}

/// What a run that got past the mandatory checks produced.
struct Completed {
    report: Report,
    report_date: String,
    delivered: bool,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct AnalysisPipeline<P, N> {
    provider: P,
    notifier: N,
    config: RuntimeConfig,
    classifier: Box<dyn SentimentClassifier>,
    recipients: Vec<String>,
}

impl<P: MarketDataProvider, N: Notifier> AnalysisPipeline<P, N> {
    pub fn new(provider: P, notifier: N, config: RuntimeConfig, recipients: Vec<String>) -> Self {
        let classifier = Box::new(KeywordClassifier::from_thresholds(&config.news));
        Self {
            provider,
            notifier,
            config,
            classifier,
            recipients,
        }
    }

    /// Swap the news sentiment classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn SentimentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Analyze one instrument end to end.  Never panics, never errors.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, stock_code: &str) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        info!(stock_code, "analysis run started");

        let outcome = AssertUnwindSafe(self.execute(stock_code)).catch_unwind().await;

        let (status, message, report_date, report) = match outcome {
            Ok(Ok(done)) if done.delivered => (
                RunStatus::Success,
                format!("analysis report for {stock_code} generated and sent"),
                Some(done.report_date),
                Some(done.report),
            ),
            Ok(Ok(done)) => (
                RunStatus::Failed,
                format!("analysis report for {stock_code} generated but mail delivery failed"),
                Some(done.report_date),
                Some(done.report),
            ),
            Ok(Err(e)) => {
                error!(stock_code, error = %format!("{e:#}"), "analysis aborted");
                (RunStatus::Error, format!("{e:#}"), None, None)
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(stock_code, reason = %reason, "analysis run panicked");
                (
                    RunStatus::Error,
                    format!("unexpected failure while analysing {stock_code}: {reason}"),
                    None,
                    None,
                )
            }
        };

        info!(stock_code, status = ?status, "analysis run finished");
        RunOutcome {
            run_id,
            status,
            stock_code: stock_code.to_string(),
            message,
            report_date,
            report,
        }
    }

    /// Log an optional-source failure and degrade it to "no data".
    fn optional<T: Default>(stock_code: &str, source: &str, result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(stock_code, source, error = %format!("{e:#}"), "optional source failed, treating as no data");
                T::default()
            }
        }
    }

    async fn execute(&self, stock_code: &str) -> Result<Completed> {
        let cfg = &self.config;
        let lookback = &cfg.lookback;
        let neutral = cfg.neutral_score;

        // ── 1. Mandatory data ─────────────────────────────────────────────
        let Some(basic) = self
            .provider
            .basic_info(stock_code)
            .await
            .context("failed to fetch basic info")?
        else {
            bail!("basic info unavailable for {stock_code}");
        };

        let Some(quote) = self
            .provider
            .realtime_quote(stock_code)
            .await
            .context("failed to fetch realtime quote")?
        else {
            bail!("realtime quote unavailable for {stock_code}");
        };

        let bars = self
            .provider
            .daily_history(stock_code, lookback.history_days)
            .await
            .context("failed to fetch daily history")?;
        if bars.is_empty() {
            bail!("daily history unavailable for {stock_code}");
        }
        info!(stock_code, stage = "fetch", bars = bars.len(), "mandatory data ready");

        // ── 2. Optional data ──────────────────────────────────────────────
        let flows = Self::optional(
            stock_code,
            "fund_flow",
            self.provider.fund_flow(stock_code, lookback.fund_flow_days).await,
        );
        let snapshot = Self::optional(stock_code, "financials", self.provider.financials(stock_code).await);
        let items = Self::optional(
            stock_code,
            "news",
            self.provider.news(stock_code, lookback.news_days).await,
        );
        let primary = Self::optional(
            stock_code,
            "index",
            self.provider
                .index_history(&cfg.indices.primary.id, lookback.index_days)
                .await,
        );
        let secondary = Self::optional(
            stock_code,
            "index",
            self.provider
                .index_history(&cfg.indices.secondary.id, lookback.index_days)
                .await,
        );

        // ── 3. Analysis ───────────────────────────────────────────────────
        let indicators = IndicatorSet::from_bars(&bars, &cfg.indicators);

        let tech = technical::analyze(&indicators, &cfg.technical, neutral);
        let flow = fund_flow::analyze(&flows, &cfg.fund_flow, neutral);
        let market = market_context::analyze(
            IndexSeries {
                name: &cfg.indices.primary.name,
                bars: &primary,
            },
            IndexSeries {
                name: &cfg.indices.secondary.name,
                bars: &secondary,
            },
            &cfg.market,
            neutral,
        );
        let fin = financial::analyze(snapshot.as_ref(), &cfg.financial, neutral);
        let sentiment = news::analyze(&items, self.classifier.as_ref(), &cfg.news, neutral);

        for (name, status, score) in [
            ("technical", tech.status, tech.score),
            ("fund_flow", flow.status, flow.score),
            ("market", market.status, market.score),
            ("financial", fin.status, fin.score),
            ("news", sentiment.status, sentiment.score),
        ] {
            info!(stock_code, stage = "analyze", analyzer = name, status = %status, score, "sub-analysis done");
        }

        let scorer = CompositeScorer::new(cfg.weights.clone(), cfg.tiers.clone(), neutral);
        let score = scorer.score(&ComponentScores {
            technical: effective(&tech),
            fund_flow: effective(&flow),
            financial: effective(&fin),
            news: effective(&sentiment),
            market: effective(&market),
        });
        info!(
            stock_code,
            stage = "score",
            composite = score.composite,
            recommendation = %score.recommendation,
            "composite score computed"
        );

        // ── 4. Report ─────────────────────────────────────────────────────
        let generated_at = beijing_now();
        let report = compose(&ReportInput {
            stock_code,
            basic: &basic,
            quote: &quote,
            technical: &tech,
            fund_flow: &flow,
            market: &market,
            financial: &fin,
            news: &sentiment,
            score: &score,
            bars: &bars,
            flows: &flows,
            recent_rows: lookback.recent_table_rows,
            max_events: cfg.news.max_events_shown,
            generated_at,
        });
        let html = render_html(&report, stock_code, generated_at);

        // ── 5. Delivery ───────────────────────────────────────────────────
        let subject = report_subject(stock_code, generated_at);
        let delivered = self.notifier.send(&subject, &html, &self.recipients).await;
        if delivered {
            info!(stock_code, stage = "deliver", "report delivered");
        } else {
            warn!(stock_code, stage = "deliver", "report delivery failed");
        }

        Ok(Completed {
            report,
            report_date: generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            delivered,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::bars_from_closes;
    use crate::report::SECTION_HEADINGS;
    use crate::types::{BasicInfo, FinancialSnapshot, FundFlowRecord, NewsItem, PriceBar, RealtimeQuote};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProvider {
        basic: Option<BasicInfo>,
        quote: Option<RealtimeQuote>,
        bars: Vec<PriceBar>,
        flows: Vec<FundFlowRecord>,
        financials: Option<FinancialSnapshot>,
        news: Vec<NewsItem>,
        index: Vec<PriceBar>,
        fail_news: bool,
        panic_on_quote: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeProvider {
        fn complete() -> Self {
            let bars = bars_from_closes(&(0..80).map(|i| 10.0 + i as f64 * 0.05).collect::<Vec<_>>());
            Self {
                basic: Some(BasicInfo {
                    stock_code: "002511".to_string(),
                    stock_name: "Demo Paper".to_string(),
                    industry: "Paper".to_string(),
                    area: String::new(),
                    listing_date: String::new(),
                }),
                quote: Some(RealtimeQuote {
                    stock_code: "002511".to_string(),
                    stock_name: "Demo Paper".to_string(),
                    current_price: 13.95,
                    change_percent: 0.36,
                    change_amount: 0.05,
                    volume: 10_000.0,
                    amount: 1.4e7,
                    amplitude: 2.0,
                    turnover: 1.5,
                    pe_ttm: 20.0,
                    pb: 2.0,
                    total_market_cap: 1.0e10,
                    circulating_market_cap: 8.0e9,
                    date: beijing_now(),
                }),
                flows: bars
                    .iter()
                    .map(|b| FundFlowRecord {
                        date: b.date,
                        main_net_inflow: 600_000.0,
                        super_net_inflow: 400_000.0,
                        large_net_inflow: 200_000.0,
                        medium_net_inflow: -100_000.0,
                        small_net_inflow: -500_000.0,
                        amount: 10_000_000.0,
                    })
                    .collect(),
                financials: Some(FinancialSnapshot {
                    eps: 1.1,
                    net_profit_growth_pct: 20.0,
                    revenue_growth_pct: 12.0,
                    roe_pct: 11.0,
                    gross_margin_pct: 35.0,
                    net_margin_pct: 9.0,
                    report_date: "2024-03-31".to_string(),
                }),
                index: bars.clone(),
                bars,
                ..Self::default()
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn called(&self, call: &str) -> bool {
            self.calls.lock().unwrap().iter().any(|c| *c == call)
        }
    }

    impl MarketDataProvider for FakeProvider {
        async fn basic_info(&self, _code: &str) -> Result<Option<BasicInfo>> {
            self.record("basic_info");
            Ok(self.basic.clone())
        }

        async fn realtime_quote(&self, _code: &str) -> Result<Option<RealtimeQuote>> {
            self.record("realtime_quote");
            if self.panic_on_quote {
                panic!("quote decoder exploded");
            }
            Ok(self.quote.clone())
        }

        async fn daily_history(&self, _code: &str, _days: u32) -> Result<Vec<PriceBar>> {
            self.record("daily_history");
            Ok(self.bars.clone())
        }

        async fn fund_flow(&self, _code: &str, _days: u32) -> Result<Vec<FundFlowRecord>> {
            self.record("fund_flow");
            Ok(self.flows.clone())
        }

        async fn financials(&self, _code: &str) -> Result<Option<FinancialSnapshot>> {
            self.record("financials");
            Ok(self.financials.clone())
        }

        async fn news(&self, _code: &str, _days: u32) -> Result<Vec<NewsItem>> {
            self.record("news");
            if self.fail_news {
                bail!("search endpoint returned 502");
            }
            Ok(self.news.clone())
        }

        async fn index_history(&self, _index_id: &str, _days: u32) -> Result<Vec<PriceBar>> {
            self.record("index_history");
            Ok(self.index.clone())
        }
    }

    struct FakeNotifier {
        accept: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl FakeNotifier {
        fn new(accept: bool) -> Self {
            Self {
                accept,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl Notifier for FakeNotifier {
        async fn send(&self, subject: &str, html_body: &str, _recipients: &[String]) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), html_body.to_string()));
            self.accept
        }
    }

    fn pipeline(provider: FakeProvider, accept: bool) -> AnalysisPipeline<FakeProvider, FakeNotifier> {
        AnalysisPipeline::new(
            provider,
            FakeNotifier::new(accept),
            RuntimeConfig::default(),
            vec!["ops@example.com".to_string()],
        )
    }

    #[tokio::test]
    async fn complete_data_succeeds_and_sends_html() {
        let p = pipeline(FakeProvider::complete(), true);
        let outcome = p.run("002511.SZ").await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.stock_code, "002511.SZ");
        assert!(outcome.report_date.is_some());
        assert_eq!(outcome.report.as_ref().unwrap().headings(), SECTION_HEADINGS.to_vec());

        let sent = p.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.starts_with("002511.SZ Stock Analysis Report - "));
        assert!(sent[0].1.starts_with("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn empty_daily_history_aborts_before_analysis() {
        let mut provider = FakeProvider::complete();
        provider.bars.clear();
        let p = pipeline(provider, true);
        let outcome = p.run("002511.SZ").await;

        assert_eq!(outcome.status, RunStatus::Error);
        assert!(outcome.message.contains("daily history"));
        assert!(outcome.report.is_none());
        assert!(outcome.report_date.is_none());
        assert!(!p.provider.called("fund_flow"));
        assert!(!p.provider.called("news"));
        assert!(p.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_basic_info_names_the_source() {
        let mut provider = FakeProvider::complete();
        provider.basic = None;
        let outcome = pipeline(provider, true).run("002511.SZ").await;
        assert_eq!(outcome.status, RunStatus::Error);
        assert!(outcome.message.contains("basic info"));
    }

    #[tokio::test]
    async fn empty_fund_flow_degrades_to_neutral() {
        let mut provider = FakeProvider::complete();
        provider.flows.clear();
        let p = pipeline(provider, true);
        let outcome = p.run("002511.SZ").await;

        assert_eq!(outcome.status, RunStatus::Success);
        let text = outcome.report.unwrap().to_string();
        assert!(text.contains("fund_flow: 50.00 x 25% (neutral default)"));
        assert!(text.contains("Not available (no data): No fund flow data available"));
    }

    #[tokio::test]
    async fn failing_optional_source_does_not_abort() {
        let mut provider = FakeProvider::complete();
        provider.fail_news = true;
        provider.index.clear();
        let outcome = pipeline(provider, true).run("002511.SZ").await;

        assert_eq!(outcome.status, RunStatus::Success);
        let text = outcome.report.unwrap().to_string();
        assert!(text.contains("news: 50.00 x 15% (neutral default)"));
        assert!(text.contains("market: 50.00 x 10% (neutral default)"));
    }

    #[tokio::test]
    async fn rejected_delivery_is_failed_not_error() {
        let outcome = pipeline(FakeProvider::complete(), false).run("002511.SZ").await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.report_date.is_some());
        assert_eq!(outcome.status.exit_code(), 2);
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let mut provider = FakeProvider::complete();
        provider.panic_on_quote = true;
        let outcome = pipeline(provider, true).run("002511.SZ").await;
        assert_eq!(outcome.status, RunStatus::Error);
        assert!(outcome.message.contains("quote decoder exploded"));
    }

    struct AlwaysPositive;

    impl SentimentClassifier for AlwaysPositive {
        fn classify(&self, _text: &str) -> crate::analysis::news::Sentiment {
            crate::analysis::news::Sentiment::Positive
        }
    }

    #[tokio::test]
    async fn custom_classifier_drives_news_sentiment() {
        let mut provider = FakeProvider::complete();
        provider.news = vec![NewsItem {
            publish_time: beijing_now(),
            title: "Quarterly update".to_string(),
            content: "Routine filing".to_string(),
            url: String::new(),
        }];
        let outcome = pipeline(provider, true)
            .with_classifier(Box::new(AlwaysPositive))
            .run("002511.SZ")
            .await;

        assert_eq!(outcome.status, RunStatus::Success);
        let text = outcome.report.unwrap().to_string();
        assert!(!text.contains("news: 50.00 x 15% (neutral default)"));
    }

    #[tokio::test]
    async fn outcome_serialises_lowercase_status() {
        let outcome = pipeline(FakeProvider::complete(), true).run("002511.SZ").await;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["stock_code"], "002511.SZ");
        assert!(json.get("report").is_none());
        assert_eq!(json["run_id"].as_str().unwrap().len(), 36);
    }
}
