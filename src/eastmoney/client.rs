// =============================================================================
// Eastmoney HTTP Client — public quote, kline, fund-flow, F10 and news APIs
// =============================================================================
//
// No credentials are involved; every endpoint is a plain GET.  Responses are
// decoded by the pure functions in `parse`, so this file only deals with
// URLs, transport errors and HTTP status codes.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::parse;
use crate::market_data::{beijing, beijing_now, secid, secucode, standardize, MarketDataProvider};
use crate::types::{BasicInfo, FinancialSnapshot, FundFlowRecord, NewsItem, PriceBar, RealtimeQuote};

const QUOTE_URL: &str = "https://push2.eastmoney.com/api/qt/stock/get";
const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const FUND_FLOW_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/fflow/daykline/get";
const DATACENTER_URL: &str = "https://datacenter.eastmoney.com/securities/api/data/v1/get";
const SEARCH_URL: &str = "https://search-api-web.eastmoney.com/search/jsonp";

const QUOTE_FIELDS: &str =
    "f43,f47,f48,f57,f58,f116,f117,f127,f128,f162,f167,f168,f169,f170,f171,f189";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Max news items requested per search.
const NEWS_PAGE_SIZE: u32 = 50;

#[derive(Clone)]
pub struct EastmoneyClient {
    client: reqwest::Client,
}

impl EastmoneyClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        debug!(timeout_secs, "EastmoneyClient initialised");
        Ok(Self { client })
    }

    // -------------------------------------------------------------------------
    // Transport helpers
    // -------------------------------------------------------------------------

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read response body from {url}"))?;

        if !status.is_success() {
            anyhow::bail!("GET {} returned {}: {}", url, status, body);
        }
        Ok(body)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let body = self.get_text(url, query).await?;
        serde_json::from_str(&body).with_context(|| format!("failed to parse JSON from {url}"))
    }

    async fn quote_payload(&self, code: &str) -> Result<Value> {
        let query = [
            ("secid", secid(code)),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fields", QUOTE_FIELDS.to_string()),
        ];
        let body = self.get_json(QUOTE_URL, &query).await?;
        Ok(body["data"].clone())
    }

    async fn klines(&self, secid: String, days: u32) -> Result<Vec<PriceBar>> {
        let begin = (beijing_now() - ChronoDuration::days(i64::from(days)))
            .format("%Y%m%d")
            .to_string();
        let query = [
            ("secid", secid),
            ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61".to_string()),
            ("klt", "101".to_string()),
            ("fqt", "1".to_string()),
            ("beg", begin),
            ("end", "20500101".to_string()),
        ];
        let body = self.get_json(KLINE_URL, &query).await?;
        let bars = parse::parse_klines(&body["data"]);
        debug!(count = bars.len(), "klines decoded");
        Ok(bars)
    }
}

// =============================================================================
// MarketDataProvider
// =============================================================================

impl MarketDataProvider for EastmoneyClient {
    #[instrument(skip(self), name = "eastmoney::basic_info")]
    async fn basic_info(&self, code: &str) -> Result<Option<BasicInfo>> {
        let data = self.quote_payload(code).await?;
        Ok(parse::parse_basic_info(&standardize(code), &data))
    }

    #[instrument(skip(self), name = "eastmoney::realtime_quote")]
    async fn realtime_quote(&self, code: &str) -> Result<Option<RealtimeQuote>> {
        let data = self.quote_payload(code).await?;
        Ok(parse::parse_quote(&standardize(code), &data, beijing_now()))
    }

    #[instrument(skip(self), name = "eastmoney::daily_history")]
    async fn daily_history(&self, code: &str, days: u32) -> Result<Vec<PriceBar>> {
        self.klines(secid(code), days).await
    }

    #[instrument(skip(self), name = "eastmoney::fund_flow")]
    async fn fund_flow(&self, code: &str, days: u32) -> Result<Vec<FundFlowRecord>> {
        let query = [
            ("lmt", "0".to_string()),
            ("klt", "101".to_string()),
            ("secid", secid(code)),
            ("fields1", "f1,f2,f3,f7".to_string()),
            (
                "fields2",
                "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61,f62,f63,f64,f65".to_string(),
            ),
        ];
        let body = self.get_json(FUND_FLOW_URL, &query).await?;
        let records = parse::parse_fund_flow(&body["data"], days as usize);
        debug!(count = records.len(), "fund flow decoded");
        Ok(records)
    }

    #[instrument(skip(self), name = "eastmoney::financials")]
    async fn financials(&self, code: &str) -> Result<Option<FinancialSnapshot>> {
        let query = [
            ("reportName", "RPT_F10_FINANCE_MAINFINADATA".to_string()),
            ("columns", "ALL".to_string()),
            ("filter", format!("(SECUCODE=\"{}\")", secucode(code))),
            ("pageNumber", "1".to_string()),
            ("pageSize", "1".to_string()),
            ("sortColumns", "REPORT_DATE".to_string()),
            ("sortTypes", "-1".to_string()),
        ];
        let body = self.get_json(DATACENTER_URL, &query).await?;
        Ok(parse::parse_financials(&body))
    }

    #[instrument(skip(self), name = "eastmoney::news")]
    async fn news(&self, code: &str, days: u32) -> Result<Vec<NewsItem>> {
        let param = json!({
            "uid": "",
            "keyword": standardize(code),
            "type": ["cmsArticleWebOld"],
            "client": "web",
            "clientType": "web",
            "clientVersion": "curr",
            "param": {
                "cmsArticleWebOld": {
                    "searchScope": "default",
                    "sort": "default",
                    "pageIndex": 1,
                    "pageSize": NEWS_PAGE_SIZE,
                    "preTag": "<em>",
                    "postTag": "</em>"
                }
            }
        });
        let query = [
            ("cb", "jQuery_stock_pulse".to_string()),
            ("param", param.to_string()),
        ];

        let raw = self.get_text(SEARCH_URL, &query).await?;
        let payload = parse::strip_jsonp(&raw).context("news response is not JSONP")?;
        let body: Value = serde_json::from_str(payload).context("failed to parse news JSON")?;

        let items = parse::parse_news(&body, &beijing());
        let recent = crate::analysis::news::recent_news(items, beijing_now(), days);
        debug!(count = recent.len(), "news decoded");
        Ok(recent)
    }

    #[instrument(skip(self), name = "eastmoney::index_history")]
    async fn index_history(&self, index_id: &str, days: u32) -> Result<Vec<PriceBar>> {
        self.klines(index_id.to_string(), days).await
    }
}
