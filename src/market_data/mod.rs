pub mod symbol;

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::types::{BasicInfo, FinancialSnapshot, FundFlowRecord, NewsItem, PriceBar, RealtimeQuote};

pub use symbol::{secid, secucode, standardize};

const BEIJING_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Exchange-local time zone used for quote dates, report stamps and mail
/// subjects.
pub fn beijing() -> FixedOffset {
    FixedOffset::east_opt(BEIJING_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn beijing_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&beijing())
}

/// Source of every record the pipeline consumes.
///
/// `Ok(None)` / `Ok(vec![])` means "no data"; `Err` is a transport or decode
/// failure.  The pipeline treats both the same way for optional sources.
/// Sequences are returned ascending by date except news (newest first).
pub trait MarketDataProvider: Send + Sync {
    fn basic_info(&self, code: &str) -> impl Future<Output = Result<Option<BasicInfo>>> + Send;

    fn realtime_quote(&self, code: &str) -> impl Future<Output = Result<Option<RealtimeQuote>>> + Send;

    fn daily_history(&self, code: &str, days: u32) -> impl Future<Output = Result<Vec<PriceBar>>> + Send;

    fn fund_flow(&self, code: &str, days: u32) -> impl Future<Output = Result<Vec<FundFlowRecord>>> + Send;

    fn financials(&self, code: &str) -> impl Future<Output = Result<Option<FinancialSnapshot>>> + Send;

    fn news(&self, code: &str, days: u32) -> impl Future<Output = Result<Vec<NewsItem>>> + Send;

    /// `index_id` is a fully qualified provider id such as `1.000001`.
    fn index_history(&self, index_id: &str, days: u32) -> impl Future<Output = Result<Vec<PriceBar>>> + Send;
}
