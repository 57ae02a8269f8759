// =============================================================================
// Eastmoney payload decoding
// =============================================================================
//
// Pure functions from raw JSON / kline strings to domain records.  A row that
// cannot be decoded is skipped with a debug log; only a missing payload makes
// a whole response "no data".
//
// Kline row (fields2=f51..f61):
//   date, open, close, high, low, volume, amount, amplitude, pct, change, turnover
//
// Fund-flow row (fields2=f51..f65):
//   date, main, small, medium, large, super, main%, small%, medium%, large%, super%, ...
// =============================================================================

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;
use tracing::debug;

use crate::types::{BasicInfo, FinancialSnapshot, FundFlowRecord, NewsItem, PriceBar, RealtimeQuote};

/// Numeric field that may arrive as a number, a numeric string, or `"-"`.
fn num(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) if s != "-" => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// `20010827` -> `2001-08-27`; anything else is passed through.
fn listing_date(v: &Value) -> String {
    let raw = text(v);
    match NaiveDate::parse_from_str(&raw, "%Y%m%d") {
        Ok(d) => d.format("%Y-%m-%d").to_string(),
        Err(_) => raw,
    }
}

// ---------------------------------------------------------------------------
// Quote endpoint
// ---------------------------------------------------------------------------

pub fn parse_basic_info(code: &str, data: &Value) -> Option<BasicInfo> {
    let name = text(&data["f58"]);
    if name.is_empty() {
        return None;
    }
    let stock_code = Some(text(&data["f57"]))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| code.to_string());

    Some(BasicInfo {
        stock_code,
        stock_name: name,
        industry: text(&data["f127"]),
        area: text(&data["f128"]),
        listing_date: listing_date(&data["f189"]),
    })
}

pub fn parse_quote(code: &str, data: &Value, fetched_at: DateTime<FixedOffset>) -> Option<RealtimeQuote> {
    let name = text(&data["f58"]);
    let price = num(&data["f43"]);
    if name.is_empty() || price <= 0.0 {
        return None;
    }

    Some(RealtimeQuote {
        stock_code: code.to_string(),
        stock_name: name,
        current_price: price,
        change_percent: num(&data["f170"]),
        change_amount: num(&data["f169"]),
        volume: num(&data["f47"]),
        amount: num(&data["f48"]),
        amplitude: num(&data["f171"]),
        turnover: num(&data["f168"]),
        pe_ttm: num(&data["f162"]),
        pb: num(&data["f167"]),
        total_market_cap: num(&data["f116"]),
        circulating_market_cap: num(&data["f117"]),
        date: fetched_at,
    })
}

// ---------------------------------------------------------------------------
// Kline endpoint
// ---------------------------------------------------------------------------

fn field(parts: &[&str], idx: usize) -> Option<f64> {
    parts.get(idx)?.trim().parse().ok()
}

pub fn parse_kline_row(row: &str) -> Option<PriceBar> {
    let parts: Vec<&str> = row.split(',').collect();
    if parts.len() < 11 {
        return None;
    }
    let date = NaiveDate::parse_from_str(parts[0].trim(), "%Y-%m-%d").ok()?;

    Some(PriceBar {
        date,
        open: field(&parts, 1)?,
        close: field(&parts, 2)?,
        high: field(&parts, 3)?,
        low: field(&parts, 4)?,
        volume: field(&parts, 5)?,
        amount: field(&parts, 6)?,
        amplitude: field(&parts, 7).unwrap_or(0.0),
        pct_change: field(&parts, 8).unwrap_or(0.0),
        price_change: field(&parts, 9).unwrap_or(0.0),
        turnover: field(&parts, 10).unwrap_or(0.0),
    })
}

/// Decode `data.klines`, ascending and unique by date.
pub fn parse_klines(data: &Value) -> Vec<PriceBar> {
    let Some(rows) = data["klines"].as_array() else {
        return Vec::new();
    };

    let mut bars: Vec<PriceBar> = rows
        .iter()
        .filter_map(|row| {
            let raw = row.as_str()?;
            let bar = parse_kline_row(raw);
            if bar.is_none() {
                debug!(row = raw, "skipping malformed kline row");
            }
            bar
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    bars
}

// ---------------------------------------------------------------------------
// Fund-flow endpoint
// ---------------------------------------------------------------------------

pub fn parse_fund_flow_row(row: &str) -> Option<FundFlowRecord> {
    let parts: Vec<&str> = row.split(',').collect();
    if parts.len() < 7 {
        return None;
    }
    let date = NaiveDate::parse_from_str(parts[0].trim(), "%Y-%m-%d").ok()?;
    let main = field(&parts, 1)?;
    let main_pct = field(&parts, 6).unwrap_or(0.0);

    Some(FundFlowRecord {
        date,
        main_net_inflow: main,
        small_net_inflow: field(&parts, 2)?,
        medium_net_inflow: field(&parts, 3)?,
        large_net_inflow: field(&parts, 4)?,
        super_net_inflow: field(&parts, 5)?,
        amount: if main_pct != 0.0 {
            main / (main_pct / 100.0)
        } else {
            0.0
        },
    })
}

/// Decode `data.klines` of the fund-flow endpoint, keeping the trailing
/// `keep` records.
pub fn parse_fund_flow(data: &Value, keep: usize) -> Vec<FundFlowRecord> {
    let Some(rows) = data["klines"].as_array() else {
        return Vec::new();
    };

    let mut records: Vec<FundFlowRecord> = rows
        .iter()
        .filter_map(|row| {
            let raw = row.as_str()?;
            let rec = parse_fund_flow_row(raw);
            if rec.is_none() {
                debug!(row = raw, "skipping malformed fund flow row");
            }
            rec
        })
        .collect();

    records.sort_by_key(|r| r.date);
    records.dedup_by_key(|r| r.date);
    let start = records.len().saturating_sub(keep);
    records.split_off(start)
}

// ---------------------------------------------------------------------------
// Financial report endpoint
// ---------------------------------------------------------------------------

/// Newest row of the main financial data report.
pub fn parse_financials(body: &Value) -> Option<FinancialSnapshot> {
    let row = body["result"]["data"].as_array()?.first()?;
    let report_date: String = text(&row["REPORT_DATE"]).chars().take(10).collect();
    if report_date.is_empty() {
        return None;
    }

    Some(FinancialSnapshot {
        eps: num(&row["EPSJB"]),
        net_profit_growth_pct: num(&row["PARENTNETPROFITTZ"]),
        revenue_growth_pct: num(&row["TOTALOPERATEREVETZ"]),
        roe_pct: num(&row["ROEJQ"]),
        gross_margin_pct: num(&row["XSMLL"]),
        net_margin_pct: num(&row["XSJLL"]),
        report_date,
    })
}

// ---------------------------------------------------------------------------
// News search endpoint (JSONP)
// ---------------------------------------------------------------------------

/// Body between the first `(` and the last `)` of a JSONP response.
pub fn strip_jsonp(body: &str) -> Option<&str> {
    let start = body.find('(')?;
    let end = body.rfind(')')?;
    (end > start).then(|| &body[start + 1..end])
}

fn strip_highlight(s: &str) -> String {
    s.replace("<em>", "").replace("</em>", "")
}

pub fn parse_news(body: &Value, tz: &FixedOffset) -> Vec<NewsItem> {
    let Some(items) = body["result"]["cmsArticleWebOld"].as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let raw_date = item["date"].as_str()?;
            let naive = NaiveDateTime::parse_from_str(raw_date, "%Y-%m-%d %H:%M:%S").ok();
            let Some(publish_time) = naive.and_then(|n| tz.from_local_datetime(&n).single()) else {
                debug!(date = raw_date, "skipping news item with bad timestamp");
                return None;
            };
            Some(NewsItem {
                publish_time,
                title: strip_highlight(&text(&item["title"])),
                content: strip_highlight(&text(&item["content"])),
                url: text(&item["url"]),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn beijing() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn basic_info_from_quote_payload() {
        let data = json!({
            "f57": "600519", "f58": "贵州茅台", "f127": "酿酒行业",
            "f128": "贵州板块", "f189": 20010827
        });
        let info = parse_basic_info("600519", &data).unwrap();
        assert_eq!(info.stock_name, "贵州茅台");
        assert_eq!(info.industry, "酿酒行业");
        assert_eq!(info.listing_date, "2001-08-27");
    }

    #[test]
    fn quote_requires_name_and_price() {
        let now = beijing().with_ymd_and_hms(2024, 6, 12, 15, 0, 0).unwrap();
        let data = json!({
            "f58": "贵州茅台", "f43": 1520.5, "f170": 1.25, "f169": 18.8,
            "f47": 23000, "f48": 3.5e9, "f168": 0.18, "f162": "25.3", "f167": 8.1,
            "f116": 1.9e12, "f117": 1.9e12, "f171": "-"
        });
        let q = parse_quote("600519", &data, now).unwrap();
        assert_eq!(q.current_price, 1520.5);
        assert_eq!(q.pe_ttm, 25.3);
        assert_eq!(q.amplitude, 0.0);
        assert_eq!(q.date, now);

        assert!(parse_quote("600519", &json!({"f58": "x", "f43": "-"}), now).is_none());
        assert!(parse_quote("600519", &Value::Null, now).is_none());
    }

    #[test]
    fn klines_sorted_deduped_and_malformed_skipped() {
        let data = json!({ "klines": [
            "2024-06-12,10.0,10.5,10.8,9.9,12000,12600000.0,9.0,5.0,0.5,1.2",
            "2024-06-11,9.8,10.0,10.1,9.7,10000,10000000.0,4.1,2.0,0.2,1.0",
            "garbage",
            "2024-06-12,10.0,10.5,10.8,9.9,12000,12600000.0,9.0,5.0,0.5,1.2",
            "2024-06-13,10.5,x,10.8,9.9,12000,12600000.0,9.0,5.0,0.5,1.2"
        ]});
        let bars = parse_klines(&data);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
        assert_eq!(bars[1].close, 10.5);
        assert_eq!(bars[1].turnover, 1.2);
    }

    #[test]
    fn klines_missing_payload_is_empty() {
        assert!(parse_klines(&Value::Null).is_empty());
    }

    #[test]
    fn fund_flow_amount_derived_from_main_share() {
        let data = json!({ "klines": [
            "2024-06-10,-50000.0,20000.0,30000.0,-10000.0,-40000.0,-5.0,1.0,1.0,1.0,1.0,10.0,0,0,0",
            "2024-06-11,100000.0,-60000.0,-40000.0,70000.0,30000.0,10.0,1.0,1.0,1.0,1.0,10.1,0,0,0",
            "2024-06-12,0.0,0.0,0.0,0.0,0.0,0.0,0,0,0,0,10.2,0,0,0"
        ]});
        let records = parse_fund_flow(&data, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
        assert!((records[0].amount - 1_000_000.0).abs() < 1e-6);
        assert_eq!(records[0].small_net_inflow, -60000.0);
        assert_eq!(records[0].super_net_inflow, 30000.0);
        assert_eq!(records[1].amount, 0.0);
    }

    #[test]
    fn financials_take_newest_row() {
        let body = json!({ "result": { "data": [{
            "REPORT_DATE": "2024-03-31 00:00:00", "EPSJB": 19.16,
            "PARENTNETPROFITTZ": 15.73, "TOTALOPERATEREVETZ": 18.04,
            "ROEJQ": 10.49, "XSMLL": 91.9, "XSJLL": 52.3
        }]}});
        let f = parse_financials(&body).unwrap();
        assert_eq!(f.report_date, "2024-03-31");
        assert_eq!(f.roe_pct, 10.49);
        assert!(parse_financials(&json!({"result": null})).is_none());
    }

    #[test]
    fn jsonp_wrapper_is_removed() {
        assert_eq!(strip_jsonp("cb({\"a\":1});"), Some("{\"a\":1}"));
        assert_eq!(strip_jsonp("no wrapper"), None);
    }

    #[test]
    fn news_items_strip_highlight_tags() {
        let body = json!({ "result": { "cmsArticleWebOld": [
            { "date": "2024-06-11 09:30:00", "title": "<em>600519</em>回购公告",
              "content": "公司<em>回购</em>", "url": "http://x" },
            { "date": "bad", "title": "t", "content": "c", "url": "" }
        ]}});
        let news = parse_news(&body, &beijing());
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].title, "600519回购公告");
        assert_eq!(news[0].content, "公司回购");
        assert_eq!(news[0].publish_time.offset().local_minus_utc(), 8 * 3600);
    }
}
