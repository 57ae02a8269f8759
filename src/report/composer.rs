// =============================================================================
// Report Composer — analyzer outputs to a fixed-section narrative
// =============================================================================
//
// Formatting conventions:
//   prices / scores   2 decimals
//   percentages       2 decimals + "%"
//   fund flows        10k CNY
//   volume            10k lots
//   amount / cap      100M CNY
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};

use super::{Report, Section, SECTION_HEADINGS};
use crate::analysis::fund_flow::FlowDirection;
use crate::analysis::market_context::IndexTrend;
use crate::analysis::technical::{BandPosition, MaAlignment, MomentumState};
use crate::analysis::{FinancialAnalysis, FundFlowAnalysis, MarketContextAnalysis, NewsAnalysis, TechnicalAnalysis};
use crate::signals::CompositeScore;
use crate::types::{BasicInfo, FundFlowRecord, PriceBar, RealtimeQuote, SubAnalysis};

const RECENT_COLUMNS: [&str; 7] = [
    "Date",
    "Close",
    "Change",
    "Turnover",
    "Volume (10k lots)",
    "Amount (100M)",
    "Main Flow (10k)",
];

const DISCLAIMER: &str = "Some indicators may lag because of data-source limits. This report is \
     generated from heuristic rules and is not investment advice; adjust any action to live quotes.";

/// Everything the composer reads.  Borrowed from the pipeline run.
pub struct ReportInput<'a> {
    pub stock_code: &'a str,
    pub basic: &'a BasicInfo,
    pub quote: &'a RealtimeQuote,
    pub technical: &'a SubAnalysis<TechnicalAnalysis>,
    pub fund_flow: &'a SubAnalysis<FundFlowAnalysis>,
    pub market: &'a SubAnalysis<MarketContextAnalysis>,
    pub financial: &'a SubAnalysis<FinancialAnalysis>,
    pub news: &'a SubAnalysis<NewsAnalysis>,
    pub score: &'a CompositeScore,
    /// Full ascending daily history; the table uses its tail.
    pub bars: &'a [PriceBar],
    pub flows: &'a [FundFlowRecord],
    pub recent_rows: usize,
    pub max_events: usize,
    pub generated_at: DateTime<FixedOffset>,
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn num(v: f64) -> String {
    format!("{v:.2}")
}

fn opt(v: Option<f64>) -> String {
    v.map(num).unwrap_or_else(|| "n/a".to_string())
}

fn pct(v: f64) -> String {
    format!("{v:.2}%")
}

fn wan(v: f64) -> String {
    format!("{:.2}", v / 1e4)
}

fn yi(v: f64) -> String {
    format!("{:.2}", v / 1e8)
}

fn unavailable<T>(sub: &SubAnalysis<T>) -> String {
    format!("Not available ({}): {}", sub.status, sub.comment)
}

// ---------------------------------------------------------------------------
// Recent trading-day rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecentRow {
    pub date: NaiveDate,
    pub close: f64,
    pub pct_change: f64,
    pub turnover: f64,
    pub volume: f64,
    pub amount: f64,
    /// Main net inflow of the same date, 0 when no record exists.
    pub main_flow: f64,
}

/// Last `n` bars, newest first, joined with fund flow by date.
pub fn recent_rows(bars: &[PriceBar], flows: &[FundFlowRecord], n: usize) -> Vec<RecentRow> {
    let by_date: HashMap<NaiveDate, f64> = flows.iter().map(|f| (f.date, f.main_net_inflow)).collect();

    bars[bars.len().saturating_sub(n)..]
        .iter()
        .rev()
        .map(|b| RecentRow {
            date: b.date,
            close: b.close,
            pct_change: b.pct_change,
            turnover: b.turnover,
            volume: b.volume,
            amount: b.amount,
            main_flow: by_date.get(&b.date).copied().unwrap_or(0.0),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn summary(input: &ReportInput<'_>) -> Section {
    let q = input.quote;
    let industry = match input.basic.industry.as_str() {
        "" => "n/a",
        name => name,
    };

    Section::new(SECTION_HEADINGS[0])
        .paragraph(format!(
            "{} ({}), industry: {}. Composite score {} ({}).",
            input.basic.stock_name,
            input.stock_code,
            industry,
            num(input.score.composite),
            input.score.recommendation
        ))
        .bullets(vec![
            format!("Latest price: {} ({}, {:+.2})", num(q.current_price), pct(q.change_percent), q.change_amount),
            format!("Turnover: {}", pct(q.turnover)),
            format!("PE (TTM): {}  PB: {}", num(q.pe_ttm), num(q.pb)),
            format!("Total market cap: {} (100M)", yi(q.total_market_cap)),
        ])
}

fn technical_section(input: &ReportInput<'_>) -> Section {
    let section = Section::new(SECTION_HEADINGS[1]);
    let Some(t) = &input.technical.detail else {
        return section.paragraph(unavailable(input.technical));
    };
    let ind = &t.indicators;

    let mas = ind
        .moving_averages
        .iter()
        .map(|m| format!("MA{} {}", m.period, opt(m.value)))
        .collect::<Vec<_>>()
        .join(", ");

    section.paragraph(input.technical.comment.clone()).bullets(vec![
        format!("RSI(14) {}: {} ({})", t.momentum.label(), opt(ind.rsi), t.momentum_comment),
        format!(
            "Bollinger bands {} / {} / {}: price {} {}",
            opt(ind.band_upper),
            opt(ind.band_middle),
            opt(ind.band_lower),
            num(t.current_price),
            t.band_comment
        ),
        format!("Moving averages {}: {}. {}", t.ma_alignment.label(), mas, t.ma_comment),
        format!(
            "MACD {}: line {}, signal {}, histogram {}. {}",
            t.macd_state.label(),
            opt(ind.macd),
            opt(ind.macd_signal),
            opt(ind.macd_histogram),
            t.macd_comment
        ),
    ])
}

fn fund_flow_section(input: &ReportInput<'_>) -> Section {
    let mut section = Section::new(SECTION_HEADINGS[2]);

    section = match &input.fund_flow.detail {
        Some(f) => section.bullets(vec![
            format!(
                "Main funds ({}): {}",
                match f.direction {
                    FlowDirection::Inflow => "net inflow",
                    FlowDirection::Outflow => "net outflow",
                },
                f.main_comment
            ),
            format!("Main flow ratio: {} of turnover on {}", pct(f.main_ratio_pct), f.date),
            format!("Trailing main flow mean: {} (10k CNY)", wan(f.trailing_main_mean)),
            format!("Institutional orders: {}", f.institutional_comment),
            format!("Retail orders: {}", f.retail_comment),
        ]),
        None => section.paragraph(unavailable(input.fund_flow)),
    };

    if let Some(t) = &input.technical.detail {
        let ind = &t.indicators;
        section = section.paragraph(format!(
            "Volume {}: {} (5-day mean {}, 10-day mean {} 10k lots).",
            t.volume_state.label(),
            t.volume_comment,
            opt(ind.volume_ma_short.map(|v| v / 1e4)),
            opt(ind.volume_ma_long.map(|v| v / 1e4)),
        ));
    }
    section
}

fn levels_section(input: &ReportInput<'_>) -> Section {
    let section = Section::new(SECTION_HEADINGS[3]);
    let Some(t) = &input.technical.detail else {
        return section.paragraph(unavailable(input.technical));
    };
    let ind = &t.indicators;

    section.bullets(vec![
        format!("Resistance: {} (pivot projection above the recent range)", opt(ind.resistance)),
        format!("Support: {} (pivot projection below the recent range)", opt(ind.support)),
        format!("Pivot: {}", opt(ind.pivot)),
        format!("Recent high / low: {} / {}", opt(ind.recent_high), opt(ind.recent_low)),
    ])
}

fn financial_section(input: &ReportInput<'_>) -> Section {
    let section = Section::new(SECTION_HEADINGS[4]);
    let Some(f) = &input.financial.detail else {
        return section.paragraph(unavailable(input.financial));
    };

    section
        .paragraph(format!("Latest report: {}. EPS {}, net margin {}.", f.report_date, num(f.eps), pct(f.net_margin_pct)))
        .bullets(vec![
            format!("Profitability: {}", f.profit_growth.comment),
            format!("Revenue: {}", f.revenue_growth.comment),
            format!("Financial health: {}", f.roe.comment),
            format!("Margins: {}", f.gross_margin.comment),
        ])
}

fn index_line(trend: &IndexTrend) -> String {
    format!(
        "{}: close {}, short MA {}, long MA {}",
        trend.name,
        num(trend.latest_close),
        opt(trend.ma_short),
        opt(trend.ma_long)
    )
}

fn market_section(input: &ReportInput<'_>) -> Section {
    let section = Section::new(SECTION_HEADINGS[5]);
    let Some(m) = &input.market.detail else {
        return section.paragraph(unavailable(input.market));
    };

    section
        .paragraph(format!("Market trend: {}. {}", m.regime.label(), m.market_comment))
        .bullets(vec![index_line(&m.primary), index_line(&m.secondary)])
        .paragraph(m.industry_comment.clone())
}

fn news_section(input: &ReportInput<'_>) -> Section {
    let section = Section::new(SECTION_HEADINGS[6]);
    let Some(n) = &input.news.detail else {
        return section.paragraph(unavailable(input.news));
    };

    let section = section.paragraph(format!(
        "Sentiment {}: {} ({} items: {} positive, {} negative, {} neutral).",
        n.sentiment.label(),
        n.sentiment_comment,
        n.total,
        n.positive,
        n.negative,
        n.neutral
    ));

    let events: Vec<String> = n
        .major_events
        .iter()
        .take(input.max_events)
        .map(|e| e.title.clone())
        .collect();
    if events.is_empty() {
        section
    } else {
        section.paragraph("Recent major events:").bullets(events)
    }
}

fn support_text(input: &ReportInput<'_>) -> String {
    input
        .technical
        .detail
        .as_ref()
        .and_then(|t| t.indicators.support)
        .map(num)
        .unwrap_or_else(|| "n/a".to_string())
}

fn resistance_text(input: &ReportInput<'_>) -> String {
    input
        .technical
        .detail
        .as_ref()
        .and_then(|t| t.indicators.resistance)
        .map(num)
        .unwrap_or_else(|| "n/a".to_string())
}

fn conclusion_section(input: &ReportInput<'_>) -> Section {
    let score = input.score;
    let breakdown = score
        .contributions
        .iter()
        .map(|c| {
            format!(
                "{}: {} x {:.0}%{}",
                c.name,
                num(c.score),
                c.weight * 100.0,
                if c.substituted { " (neutral default)" } else { "" }
            )
        })
        .collect();

    Section::new(SECTION_HEADINGS[7])
        .highlight(format!(
            "Composite score {}, rating: {}",
            num(score.composite),
            score.recommendation
        ))
        .paragraph(score.recommendation.comment())
        .bullets(breakdown)
        .highlight(format!(
            "Risk warning: if the price breaks below {} on shrinking volume, watch for a trend reversal.",
            support_text(input)
        ))
}

fn action_section(input: &ReportInput<'_>) -> Section {
    let t = input.technical.detail.as_ref();

    let short_term = match t.map(|t| (t.momentum, t.band_position)) {
        Some((MomentumState::Overbought, BandPosition::AboveUpper)) => {
            "Short term: RSI is overbought and the price is above the upper band; consider trimming into strength."
        }
        Some((MomentumState::Oversold, BandPosition::BelowLower)) => {
            "Short term: RSI is oversold and the price is below the lower band; consider accumulating on weakness."
        }
        _ => "Short term: indicators are in their normal ranges; hold and watch.",
    };

    let medium_term = match t.map(|t| t.ma_alignment) {
        Some(MaAlignment::Bullish) => {
            "Medium term: the averages are in a bullish stack; consider adding on a pullback to MA5."
        }
        Some(MaAlignment::Bearish) => {
            "Medium term: the averages are in a bearish stack; consider reducing on a rebound to MA5."
        }
        _ => "Medium term: the averages are range-bound; follow the short-term signals.",
    };

    Section::new(SECTION_HEADINGS[8]).bullets(vec![
        short_term.to_string(),
        medium_term.to_string(),
        format!("Short-term risk: {}", input.score.recommendation.comment()),
        format!(
            "Medium-term opportunity: a pullback to around {} on light volume may be a buying chance.",
            support_text(input)
        ),
        format!(
            "Key levels: resistance {}, support {}.",
            resistance_text(input),
            support_text(input)
        ),
    ])
}

fn recent_section(input: &ReportInput<'_>) -> Section {
    let section = Section::new(SECTION_HEADINGS[9]);
    let rows = recent_rows(input.bars, input.flows, input.recent_rows);
    if rows.is_empty() {
        return section.paragraph("No recent trading data available.");
    }

    let rows = rows
        .into_iter()
        .map(|r| {
            vec![
                r.date.format("%Y-%m-%d").to_string(),
                num(r.close),
                pct(r.pct_change),
                pct(r.turnover),
                wan(r.volume),
                yi(r.amount),
                wan(r.main_flow),
            ]
        })
        .collect();

    section.table(&RECENT_COLUMNS, rows)
}

/// Assemble the full report.  Section order follows `SECTION_HEADINGS`.
pub fn compose(input: &ReportInput<'_>) -> Report {
    let date = input.generated_at.format("%Y-%m-%d");
    Report {
        title: format!(
            "{} ({}) Technical Analysis Report (as of {})",
            input.basic.stock_name, input.stock_code, date
        ),
        generated_at: input.generated_at,
        sections: vec![
            summary(input),
            technical_section(input),
            fund_flow_section(input),
            levels_section(input),
            financial_section(input),
            market_section(input),
            news_section(input),
            conclusion_section(input),
            action_section(input),
            recent_section(input),
            Section::new(SECTION_HEADINGS[10]).paragraph(DISCLAIMER),
        ],
    }
}
