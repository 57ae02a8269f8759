// =============================================================================
// Financial Health — growth, profitability and margins
// =============================================================================

use anyhow::{ensure, Result};
use serde::Serialize;

use crate::runtime_config::{FinancialThresholds, TierTable};
use crate::types::{FinancialSnapshot, SubAnalysis};

/// Four-level grade shared by every financial metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    Weak,
}

impl Grade {
    fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Excellent,
            1 => Self::Good,
            2 => Self::Fair,
            _ => Self::Weak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricAssessment {
    pub value: f64,
    pub grade: Grade,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialAnalysis {
    pub report_date: String,
    pub eps: f64,
    pub net_margin_pct: f64,
    pub profit_growth: MetricAssessment,
    pub revenue_growth: MetricAssessment,
    pub roe: MetricAssessment,
    pub gross_margin: MetricAssessment,
}

pub fn analyze(
    snapshot: Option<&FinancialSnapshot>,
    thresholds: &FinancialThresholds,
    neutral_score: f64,
) -> SubAnalysis<FinancialAnalysis> {
    let Some(snapshot) = snapshot else {
        return SubAnalysis::no_data("No financial statement data available", neutral_score);
    };

    match evaluate(snapshot, thresholds) {
        Ok((analysis, score)) => {
            let comment = format!(
                "Report {}: profit growth {:.2}%, ROE {:.2}%",
                analysis.report_date, analysis.profit_growth.value, analysis.roe.value
            );
            SubAnalysis::success(comment, score, analysis)
        }
        Err(e) => SubAnalysis::error(format!("Financial analysis failed: {e}"), neutral_score),
    }
}

fn assess(value: f64, table: &TierTable, comments: [&str; 4]) -> (MetricAssessment, f64) {
    let index = table.classify(value);
    let grade = Grade::from_index(index);
    let comment = comments[index.min(3)].replace("{v}", &format!("{value:.2}"));
    (
        MetricAssessment {
            value,
            grade,
            comment,
        },
        table.bonus_at(index),
    )
}

fn evaluate(s: &FinancialSnapshot, t: &FinancialThresholds) -> Result<(FinancialAnalysis, f64)> {
    for (name, value) in [
        ("eps", s.eps),
        ("net_profit_growth_pct", s.net_profit_growth_pct),
        ("revenue_growth_pct", s.revenue_growth_pct),
        ("roe_pct", s.roe_pct),
        ("gross_margin_pct", s.gross_margin_pct),
        ("net_margin_pct", s.net_margin_pct),
    ] {
        ensure!(value.is_finite(), "{name} is not finite ({value})");
    }

    let (profit_growth, profit_bonus) = assess(
        s.net_profit_growth_pct,
        &t.profit_growth,
        [
            "Net profit grew {v}%: high growth",
            "Net profit grew {v}%: solid growth",
            "Net profit grew {v}%: modest growth",
            "Net profit changed {v}%: earnings are declining",
        ],
    );
    let (revenue_growth, revenue_bonus) = assess(
        s.revenue_growth_pct,
        &t.revenue_growth,
        [
            "Revenue grew {v}%: business is expanding fast",
            "Revenue grew {v}%: business is growing steadily",
            "Revenue grew {v}%: growth is slow",
            "Revenue changed {v}%: business is shrinking",
        ],
    );
    let (roe, roe_bonus) = assess(
        s.roe_pct,
        &t.roe,
        [
            "ROE of {v}%: excellent profitability",
            "ROE of {v}%: good profitability",
            "ROE of {v}%: average profitability",
            "ROE of {v}%: weak profitability",
        ],
    );
    let (gross_margin, margin_bonus) = assess(
        s.gross_margin_pct,
        &t.gross_margin,
        [
            "Gross margin of {v}%: strong pricing power",
            "Gross margin of {v}%: healthy margins",
            "Gross margin of {v}%: average margins",
            "Gross margin of {v}%: thin margins",
        ],
    );

    let score = 50.0 + profit_bonus + revenue_bonus + roe_bonus + margin_bonus;

    let analysis = FinancialAnalysis {
        report_date: s.report_date.clone(),
        eps: s.eps,
        net_margin_pct: s.net_margin_pct,
        profit_growth,
        revenue_growth,
        roe,
        gross_margin,
    };

    Ok((analysis, score))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisStatus;

    fn snapshot(profit: f64, revenue: f64, roe: f64, margin: f64) -> FinancialSnapshot {
        FinancialSnapshot {
            eps: 1.2,
            net_profit_growth_pct: profit,
            revenue_growth_pct: revenue,
            roe_pct: roe,
            gross_margin_pct: margin,
            net_margin_pct: 12.0,
            report_date: "2024-03-31".to_string(),
        }
    }

    #[test]
    fn missing_snapshot_is_no_data() {
        let sub = analyze(None, &FinancialThresholds::default(), 50.0);
        assert_eq!(sub.status, AnalysisStatus::NoData);
        assert_eq!(sub.score, 50.0);
    }

    #[test]
    fn growth_of_exactly_fifteen_is_third_tier() {
        let s = snapshot(15.0, 15.0, 12.0, 35.0);
        let sub = analyze(Some(&s), &FinancialThresholds::default(), 50.0);
        let detail = sub.detail.as_ref().unwrap();

        assert_eq!(detail.profit_growth.grade, Grade::Fair);
        assert_eq!(detail.revenue_growth.grade, Grade::Fair);
        assert_eq!(detail.roe.grade, Grade::Good);
        assert_eq!(detail.gross_margin.grade, Grade::Good);
        // 50 + 10 + 5 + 10 + 7
        assert_eq!(sub.score, 82.0);
        assert!(detail.profit_growth.comment.contains("15.00%"));
    }

    #[test]
    fn excellent_company_clamps_at_hundred() {
        let s = snapshot(45.0, 35.0, 20.0, 60.0);
        let sub = analyze(Some(&s), &FinancialThresholds::default(), 50.0);
        // 50 + 20 + 15 + 15 + 10 = 110
        assert_eq!(sub.score, 100.0);
    }

    #[test]
    fn weak_company_takes_floor_bonuses() {
        let s = snapshot(-20.0, -5.0, 3.0, 10.0);
        let sub = analyze(Some(&s), &FinancialThresholds::default(), 50.0);
        let detail = sub.detail.as_ref().unwrap();
        assert_eq!(detail.profit_growth.grade, Grade::Weak);
        assert_eq!(detail.gross_margin.grade, Grade::Weak);
        // 50 + 5 + 2 + 2 + 3
        assert_eq!(sub.score, 62.0);
    }

    #[test]
    fn non_finite_metric_is_error() {
        let s = snapshot(f64::INFINITY, 0.0, 0.0, 0.0);
        let sub = analyze(Some(&s), &FinancialThresholds::default(), 50.0);
        assert_eq!(sub.status, AnalysisStatus::Error);
        assert_eq!(sub.score, 50.0);
    }
}
