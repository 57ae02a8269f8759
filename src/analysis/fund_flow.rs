// =============================================================================
// Fund Flow Analysis — who is buying, and how hard
// =============================================================================
//
// Reads the latest fund-flow record:
//
//   main ratio (%) = main net inflow / traded amount * 100   (0 if no amount)
//
//   inflow  (main > 0): inflow tiers over the ratio
//   outflow (main <= 0): outflow tiers over the negated ratio
//
// plus institutional (super + large) and retail (medium + small) agreement.
// =============================================================================

use anyhow::{ensure, Result};
use serde::Serialize;

use crate::runtime_config::FundFlowThresholds;
use crate::types::{FundFlowRecord, SubAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowDirection {
    Inflow,
    Outflow,
}

/// Whether both order-size buckets of a group moved the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupAgreement {
    BothIn,
    BothOut,
    Divergent,
}

impl GroupAgreement {
    fn of(a: f64, b: f64) -> Self {
        if a > 0.0 && b > 0.0 {
            Self::BothIn
        } else if a < 0.0 && b < 0.0 {
            Self::BothOut
        } else {
            Self::Divergent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundFlowAnalysis {
    pub date: chrono::NaiveDate,
    pub main_net_inflow: f64,
    pub main_ratio_pct: f64,
    /// Mean main net inflow over the trailing records.
    pub trailing_main_mean: f64,
    pub direction: FlowDirection,
    pub main_comment: String,
    pub institutional: GroupAgreement,
    pub institutional_comment: String,
    pub retail: GroupAgreement,
    pub retail_comment: String,
    pub super_net_inflow: f64,
    pub large_net_inflow: f64,
    pub medium_net_inflow: f64,
    pub small_net_inflow: f64,
}

/// Analyze an ascending fund-flow series.  Only the latest record is scored.
pub fn analyze(
    records: &[FundFlowRecord],
    thresholds: &FundFlowThresholds,
    neutral_score: f64,
) -> SubAnalysis<FundFlowAnalysis> {
    let Some(latest) = records.last() else {
        return SubAnalysis::no_data("No fund flow data available", neutral_score);
    };

    match evaluate(records, latest, thresholds) {
        Ok((analysis, score)) => {
            let comment = format!(
                "Main funds {} ({:.2}% of turnover)",
                match analysis.direction {
                    FlowDirection::Inflow => "net inflow",
                    FlowDirection::Outflow => "net outflow",
                },
                analysis.main_ratio_pct
            );
            SubAnalysis::success(comment, score, analysis)
        }
        Err(e) => SubAnalysis::error(format!("Fund flow analysis failed: {e}"), neutral_score),
    }
}

fn evaluate(
    records: &[FundFlowRecord],
    latest: &FundFlowRecord,
    t: &FundFlowThresholds,
) -> Result<(FundFlowAnalysis, f64)> {
    for (name, value) in [
        ("main_net_inflow", latest.main_net_inflow),
        ("super_net_inflow", latest.super_net_inflow),
        ("large_net_inflow", latest.large_net_inflow),
        ("medium_net_inflow", latest.medium_net_inflow),
        ("small_net_inflow", latest.small_net_inflow),
        ("amount", latest.amount),
    ] {
        ensure!(value.is_finite(), "{name} is not finite ({value})");
    }

    let main = latest.main_net_inflow;
    let main_ratio_pct = if latest.amount > 0.0 {
        main / latest.amount * 100.0
    } else {
        0.0
    };

    let trailing = &records[records.len().saturating_sub(t.trailing_days.max(1))..];
    let trailing_main_mean =
        trailing.iter().map(|r| r.main_net_inflow).sum::<f64>() / trailing.len() as f64;

    let mut score = 50.0;

    let direction = if main > 0.0 {
        FlowDirection::Inflow
    } else {
        FlowDirection::Outflow
    };
    let main_comment = match direction {
        FlowDirection::Inflow => format!(
            "Main funds took in a net {:.2} (10k CNY); institutions are buying actively",
            main / 1e4
        ),
        FlowDirection::Outflow => format!(
            "Main funds lost a net {:.2} (10k CNY); institutions are selling",
            main.abs() / 1e4
        ),
    };
    score += match direction {
        FlowDirection::Inflow => t.inflow_ratio_tiers.bonus(main_ratio_pct),
        FlowDirection::Outflow => t.outflow_ratio_tiers.bonus(-main_ratio_pct),
    };

    let institutional = GroupAgreement::of(latest.super_net_inflow, latest.large_net_inflow);
    let institutional_comment = match institutional {
        GroupAgreement::BothIn => "Super-large and large orders are both net buyers; institutional demand is strong",
        GroupAgreement::BothOut => "Super-large and large orders are both net sellers; institutions are reducing exposure",
        GroupAgreement::Divergent => "Institutional orders are split; large players disagree",
    }
    .to_string();
    score += match institutional {
        GroupAgreement::BothIn => t.institutional_agree_in_bonus,
        GroupAgreement::BothOut => t.institutional_agree_out_bonus,
        GroupAgreement::Divergent => t.institutional_mixed_bonus,
    };

    let retail = GroupAgreement::of(latest.medium_net_inflow, latest.small_net_inflow);
    let retail_comment = match retail {
        GroupAgreement::BothIn => "Medium and small orders are both net buyers; retail participation is high",
        GroupAgreement::BothOut => "Medium and small orders are both net sellers; retail is cautious",
        GroupAgreement::Divergent => "Retail orders are split",
    }
    .to_string();
    score += match retail {
        GroupAgreement::BothIn => t.retail_agree_in_bonus,
        GroupAgreement::BothOut => t.retail_agree_out_bonus,
        GroupAgreement::Divergent => t.retail_mixed_bonus,
    };

    let analysis = FundFlowAnalysis {
        date: latest.date,
        main_net_inflow: main,
        main_ratio_pct,
        trailing_main_mean,
        direction,
        main_comment,
        institutional,
        institutional_comment,
        retail,
        retail_comment,
        super_net_inflow: latest.super_net_inflow,
        large_net_inflow: latest.large_net_inflow,
        medium_net_inflow: latest.medium_net_inflow,
        small_net_inflow: latest.small_net_inflow,
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
    use chrono::NaiveDate;

    fn record(day: u32, main: f64, sup: f64, large: f64, medium: f64, small: f64, amount: f64) -> FundFlowRecord {
        FundFlowRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            main_net_inflow: main,
            super_net_inflow: sup,
            large_net_inflow: large,
            medium_net_inflow: medium,
            small_net_inflow: small,
            amount,
        }
    }

    #[test]
    fn empty_series_is_no_data() {
        let sub = analyze(&[], &FundFlowThresholds::default(), 50.0);
        assert_eq!(sub.status, AnalysisStatus::NoData);
        assert_eq!(sub.score, 50.0);
    }

    #[test]
    fn ratio_of_exactly_ten_takes_second_tier() {
        let rec = record(10, 100_000.0, 60_000.0, 40_000.0, -30_000.0, -70_000.0, 1_000_000.0);
        let sub = analyze(&[rec], &FundFlowThresholds::default(), 50.0);
        let detail = sub.detail.as_ref().unwrap();

        assert_eq!(detail.main_ratio_pct, 10.0);
        assert_eq!(detail.direction, FlowDirection::Inflow);
        assert_eq!(detail.institutional, GroupAgreement::BothIn);
        assert_eq!(detail.retail, GroupAgreement::BothOut);
        // 50 + 20 (ratio > 5) + 20 (institutions in) + 5 (retail out)
        assert_eq!(sub.score, 95.0);
    }

    #[test]
    fn zero_amount_gives_zero_ratio() {
        let rec = record(10, 100_000.0, 50_000.0, -10_000.0, 5_000.0, -5_000.0, 0.0);
        let sub = analyze(&[rec], &FundFlowThresholds::default(), 50.0);
        let detail = sub.detail.as_ref().unwrap();

        assert_eq!(detail.main_ratio_pct, 0.0);
        assert_eq!(detail.institutional, GroupAgreement::Divergent);
        // 50 + 15 (inflow floor) + 10 (mixed) + 7 (mixed)
        assert_eq!(sub.score, 82.0);
    }

    #[test]
    fn heavy_outflow_uses_negated_ratio() {
        let rec = record(10, -200_000.0, -150_000.0, -50_000.0, 80_000.0, 120_000.0, 1_000_000.0);
        let sub = analyze(&[rec], &FundFlowThresholds::default(), 50.0);
        let detail = sub.detail.as_ref().unwrap();

        assert_eq!(detail.direction, FlowDirection::Outflow);
        assert_eq!(detail.main_ratio_pct, -20.0);
        // 50 + 5 (outflow > 10%) + 5 (institutions out) + 10 (retail in)
        assert_eq!(sub.score, 70.0);
    }

    #[test]
    fn zero_main_flow_counts_as_outflow() {
        let rec = record(10, 0.0, 0.0, 0.0, 0.0, 0.0, 1_000_000.0);
        let sub = analyze(&[rec], &FundFlowThresholds::default(), 50.0);
        assert_eq!(sub.detail.as_ref().unwrap().direction, FlowDirection::Outflow);
        // 50 + 15 (outflow floor) + 10 + 7
        assert_eq!(sub.score, 82.0);
    }

    #[test]
    fn only_latest_record_is_scored_but_trailing_mean_uses_window() {
        let records: Vec<FundFlowRecord> = (1..=7)
            .map(|d| record(d, d as f64 * 1_000.0, 1.0, 1.0, 1.0, 1.0, 1_000_000.0))
            .collect();
        let sub = analyze(&records, &FundFlowThresholds::default(), 50.0);
        let detail = sub.detail.as_ref().unwrap();

        assert_eq!(detail.date, NaiveDate::from_ymd_opt(2024, 5, 7).unwrap());
        assert_eq!(detail.main_net_inflow, 7_000.0);
        // mean of days 3..=7
        assert_eq!(detail.trailing_main_mean, 5_000.0);
    }

    #[test]
    fn non_finite_flow_is_error() {
        let rec = record(10, f64::NAN, 0.0, 0.0, 0.0, 0.0, 1.0);
        let sub = analyze(&[rec], &FundFlowThresholds::default(), 50.0);
        assert_eq!(sub.status, AnalysisStatus::Error);
        assert_eq!(sub.score, 50.0);
    }
}
