// =============================================================================
// Composite Scorer — weighted aggregation of the five sub-analyses
// =============================================================================
//
//   composite = clamp( Σ weight_i * score_i )
//
// A component whose analysis did not succeed contributes the neutral score,
// so a missing data source pulls the composite toward the middle rather than
// toward zero.  The composite maps to a recommendation tier with inclusive
// lower bounds.
// =============================================================================

use serde::Serialize;

use crate::runtime_config::{CompositeWeights, TierBoundaries};
use crate::types::{clamp_score, SubAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Neutral,
    Caution,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Self::StrongBuy => "Strong Buy",
            Self::Buy => "Buy",
            Self::Neutral => "Neutral",
            Self::Caution => "Caution",
        }
    }

    /// Short positioning comment attached to the tier.
    pub fn comment(self) -> &'static str {
        match self {
            Self::StrongBuy => "Fundamentals and technicals both look strong; consider allocating actively",
            Self::Buy => "The overall picture is positive; consider allocating moderately",
            Self::Neutral => "Signals are mixed; watch from the sidelines or hold a light position",
            Self::Caution => "Risk outweighs opportunity; avoid for now",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One component's share of the composite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreContribution {
    pub name: &'static str,
    pub weight: f64,
    /// Score actually used: the analysis score, or neutral if it failed.
    pub score: f64,
    pub contribution: f64,
    pub substituted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScore {
    pub composite: f64,
    pub recommendation: Recommendation,
    pub contributions: Vec<ScoreContribution>,
}

impl CompositeScore {
    pub fn contribution(&self, name: &str) -> Option<&ScoreContribution> {
        self.contributions.iter().find(|c| c.name == name)
    }
}

/// Per-component effective-score input.  `None` means "no usable result".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComponentScores {
    pub technical: Option<f64>,
    pub fund_flow: Option<f64>,
    pub financial: Option<f64>,
    pub news: Option<f64>,
    pub market: Option<f64>,
}

/// Score of a sub-analysis when it succeeded.
pub fn effective<T>(analysis: &SubAnalysis<T>) -> Option<f64> {
    analysis.is_success().then_some(analysis.score)
}

pub struct CompositeScorer {
    weights: CompositeWeights,
    tiers: TierBoundaries,
    neutral_score: f64,
}

impl CompositeScorer {
    pub fn new(weights: CompositeWeights, tiers: TierBoundaries, neutral_score: f64) -> Self {
        Self {
            weights,
            tiers,
            neutral_score,
        }
    }

    pub fn score(&self, inputs: &ComponentScores) -> CompositeScore {
        let w = &self.weights;
        let components = [
            ("technical", w.technical, inputs.technical),
            ("fund_flow", w.fund_flow, inputs.fund_flow),
            ("financial", w.financial, inputs.financial),
            ("news", w.news, inputs.news),
            ("market", w.market, inputs.market),
        ];

        let mut contributions = Vec::with_capacity(components.len());
        let mut total = 0.0;

        for (name, weight, score) in components {
            let substituted = score.is_none();
            let score = clamp_score(score.unwrap_or(self.neutral_score));
            let contribution = weight * score;

            contributions.push(ScoreContribution {
                name,
                weight,
                score,
                contribution,
                substituted,
            });

            total += contribution;
        }

        let composite = clamp_score(total);

        CompositeScore {
            composite,
            recommendation: self.tier(composite),
            contributions,
        }
    }

    pub fn tier(&self, composite: f64) -> Recommendation {
        if composite >= self.tiers.strong_buy {
            Recommendation::StrongBuy
        } else if composite >= self.tiers.buy {
            Recommendation::Buy
        } else if composite >= self.tiers.neutral {
            Recommendation::Neutral
        } else {
            Recommendation::Caution
        }
    }
}

impl Default for CompositeScorer {
    fn default() -> Self {
        Self::new(CompositeWeights::default(), TierBoundaries::default(), 50.0)
    }
}
