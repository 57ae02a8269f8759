// =============================================================================
// Signals Module
// =============================================================================
//
// Aggregation of the sub-analysis scores into one composite score and a
// recommendation tier.

pub mod weighted_score;

pub use weighted_score::{effective, ComponentScores, CompositeScore, CompositeScorer};
