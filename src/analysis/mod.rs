// =============================================================================
// Sub-analyzers
// =============================================================================
//
// Five independent analyzers, each a pure function from market records (or
// the indicator snapshot) to a `SubAnalysis` with a score in [0, 100].
// Missing input yields `NoData`; malformed input yields `Error`.  Neither
// ever aborts the run.

pub mod financial;
pub mod fund_flow;
pub mod market_context;
pub mod news;
pub mod technical;

pub use financial::FinancialAnalysis;
pub use fund_flow::FundFlowAnalysis;
pub use market_context::MarketContextAnalysis;
pub use news::NewsAnalysis;
pub use technical::TechnicalAnalysis;
