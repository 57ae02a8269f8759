// =============================================================================
// Eastmoney market data provider
// =============================================================================

pub mod client;
pub mod parse;

pub use client::EastmoneyClient;
