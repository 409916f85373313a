//! Model price table and cost calculation for agstat
//!
//! Prices come from LiteLLM's public table, with a bundled snapshot for
//! offline use or when the fetch fails.

pub mod cost_calculator;
pub mod pricing_fetcher;

pub use cost_calculator::CostCalculator;
pub use pricing_fetcher::PricingFetcher;
