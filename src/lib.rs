//! agstat - token usage and cost of AI coding agents
//!
//! The binary loads usage entries from a provider (Claude Code or Codex
//! CLI), prices them, and prints daily, monthly, per-session or
//! session-block reports. This library holds the pieces that sit between
//! the provider crates and the terminal:
//!
//! - [`aggregation`]: folding entries into report rows and session blocks
//! - [`cli`]: command-line parsing
//! - [`live_monitor`]: the `--watch` refresh loop
//!
//! # Examples
//!
//! ```no_run
//! use agstat::aggregation::Aggregator;
//! use agstat_core::provider::ProviderDataLoader;
//! use agstat_core::timezone::TimezoneConfig;
//! use agstat_core::types::CostMode;
//! use agstat_pricing::{CostCalculator, PricingFetcher};
//! use agstat_provider_claude::DataLoader;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> agstat::Result<()> {
//!     let loader = DataLoader::new().await?;
//!     let pricing_fetcher = Arc::new(PricingFetcher::new(false).await);
//!     let aggregator = Aggregator::new(
//!         Arc::new(CostCalculator::new(pricing_fetcher)),
//!         TimezoneConfig::default(),
//!     );
//!
//!     let daily = aggregator.aggregate_daily(loader.load_entries(), CostMode::Auto).await?;
//!     println!("{} days of usage", daily.len());
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod live_monitor;

pub use agstat_core::{AgstatError, Result};
pub use agstat_core::types::{CostMode, ModelName, SessionId, TokenCounts, UsageEntry};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
