//! Core types, traits, and the session windowing engine for agstat
//!
//! This crate holds everything the providers, the pricing layer and the
//! report formatters agree on: the normalized usage event, error handling,
//! timezone configuration, filters, and the four engine stages that turn
//! raw counters into session blocks:
//!
//! - [`reconcile`]: cumulative snapshots to per-event deltas
//! - [`session_blocks`]: sorted deltas to fixed-duration blocks
//! - [`burn_rate`]: consumption rate and end-of-window projection
//! - [`budget`]: token-limit classification

pub mod aggregation_types;
pub mod budget;
pub mod burn_rate;
pub mod clock;
pub mod error;
pub mod filters;
pub mod model_formatter;
pub mod provider;
pub mod reconcile;
pub mod session_blocks;
pub mod timezone;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use error::{AgstatError, Result};
pub use types::{CostMode, DailyDate, ISOTimestamp, ModelName, SessionId, TokenCounts, UsageEntry};
