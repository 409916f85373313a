//! Terminal output formatting for agstat
//!
//! Table and JSON report formatters, and the live view of the active
//! session block.

pub mod blocks_monitor;
pub mod output;

pub use blocks_monitor::BlocksMonitor;
pub use output::{JsonFormatter, OutputFormatter, TableFormatter, get_formatter};
