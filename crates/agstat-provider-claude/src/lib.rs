//! Claude Code provider for agstat
//!
//! Claude Code writes one JSONL transcript per conversation under
//! `<config>/projects/<project>/`. Every assistant message carries the usage
//! of that single request, so entries are already deltas.

pub mod data_loader;

pub use data_loader::DataLoader;
