//! Codex CLI provider for agstat
//!
//! Codex logs the running token total of a session rather than the usage of
//! each request. The loader reconciles consecutive totals into deltas with
//! [`agstat_core::reconcile::StreamReconciler`].

pub mod data_loader;

pub use data_loader::DataLoader;
