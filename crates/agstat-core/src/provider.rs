//! Provider trait for data loaders
//!
//! Each agent writes its logs in its own layout. A provider crate hides that
//! layout behind [`ProviderDataLoader`]. By the time an entry leaves the
//! loader, its tokens are a per-request delta, whatever counters the source
//! actually recorded.

use crate::error::Result;
use crate::types::UsageEntry;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Boxed stream of normalized entries
pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<UsageEntry>> + Send + 'a>>;

#[async_trait]
pub trait ProviderDataLoader: Send + Sync + Sized {
    /// Display name used in logs and error messages
    const NAME: &'static str;

    /// Discover data directories, failing if none exist
    async fn new() -> Result<Self>;

    /// Stream every usage entry, in file order
    fn load_entries(&self) -> EntryStream<'_>;
}
