//! LiteLLM price table
//!
//! The table is loaded lazily on first lookup and cached for the life of
//! the fetcher. Live mode keeps one fetcher across refreshes, so the
//! network is hit once per run at most.

use agstat_core::error::Result;
use agstat_core::types::ModelPricing;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const LITELLM_PRICING_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

/// Bundled snapshot for offline runs
const EMBEDDED_PRICING: &str = include_str!("../embedded/pricing.json");

/// Provider prefixes LiteLLM uses for some of its keys
const PROVIDER_PREFIXES: [&str; 3] = ["anthropic/", "openai/", "azure/"];

/// Shortest key or model id considered for substring matching
const MIN_PARTIAL_MATCH_LEN: usize = 5;

type PriceTable = HashMap<String, ModelPricing>;

pub struct PricingFetcher {
    cache: Arc<RwLock<Option<PriceTable>>>,
    offline: bool,
    client: reqwest::Client,
}

impl PricingFetcher {
    pub async fn new(offline: bool) -> Self {
        Self {
            cache: Arc::new(RwLock::new(None)),
            offline,
            client: reqwest::Client::new(),
        }
    }

    /// Fetcher preloaded with a fixed table, never touching the network
    pub fn with_table(table: HashMap<String, ModelPricing>) -> Self {
        Self {
            cache: Arc::new(RwLock::new(Some(table))),
            offline: true,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Pricing for `model`, or `None` if no key matches
    pub async fn get_model_pricing(&self, model: &str) -> Result<Option<ModelPricing>> {
        self.ensure_loaded().await?;
        let cache = self.cache.read().await;
        Ok(cache
            .as_ref()
            .and_then(|table| find_model_pricing(table, model))
            .cloned())
    }

    async fn ensure_loaded(&self) -> Result<()> {
        if self.cache.read().await.is_some() {
            return Ok(());
        }
        let mut cache = self.cache.write().await;
        // Another task may have filled it while we waited for the lock
        if cache.is_none() {
            *cache = Some(self.load_table().await?);
        }
        Ok(())
    }

    async fn load_table(&self) -> Result<PriceTable> {
        if self.offline {
            info!("Using bundled pricing data (offline)");
            return parse_embedded();
        }

        match self.fetch_litellm().await {
            Ok(table) => {
                info!("Fetched pricing for {} models from LiteLLM", table.len());
                Ok(table)
            }
            Err(e) => {
                warn!("Failed to fetch pricing data: {}, using bundled data", e);
                parse_embedded()
            }
        }
    }

    async fn fetch_litellm(&self) -> Result<PriceTable> {
        let raw: HashMap<String, serde_json::Value> = self
            .client
            .get(LITELLM_PRICING_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_table(raw))
    }
}

/// Keep only entries that deserialize as pricing; LiteLLM mixes in others
fn parse_table(raw: HashMap<String, serde_json::Value>) -> PriceTable {
    raw.into_iter()
        .filter_map(|(name, value)| {
            serde_json::from_value::<ModelPricing>(value)
                .ok()
                .map(|pricing| (name, pricing))
        })
        .collect()
}

fn parse_embedded() -> Result<PriceTable> {
    let raw: HashMap<String, serde_json::Value> = serde_json::from_str(EMBEDDED_PRICING)?;
    Ok(parse_table(raw))
}

/// Exact key, then provider-prefixed forms, then the longest substring match
fn find_model_pricing<'a>(table: &'a PriceTable, model: &str) -> Option<&'a ModelPricing> {
    if let Some(pricing) = table.get(model) {
        return Some(pricing);
    }

    let bare = PROVIDER_PREFIXES
        .iter()
        .find_map(|p| model.strip_prefix(p))
        .unwrap_or(model);
    let candidates = std::iter::once(bare.to_string())
        .chain(PROVIDER_PREFIXES.iter().map(|p| format!("{p}{bare}")));
    for candidate in candidates {
        if let Some(pricing) = table.get(&candidate) {
            debug!("Priced {} as {}", model, candidate);
            return Some(pricing);
        }
    }

    if bare.len() < MIN_PARTIAL_MATCH_LEN {
        return None;
    }
    table
        .iter()
        .filter(|(key, _)| key.len() >= MIN_PARTIAL_MATCH_LEN)
        .filter(|(key, _)| key.contains(bare) || bare.contains(key.as_str()))
        .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
        .map(|(key, pricing)| {
            debug!("Priced {} by partial match on {}", model, key);
            pricing
        })
}
