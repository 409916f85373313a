//! Cost of token usage
//!
//! # Examples
//!
//! ```no_run
//! use agstat_core::types::{CostMode, ModelName, TokenCounts};
//! use agstat_pricing::{CostCalculator, PricingFetcher};
//! use std::sync::Arc;
//!
//! # async fn example() -> agstat_core::Result<()> {
//! let calculator = CostCalculator::new(Arc::new(PricingFetcher::new(false).await));
//! let tokens = TokenCounts::new(12_000, 800, 0, 40_000);
//! let cost = calculator
//!     .calculate_with_mode(&tokens, &ModelName::new("gpt-5-codex"), None, CostMode::Auto)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::pricing_fetcher::PricingFetcher;
use agstat_core::error::{AgstatError, Result};
use agstat_core::types::{CostMode, ModelName, ModelPricing, TokenCounts};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub struct CostCalculator {
    pricing_fetcher: Arc<PricingFetcher>,
    /// Models already reported as unpriced, to warn once each
    warned: Mutex<HashSet<ModelName>>,
}

impl CostCalculator {
    pub fn new(pricing_fetcher: Arc<PricingFetcher>) -> Self {
        Self {
            pricing_fetcher,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Price `tokens` for `model`
    ///
    /// # Errors
    ///
    /// [`AgstatError::UnknownModel`] when the table has no match.
    pub async fn calculate_cost(&self, tokens: &TokenCounts, model: &ModelName) -> Result<f64> {
        let pricing = self
            .pricing_fetcher
            .get_model_pricing(model.as_str())
            .await?
            .ok_or_else(|| AgstatError::UnknownModel(model.clone()))?;
        Ok(Self::calculate_from_pricing(tokens, &pricing))
    }

    /// Pure cost formula; a missing rate prices that counter at zero
    ///
    /// Reasoning tokens are already inside `output_tokens` and are not
    /// charged again.
    pub fn calculate_from_pricing(tokens: &TokenCounts, pricing: &ModelPricing) -> f64 {
        let charge = |count: u64, rate: Option<f64>| count as f64 * rate.unwrap_or(0.0);

        let cost = charge(tokens.input_tokens, pricing.input_cost_per_token)
            + charge(tokens.output_tokens, pricing.output_cost_per_token)
            + charge(
                tokens.cache_creation_tokens,
                pricing.cache_creation_input_token_cost,
            )
            + charge(tokens.cache_read_tokens, pricing.cache_read_input_token_cost);

        debug!("Calculated ${:.6} for {} tokens", cost, tokens.total());
        cost
    }

    /// Cost of one entry under `mode`
    ///
    /// - `Auto`: the recorded cost if there is one, else calculated
    /// - `Calculate`: always calculated
    /// - `Display`: the recorded cost, or zero
    ///
    /// An unpriced model costs zero and is warned about once. Only failures
    /// to obtain the price table itself are returned as errors.
    pub async fn calculate_with_mode(
        &self,
        tokens: &TokenCounts,
        model: &ModelName,
        recorded: Option<f64>,
        mode: CostMode,
    ) -> Result<f64> {
        match (mode, recorded) {
            (CostMode::Auto, Some(cost)) => Ok(cost),
            (CostMode::Display, recorded) => Ok(recorded.unwrap_or(0.0)),
            (CostMode::Auto | CostMode::Calculate, _) => {
                match self.calculate_cost(tokens, model).await {
                    Err(AgstatError::UnknownModel(name)) => {
                        self.warn_unpriced(name);
                        Ok(0.0)
                    }
                    other => other,
                }
            }
        }
    }

    fn warn_unpriced(&self, model: ModelName) {
        let first_time = self
            .warned
            .lock()
            .map(|mut seen| seen.insert(model.clone()))
            .unwrap_or(true);
        if first_time {
            warn!("No pricing found for model '{}', counting its cost as $0", model);
        }
    }
}
