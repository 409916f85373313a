//! Aggregation of usage entries into reports
//!
//! The daily and session reports fold a stream as it arrives. The blocks
//! report needs the whole timeline at once: entries are collected, sorted,
//! segmented into session blocks, priced, and then decorated with burn
//! rate, projection and limit status.
//!
//! # Examples
//!
//! ```no_run
//! use agstat::aggregation::Aggregator;
//! use agstat_core::provider::ProviderDataLoader;
//! use agstat_core::session_blocks::BlocksConfig;
//! use agstat_core::timezone::TimezoneConfig;
//! use agstat_core::types::CostMode;
//! use agstat_pricing::{CostCalculator, PricingFetcher};
//! use agstat_provider_codex::DataLoader;
//! use std::sync::Arc;
//!
//! # async fn example() -> agstat_core::Result<()> {
//! let pricing_fetcher = Arc::new(PricingFetcher::new(false).await);
//! let aggregator = Aggregator::new(
//!     Arc::new(CostCalculator::new(pricing_fetcher)),
//!     TimezoneConfig::default(),
//! );
//!
//! let loader = DataLoader::new().await?;
//! let entries = Aggregator::collect_sorted(loader.load_entries()).await?;
//! let reports = aggregator
//!     .build_block_reports(entries, &BlocksConfig::default(), CostMode::Auto, chrono::Utc::now())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use agstat_core::aggregation_types::{
    BlockReport, DailyUsage, ModelBreakdown, MonthlyUsage, SessionUsage,
};
use agstat_core::budget::classify_budget;
use agstat_core::burn_rate::{calculate_burn_rate, project_block_usage};
use agstat_core::error::Result;
use agstat_core::filters::MonthFilter;
use agstat_core::session_blocks::{
    BlocksConfig, SessionBlock, filter_recent_blocks, identify_session_blocks,
};
use agstat_core::timezone::TimezoneConfig;
use agstat_core::types::{CostMode, DailyDate, ModelName, SessionId, TokenCounts, UsageEntry};
use agstat_pricing::CostCalculator;
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Distinct values in order of first appearance
#[derive(Default)]
struct OrderedSet<T> {
    items: Vec<T>,
}

impl<T: PartialEq> OrderedSet<T> {
    fn insert(&mut self, item: T) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }
}

#[derive(Default)]
struct DailyAccumulator {
    tokens: TokenCounts,
    cost: f64,
    models: OrderedSet<String>,
}

impl DailyAccumulator {
    fn add_entry(&mut self, entry: &UsageEntry, cost: f64) {
        self.tokens += entry.tokens;
        self.cost += cost;
        self.models.insert(entry.model.to_string());
    }

    fn into_daily_usage(self, date: DailyDate) -> DailyUsage {
        DailyUsage {
            date,
            tokens: self.tokens,
            total_cost: self.cost,
            models_used: self.models.items,
        }
    }
}

#[derive(Default)]
struct SessionAccumulator {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    tokens: TokenCounts,
    cost: f64,
    models: OrderedSet<String>,
    project: Option<String>,
}

impl SessionAccumulator {
    fn add_entry(&mut self, entry: &UsageEntry, cost: f64) {
        let ts = *entry.timestamp.inner();
        self.start_time = Some(self.start_time.map_or(ts, |s| s.min(ts)));
        self.end_time = Some(self.end_time.map_or(ts, |e| e.max(ts)));
        self.tokens += entry.tokens;
        self.cost += cost;
        self.models.insert(entry.model.to_string());
        if self.project.is_none() {
            self.project = entry.project.clone();
        }
    }

    fn into_session_usage(self, session_id: SessionId) -> Option<SessionUsage> {
        Some(SessionUsage {
            session_id,
            start_time: self.start_time?,
            end_time: self.end_time?,
            tokens: self.tokens,
            total_cost: self.cost,
            models_used: self.models.items,
            project: self.project,
        })
    }
}

pub struct Aggregator {
    cost_calculator: Arc<CostCalculator>,
    show_progress: bool,
    timezone_config: TimezoneConfig,
}

impl Aggregator {
    pub fn new(cost_calculator: Arc<CostCalculator>, timezone_config: TimezoneConfig) -> Self {
        Self {
            cost_calculator,
            show_progress: false,
            timezone_config,
        }
    }

    /// Show a spinner while folding entry streams
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn timezone_config(&self) -> &TimezoneConfig {
        &self.timezone_config
    }

    fn spinner(&self, message: &'static str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}] {pos} entries processed")
        {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    }

    async fn entry_cost(&self, entry: &UsageEntry, mode: CostMode) -> Result<f64> {
        self.cost_calculator
            .calculate_with_mode(&entry.tokens, &entry.model, entry.total_cost, mode)
            .await
    }

    /// Group by calendar date in the configured timezone
    pub async fn aggregate_daily(
        &self,
        entries: impl Stream<Item = Result<UsageEntry>>,
        cost_mode: CostMode,
    ) -> Result<Vec<DailyUsage>> {
        let mut daily: BTreeMap<DailyDate, DailyAccumulator> = BTreeMap::new();
        let progress = self.spinner("Aggregating daily usage");

        tokio::pin!(entries);
        while let Some(result) = entries.next().await {
            let entry = result?;
            let date = entry.timestamp.to_daily_date_with_tz(&self.timezone_config.tz);
            let cost = self.entry_cost(&entry, cost_mode).await?;
            daily.entry(date).or_default().add_entry(&entry, cost);
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(daily
            .into_iter()
            .map(|(date, acc)| acc.into_daily_usage(date))
            .collect())
    }

    /// Roll daily rows up into `YYYY-MM` rows
    pub fn aggregate_monthly(daily: &[DailyUsage]) -> Vec<MonthlyUsage> {
        let mut monthly: BTreeMap<String, MonthlyUsage> = BTreeMap::new();
        for day in daily {
            let month = day.date.format("%Y-%m");
            let row = monthly.entry(month.clone()).or_insert_with(|| MonthlyUsage {
                month,
                tokens: TokenCounts::default(),
                total_cost: 0.0,
                active_days: 0,
            });
            row.tokens += day.tokens;
            row.total_cost += day.total_cost;
            row.active_days += 1;
        }
        monthly.into_values().collect()
    }

    /// Group by session id, most recent activity last
    pub async fn aggregate_sessions(
        &self,
        entries: impl Stream<Item = Result<UsageEntry>>,
        cost_mode: CostMode,
    ) -> Result<Vec<SessionUsage>> {
        let mut sessions: HashMap<SessionId, SessionAccumulator> = HashMap::new();
        let progress = self.spinner("Aggregating sessions");

        tokio::pin!(entries);
        while let Some(result) = entries.next().await {
            let entry = result?;
            let cost = self.entry_cost(&entry, cost_mode).await?;
            sessions
                .entry(entry.session_id.clone())
                .or_default()
                .add_entry(&entry, cost);
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let mut rows: Vec<SessionUsage> = sessions
            .into_iter()
            .filter_map(|(id, acc)| acc.into_session_usage(id))
            .collect();
        rows.sort_by(|a, b| {
            a.end_time
                .cmp(&b.end_time)
                .then_with(|| a.session_id.as_str().cmp(b.session_id.as_str()))
        });
        Ok(rows)
    }

    /// Drain a stream into a timestamp-ordered vector
    pub async fn collect_sorted(
        entries: impl Stream<Item = Result<UsageEntry>>,
    ) -> Result<Vec<UsageEntry>> {
        tokio::pin!(entries);
        let mut collected = Vec::new();
        while let Some(result) = entries.next().await {
            collected.push(result?);
        }
        collected.sort_by_key(|e| e.timestamp);
        Ok(collected)
    }

    /// Segment, price and classify one timeline of entries
    ///
    /// `entries` need not be sorted. A `max` token limit is resolved over
    /// every block before the active/recent filters are applied.
    pub async fn build_block_reports(
        &self,
        mut entries: Vec<UsageEntry>,
        config: &BlocksConfig,
        cost_mode: CostMode,
        now: DateTime<Utc>,
    ) -> Result<Vec<BlockReport>> {
        entries.sort_by_key(|e| e.timestamp);
        let mut blocks = identify_session_blocks(entries, config.session_duration, now);
        debug!("Identified {} session blocks", blocks.len());

        let limit = config.token_limit.and_then(|l| l.resolve(&blocks));
        if let Some(limit) = limit {
            debug!("Token limit resolved to {}", limit);
        }

        if config.recent_only {
            blocks = filter_recent_blocks(blocks, config.recent_days, now);
        }
        if config.active_only {
            blocks.retain(|b| b.is_active);
        }

        let mut reports = Vec::with_capacity(blocks.len());
        for mut block in blocks {
            let model_breakdowns = self.price_block(&mut block, cost_mode).await?;
            let burn_rate = calculate_burn_rate(&block);
            let projection = project_block_usage(&block, now);
            let budget = if block.is_gap {
                None
            } else {
                classify_budget(
                    block.total_tokens(),
                    projection.map(|p| p.total_tokens),
                    limit,
                )
            };
            reports.push(BlockReport {
                block,
                model_breakdowns,
                burn_rate,
                projection,
                budget,
            });
        }
        Ok(reports)
    }

    /// Fill in `cost_usd` and return the per-model split
    async fn price_block(
        &self,
        block: &mut SessionBlock,
        cost_mode: CostMode,
    ) -> Result<Vec<ModelBreakdown>> {
        let mut by_model: Vec<ModelBreakdown> = Vec::new();
        let mut total = 0.0;
        for entry in &block.entries {
            let cost = self.entry_cost(entry, cost_mode).await?;
            total += cost;
            match by_model.iter_mut().find(|m| m.model == entry.model) {
                Some(row) => {
                    row.tokens += entry.tokens;
                    row.cost += cost;
                }
                None => by_model.push(ModelBreakdown {
                    model: ModelName::new(entry.model.as_str()),
                    tokens: entry.tokens,
                    cost,
                }),
            }
        }
        block.cost_usd = total;
        Ok(by_model)
    }
}

/// Keep only months inside the filter range
pub fn filter_monthly_data(monthly: &mut Vec<MonthlyUsage>, filter: &MonthFilter) {
    monthly.retain(|m| filter.matches_month_key(&m.month));
}
