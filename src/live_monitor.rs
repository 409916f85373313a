//! Periodic re-rendering of a report
//!
//! Every tick reloads all entries from the provider and rebuilds the report
//! from scratch; nothing is carried over between frames. The loop ends on
//! Ctrl-C or when the shutdown future passed to [`LiveMonitor::run_until`]
//! completes.

use crate::aggregation::Aggregator;
use agstat_core::aggregation_types::Totals;
use agstat_core::clock::{Clock, SystemClock};
use agstat_core::error::Result;
use agstat_core::filters::UsageFilter;
use agstat_core::provider::ProviderDataLoader;
use agstat_core::session_blocks::BlocksConfig;
use agstat_core::types::CostMode;
use agstat_terminal::{BlocksMonitor, get_formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

pub const MIN_INTERVAL_SECS: u64 = 1;
pub const MAX_INTERVAL_SECS: u64 = 60;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

/// What each frame shows
#[derive(Debug, Clone)]
pub enum LiveView {
    Daily,
    Blocks(BlocksConfig),
}

pub struct LiveMonitor<L> {
    loader: Arc<L>,
    aggregator: Arc<Aggregator>,
    filter: UsageFilter,
    cost_mode: CostMode,
    json_output: bool,
    full_model_names: bool,
    interval_secs: u64,
    view: LiveView,
    clock: Arc<dyn Clock>,
}

impl<L: ProviderDataLoader> LiveMonitor<L> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        loader: Arc<L>,
        aggregator: Arc<Aggregator>,
        filter: UsageFilter,
        cost_mode: CostMode,
        json_output: bool,
        full_model_names: bool,
        interval_secs: u64,
        view: LiveView,
    ) -> Self {
        let clamped = interval_secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
        if clamped != interval_secs {
            warn!(
                "Refresh interval {}s is out of range, using {}s",
                interval_secs, clamped
            );
        }
        Self {
            loader,
            aggregator,
            filter,
            cost_mode,
            json_output,
            full_model_names,
            interval_secs: clamped,
            view,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock, e.g. with a `FixedClock` in tests
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes; the first frame is always drawn
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        // The first tick completes immediately
        ticker.tick().await;
        self.refresh_display().await?;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("Live monitor shutting down");
                    if !self.json_output {
                        println!("\nExiting live monitoring mode...");
                    }
                    break;
                }
                _ = ticker.tick() => {
                    self.refresh_display().await?;
                }
            }
        }
        Ok(())
    }

    /// Build one frame of output
    pub async fn render_frame(&self) -> Result<String> {
        let now = self.clock.now();
        let entries = self.filter.clone().filter_stream(self.loader.load_entries());
        let formatter = get_formatter(self.json_output, self.full_model_names);

        match &self.view {
            LiveView::Daily => {
                let daily = self.aggregator.aggregate_daily(entries, self.cost_mode).await?;
                let totals = Totals::from_daily(&daily);
                Ok(formatter.format_daily(&daily, &totals))
            }
            LiveView::Blocks(config) => {
                let entries = Aggregator::collect_sorted(entries).await?;
                let reports = self
                    .aggregator
                    .build_block_reports(entries, config, self.cost_mode, now)
                    .await?;
                let tz = self.aggregator.timezone_config().tz;

                if self.json_output {
                    let totals = Totals::from_blocks(&reports);
                    return Ok(formatter.format_blocks(&reports, &totals, &tz, now));
                }
                let monitor = BlocksMonitor::new(tz, self.interval_secs);
                Ok(match reports.iter().find(|r| r.block.is_active) {
                    Some(active) => monitor.render_active_block(active, now),
                    None => monitor.render_idle(now),
                })
            }
        }
    }

    async fn refresh_display(&self) -> Result<()> {
        let frame = self.render_frame().await?;
        if self.json_output {
            println!("{frame}");
        } else {
            print!("{CLEAR_SCREEN}");
            println!("{frame}");
        }
        Ok(())
    }
}
