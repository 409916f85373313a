//! agstat - token usage and cost of AI coding agents from their local logs

use agstat::{
    aggregation::{Aggregator, filter_monthly_data},
    cli::{Cli, Provider, Report, parse_date_filter, parse_month_filter, resolve_provider_report},
    live_monitor::{LiveMonitor, LiveView},
};
use agstat_core::aggregation_types::Totals;
use agstat_core::clock::{Clock, SystemClock};
use agstat_core::error::Result;
use agstat_core::filters::{MonthFilter, UsageFilter};
use agstat_core::provider::ProviderDataLoader;
use agstat_core::timezone::TimezoneConfig;
use agstat_pricing::{CostCalculator, PricingFetcher};
use agstat_terminal::get_formatter;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging(verbose: bool) {
    // --verbose wins over RUST_LOG
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("agstat=info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_filter(cli: &Cli, tz: &TimezoneConfig) -> Result<UsageFilter> {
    let mut filter = UsageFilter::new().with_timezone(tz.tz);
    if let Some(since) = &cli.since {
        filter = filter.with_since(parse_date_filter(since)?);
    }
    if let Some(until) = &cli.until {
        filter = filter.with_until(parse_date_filter(until)?);
    }
    if let Some(project) = &cli.project {
        filter = filter.with_project(project.clone());
    }
    Ok(filter)
}

fn build_month_filter(cli: &Cli) -> Result<MonthFilter> {
    let mut filter = MonthFilter::new();
    if let Some(since) = &cli.since {
        let (year, month) = parse_month_filter(since)?;
        filter = filter.with_since(year, month);
    }
    if let Some(until) = &cli.until {
        let (year, month) = parse_month_filter(until)?;
        filter = filter.with_until(year, month);
    }
    Ok(filter)
}

async fn run_report<L>(cli: &Cli, report: Report) -> Result<()>
where
    L: ProviderDataLoader + 'static,
{
    info!("Running {:?} report for {}", report, L::NAME);

    let tz_config = TimezoneConfig::from_cli(cli.timezone.as_deref(), cli.utc)?;
    info!("Using timezone: {}", tz_config.display_name());

    let show_progress = !cli.json && !cli.watch && is_terminal::is_terminal(std::io::stdout());
    let loader = Arc::new(L::new().await?);
    let pricing_fetcher = Arc::new(PricingFetcher::new(cli.offline).await);
    let cost_calculator = Arc::new(CostCalculator::new(pricing_fetcher));
    let filter = build_filter(cli, &tz_config)?;
    let aggregator =
        Arc::new(Aggregator::new(cost_calculator, tz_config.clone()).with_progress(show_progress));
    let formatter = get_formatter(cli.json, cli.full_model_names);

    if cli.watch {
        let view = match &report {
            Report::Blocks(args) => LiveView::Blocks(args.to_config()?),
            Report::Daily => LiveView::Daily,
            other => {
                return Err(agstat_core::AgstatError::InvalidArgument(format!(
                    "--watch supports the daily and blocks reports, not {other:?}"
                )));
            }
        };
        info!("Starting live monitoring mode");
        let monitor = LiveMonitor::new(
            loader,
            aggregator,
            filter,
            cli.mode,
            cli.json,
            cli.full_model_names,
            cli.interval,
            view,
        );
        return monitor.run().await;
    }

    let entries = filter.filter_stream(loader.load_entries());
    let output = match report {
        Report::Daily => {
            let daily = aggregator.aggregate_daily(entries, cli.mode).await?;
            formatter.format_daily(&daily, &Totals::from_daily(&daily))
        }
        Report::Monthly => {
            let daily = aggregator.aggregate_daily(entries, cli.mode).await?;
            let mut monthly = Aggregator::aggregate_monthly(&daily);
            filter_monthly_data(&mut monthly, &build_month_filter(cli)?);
            formatter.format_monthly(&monthly, &Totals::from_monthly(&monthly))
        }
        Report::Session => {
            let sessions = aggregator.aggregate_sessions(entries, cli.mode).await?;
            formatter.format_sessions(&sessions, &Totals::from_sessions(&sessions), &tz_config.tz)
        }
        Report::Blocks(args) => {
            let config = args.to_config()?;
            let now = SystemClock.now();
            let entries = Aggregator::collect_sorted(entries).await?;
            let reports = aggregator
                .build_block_reports(entries, &config, cli.mode, now)
                .await?;
            formatter.format_blocks(&reports, &Totals::from_blocks(&reports), &tz_config.tz, now)
        }
    };
    println!("{output}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (provider, report) = resolve_provider_report(cli.command.as_ref());
    match provider {
        Provider::Claude => run_report::<agstat_provider_claude::DataLoader>(&cli, report).await,
        Provider::Codex => run_report::<agstat_provider_codex::DataLoader>(&cli, report).await,
    }
}
