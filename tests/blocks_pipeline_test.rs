//! Codex rollout files through reconciliation, segmentation, projection
//! and budget classification, down to the rendered reports

mod common;

use agstat::aggregation::Aggregator;
use agstat_core::aggregation_types::Totals;
use agstat_core::budget::{BudgetStatus, TokenLimit};
use agstat_core::provider::ProviderDataLoader;
use agstat_core::session_blocks::BlocksConfig;
use agstat_core::types::CostMode;
use agstat_provider_codex::DataLoader;
use agstat_terminal::get_formatter;
use chrono::{DateTime, TimeZone, Utc};
use common::{codex_token_count, test_aggregator, write_codex_session};
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 10, 30, 0).unwrap()
}

/// An evening session on the 14th and a morning session on the 15th whose
/// counters restart once mid-session
fn codex_fixture() -> (TempDir, DataLoader) {
    let tmp = TempDir::new().unwrap();
    let sessions = tmp.path().join("sessions");

    write_codex_session(
        &sessions,
        "evening",
        "gpt-5-codex",
        &[codex_token_count("2025-09-14T20:00:00Z", 50_000, 0, 5_000)],
    );
    write_codex_session(
        &sessions,
        "morning",
        "gpt-5-codex",
        &[
            codex_token_count("2025-09-15T09:10:00Z", 10_000, 2_000, 1_000),
            codex_token_count("2025-09-15T09:40:00Z", 20_000, 2_000, 3_000),
            // Counters went backwards
            codex_token_count("2025-09-15T10:10:00Z", 5_000, 0, 500),
        ],
    );

    let loader = DataLoader::from_sessions_dir(sessions);
    (tmp, loader)
}

async fn reports(config: &BlocksConfig) -> Vec<agstat_core::aggregation_types::BlockReport> {
    let (_tmp, loader) = codex_fixture();
    let entries = Aggregator::collect_sorted(loader.load_entries()).await.unwrap();
    test_aggregator()
        .build_block_reports(entries, config, CostMode::Auto, now())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_timeline_is_segmented_with_gap() {
    let reports = reports(&BlocksConfig::default()).await;

    assert_eq!(reports.len(), 3);
    let (evening, gap, morning) = (&reports[0].block, &reports[1].block, &reports[2].block);

    assert_eq!(evening.start_time, Utc.with_ymd_and_hms(2025, 9, 14, 20, 0, 0).unwrap());
    assert_eq!(evening.total_tokens(), 55_000);
    assert!(!evening.is_active);

    assert!(gap.is_gap);
    assert_eq!(gap.start_time, Utc.with_ymd_and_hms(2025, 9, 15, 1, 0, 0).unwrap());
    assert_eq!(gap.end_time, Utc.with_ymd_and_hms(2025, 9, 15, 9, 10, 0).unwrap());
    assert!(reports[1].budget.is_none());

    assert_eq!(morning.start_time, Utc.with_ymd_and_hms(2025, 9, 15, 9, 0, 0).unwrap());
    assert_eq!(morning.end_time, Utc.with_ymd_and_hms(2025, 9, 15, 14, 0, 0).unwrap());
    assert!(morning.is_active);
    assert_eq!(morning.entries.len(), 3);
}

#[tokio::test]
async fn test_reset_and_deltas_feed_the_active_block() {
    let reports = reports(&BlocksConfig::default()).await;
    let morning = &reports[2];

    // 11_000 + 12_000 from deltas, then 5_500 after the reset
    assert_eq!(morning.block.total_tokens(), 28_500);
    assert_eq!(morning.block.tokens.cache_read_tokens, 2_000);

    let rate = morning.burn_rate.unwrap();
    assert!((rate.tokens_per_minute - 475.0).abs() < 1e-9);

    let projection = morning.projection.unwrap();
    assert_eq!(projection.total_tokens, 28_500 + 475 * 210);
    assert!((projection.remaining_minutes - 210.0).abs() < 1e-9);

    // 8_000 in + 1_000 out + 2_000 cached, 10_000 in + 2_000 out, 5_000 in + 500 out
    assert!((morning.block.cost_usd - 0.0582).abs() < 1e-9);
}

#[tokio::test]
async fn test_fixed_limit_classifies_on_projection() {
    let config = BlocksConfig {
        token_limit: Some(TokenLimit::Fixed(100_000)),
        ..BlocksConfig::default()
    };
    let reports = reports(&config).await;

    let evening = reports[0].budget.unwrap();
    assert_eq!(evening.status, BudgetStatus::Ok);
    assert!((evening.usage_percent - 55.0).abs() < 1e-9);

    let morning = reports[2].budget.unwrap();
    assert_eq!(morning.status, BudgetStatus::Exceeds);
    assert!((morning.usage_percent - 28.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_max_limit_survives_active_filter() {
    let config = BlocksConfig {
        token_limit: Some(TokenLimit::MaxObserved),
        active_only: true,
        ..BlocksConfig::default()
    };
    let reports = reports(&config).await;

    assert_eq!(reports.len(), 1);
    let budget = reports[0].budget.unwrap();
    // Resolved against the evening block before filtering
    assert_eq!(budget.limit, 55_000);
    assert_eq!(budget.status, BudgetStatus::Exceeds);
}

#[tokio::test]
async fn test_recent_filter_keeps_active_block() {
    let config = BlocksConfig {
        recent_only: true,
        recent_days: 1,
        ..BlocksConfig::default()
    };
    let reports = reports(&config).await;

    // The evening block started 14.5h before now and is kept; nothing is dropped
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().any(|r| r.block.is_active));
}

#[tokio::test]
async fn test_blocks_json_report() {
    let config = BlocksConfig {
        token_limit: Some(TokenLimit::Fixed(100_000)),
        ..BlocksConfig::default()
    };
    let reports = reports(&config).await;
    let totals = Totals::from_blocks(&reports);
    let output = get_formatter(true, false).format_blocks(&reports, &totals, &chrono_tz::UTC, now());
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

    let blocks = parsed["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[1]["isGap"], true);
    assert_eq!(blocks[1]["tokenLimitStatus"], serde_json::Value::Null);

    let active = &blocks[2];
    assert_eq!(active["isActive"], true);
    assert_eq!(active["totalTokens"], 28_500);
    assert_eq!(active["models"][0], "gpt-5-codex");
    assert_eq!(active["tokenLimitStatus"]["status"], "exceeds");
    assert_eq!(active["tokenLimitStatus"]["projectedUsage"], 128_250);

    assert_eq!(parsed["totals"]["tokens"]["total"], 83_500);
}

#[tokio::test]
async fn test_blocks_table_report() {
    let reports = reports(&BlocksConfig::default()).await;
    let totals = Totals::from_blocks(&reports);
    let output = get_formatter(false, false).format_blocks(&reports, &totals, &chrono_tz::UTC, now());

    assert!(output.contains("ACTIVE"));
    assert!(output.contains("(idle)"));
    assert!(output.contains("28,500"));
    assert!(output.contains("Burn rate:"));
}
