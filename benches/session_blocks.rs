use agstat::aggregation::Aggregator;
use agstat_core::reconcile::{RawSnapshot, StreamReconciler};
use agstat_core::session_blocks::{BlocksConfig, identify_session_blocks};
use agstat_core::budget::TokenLimit;
use agstat_core::timezone::TimezoneConfig;
use agstat_core::types::{CostMode, ISOTimestamp, ModelName, SessionId, TokenCounts, UsageEntry};
use agstat_pricing::{CostCalculator, PricingFetcher};
use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;

fn create_timeline(count: usize) -> Vec<UsageEntry> {
    let base_time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let mut ts = base_time;
    (0..count)
        .map(|i| {
            // Mostly dense activity with a long break every 50 events
            ts += if i % 50 == 49 {
                Duration::hours(7)
            } else {
                Duration::minutes(3)
            };
            UsageEntry {
                session_id: SessionId::new(format!("session-{}", i / 50)),
                timestamp: ISOTimestamp::new(ts),
                model: ModelName::new(if i % 3 == 0 { "gpt-5-codex" } else { "gpt-5" }),
                tokens: TokenCounts::new((i * 100) as u64, (i * 10) as u64, 0, (i * 5) as u64),
                total_cost: None,
                project: Some(format!("project-{}", i % 5)),
            }
        })
        .collect()
}

fn benchmark_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("identify_session_blocks");
    for count in [1_000, 10_000, 100_000] {
        let entries = create_timeline(count);
        let now = *entries[count - 1].timestamp.inner();
        group.bench_with_input(BenchmarkId::from_parameter(count), &entries, |b, entries| {
            b.iter(|| identify_session_blocks(black_box(entries.clone()), Duration::hours(5), now))
        });
    }
    group.finish();
}

fn benchmark_reconcile(c: &mut Criterion) {
    c.bench_function("stream_reconciler_10k", |b| {
        b.iter(|| {
            let mut streams = StreamReconciler::new();
            let mut total = 0;
            for i in 0..10_000u64 {
                // Every 1000th reading restarts the counters
                let base = i % 1_000;
                let snapshot = RawSnapshot::new(base * 100, base * 10, base * 20, base);
                total += streams.observe(i % 8, snapshot).usage().total_tokens();
            }
            black_box(total)
        })
    });
}

fn benchmark_block_reports(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let aggregator = Aggregator::new(
        Arc::new(CostCalculator::new(Arc::new(PricingFetcher::with_table(
            HashMap::new(),
        )))),
        TimezoneConfig::utc(),
    );
    let entries = create_timeline(10_000);
    let now = *entries[entries.len() - 1].timestamp.inner();
    let config = BlocksConfig {
        token_limit: Some(TokenLimit::MaxObserved),
        ..BlocksConfig::default()
    };

    let mut group = c.benchmark_group("block_reports");
    group.sample_size(10);
    group.bench_function("build_block_reports_10k", |b| {
        b.iter(|| {
            runtime.block_on(async {
                aggregator
                    .build_block_reports(black_box(entries.clone()), &config, CostMode::Calculate, now)
                    .await
                    .unwrap()
            })
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_segmentation,
    benchmark_reconcile,
    benchmark_block_reports
);
criterion_main!(benches);
