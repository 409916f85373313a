//! Shared builders and fixtures for agstat integration tests

#![allow(dead_code)]

use agstat::aggregation::Aggregator;
use agstat_core::timezone::TimezoneConfig;
use agstat_core::types::{ISOTimestamp, ModelName, ModelPricing, SessionId, TokenCounts, UsageEntry};
use agstat_pricing::{CostCalculator, PricingFetcher};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// 2025-09-15 00:00 UTC; most fixtures are laid out relative to this
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 0, 0, 0).unwrap()
}

/// Builder for test `UsageEntry` values
pub struct UsageEntryBuilder {
    session_id: String,
    timestamp: DateTime<Utc>,
    model: String,
    tokens: TokenCounts,
    total_cost: Option<f64>,
    project: Option<String>,
}

impl UsageEntryBuilder {
    pub fn new() -> Self {
        Self {
            session_id: "test-session".to_string(),
            timestamp: base_time(),
            model: "gpt-5-codex".to_string(),
            tokens: TokenCounts::new(100, 50, 0, 0),
            total_cost: None,
            project: None,
        }
    }

    pub fn with_session_id(mut self, id: &str) -> Self {
        self.session_id = id.to_string();
        self
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = ts;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens = TokenCounts::new(input, output, 0, 0);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.total_cost = Some(cost);
        self
    }

    pub fn with_project(mut self, project: &str) -> Self {
        self.project = Some(project.to_string());
        self
    }

    pub fn build(self) -> UsageEntry {
        UsageEntry {
            session_id: SessionId::new(self.session_id),
            timestamp: ISOTimestamp::new(self.timestamp),
            model: ModelName::new(self.model),
            tokens: self.tokens,
            total_cost: self.total_cost,
            project: self.project,
        }
    }
}

impl Default for UsageEntryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregator in UTC whose only priced model is `gpt-5-codex`
/// at $1 per million input and $10 per million output tokens
pub fn test_aggregator() -> Aggregator {
    let mut table = HashMap::new();
    table.insert(
        "gpt-5-codex".to_string(),
        ModelPricing {
            input_cost_per_token: Some(0.000_001),
            output_cost_per_token: Some(0.000_01),
            cache_creation_input_token_cost: None,
            cache_read_input_token_cost: Some(0.000_000_1),
        },
    );
    let fetcher = Arc::new(PricingFetcher::with_table(table));
    Aggregator::new(Arc::new(CostCalculator::new(fetcher)), TimezoneConfig::utc())
}

/// One Codex rollout `token_count` event carrying cumulative totals
pub fn codex_token_count(ts: &str, input: u64, cached: u64, output: u64) -> String {
    format!(
        r#"{{"timestamp":"{ts}","type":"event_msg","payload":{{"type":"token_count","info":{{"total_token_usage":{{"input_tokens":{input},"cached_input_tokens":{cached},"output_tokens":{output},"reasoning_output_tokens":0,"total_tokens":{}}}}}}}}}"#,
        input + output
    )
}

/// Write a rollout file with a session header and model context
pub fn write_codex_session(sessions_dir: &Path, name: &str, model: &str, events: &[String]) {
    let day_dir = sessions_dir.join("2025").join("09").join("15");
    std::fs::create_dir_all(&day_dir).unwrap();
    let mut file = std::fs::File::create(day_dir.join(format!("{name}.jsonl"))).unwrap();
    writeln!(
        file,
        r#"{{"timestamp":"2025-09-15T00:00:00Z","type":"session_meta","payload":{{"id":"{name}","cwd":"/work/agstat"}}}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"timestamp":"2025-09-15T00:00:00Z","type":"turn_context","payload":{{"model":"{model}"}}}}"#
    )
    .unwrap();
    for line in events {
        writeln!(file, "{line}").unwrap();
    }
}
