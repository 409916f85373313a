//! Core domain types for agstat
//!
//! Every provider normalizes its log records into [`UsageEntry`] values
//! before anything else in the workspace looks at them. The newtypes here
//! keep model names, stream keys and timestamps from being mixed up with
//! arbitrary strings.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Model identifier as reported by the agent log
///
/// # Examples
/// ```
/// use agstat_core::types::ModelName;
///
/// let model = ModelName::new("gpt-5-codex");
/// assert_eq!(model.as_str(), "gpt-5-codex");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelName(String);

impl ModelName {
    /// Create a new ModelName from any string-like type
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stream key of a logical conversation
///
/// Claude Code writes one `sessionId` per conversation; Codex writes one
/// rollout file per session, so its loader uses the file stem. Cumulative
/// counters are reconciled per `SessionId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// UTC instant of a usage event
///
/// # Examples
/// ```
/// use agstat_core::types::ISOTimestamp;
/// use chrono::{TimeZone, Utc};
///
/// let ts = ISOTimestamp::new(Utc.with_ymd_and_hms(2025, 3, 9, 23, 30, 0).unwrap());
/// assert_eq!(ts.to_daily_date().format("%Y-%m-%d"), "2025-03-09");
///
/// // The calendar day depends on the reporting timezone
/// let tokyo = ts.to_daily_date_with_tz(&chrono_tz::Asia::Tokyo);
/// assert_eq!(tokyo.format("%Y-%m-%d"), "2025-03-10");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ISOTimestamp(DateTime<Utc>);

impl ISOTimestamp {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn inner(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse an RFC 3339 string, normalizing any offset to UTC
    pub fn parse(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    pub fn to_daily_date(&self) -> DailyDate {
        DailyDate::new(self.0.date_naive())
    }

    pub fn to_daily_date_with_tz(&self, tz: &Tz) -> DailyDate {
        DailyDate::new(self.0.with_timezone(tz).date_naive())
    }
}

impl From<DateTime<Utc>> for ISOTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

/// Calendar day used as the daily report key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DailyDate(NaiveDate);

impl DailyDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn inner(&self) -> &NaiveDate {
        &self.0
    }

    pub fn format(&self, fmt: &str) -> String {
        self.0.format(fmt).to_string()
    }
}

/// Token usage of one event, or the sum over many
///
/// `reasoning_tokens` is carried for display only. Both supported agents
/// already bill reasoning inside `output_tokens`, so it is never part of
/// [`TokenCounts::total`].
///
/// # Examples
/// ```
/// use agstat_core::types::TokenCounts;
///
/// let tokens = TokenCounts::new(100, 50, 10, 5).with_reasoning(30);
/// assert_eq!(tokens.total(), 165);
///
/// let combined = tokens + TokenCounts::new(50, 25, 5, 2);
/// assert_eq!(combined.input_tokens, 150);
/// assert_eq!(combined.reasoning_tokens, 30);
/// ```
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenCounts {
    /// Non-cached input tokens
    pub input_tokens: u64,
    /// Output tokens, reasoning included
    pub output_tokens: u64,
    /// Tokens written to the prompt cache
    pub cache_creation_tokens: u64,
    /// Tokens served from the prompt cache
    pub cache_read_tokens: u64,
    /// Reasoning tokens, informational
    #[serde(default)]
    pub reasoning_tokens: u64,
}

impl TokenCounts {
    pub fn new(
        input_tokens: u64,
        output_tokens: u64,
        cache_creation_tokens: u64,
        cache_read_tokens: u64,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_creation_tokens,
            cache_read_tokens,
            reasoning_tokens: 0,
        }
    }

    /// Attach an informational reasoning count
    pub fn with_reasoning(mut self, reasoning_tokens: u64) -> Self {
        self.reasoning_tokens = reasoning_tokens;
        self
    }

    /// Billable total: input, output and both cache counters
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }

    /// Input plus output, ignoring cache traffic
    pub fn non_cached_total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0 && self.reasoning_tokens == 0
    }
}

impl Add for TokenCounts {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl AddAssign for TokenCounts {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
    }
}

impl std::iter::Sum for TokenCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, t| acc + t)
    }
}

/// How costs are derived when building reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostMode {
    /// Use the cost recorded in the log when present, otherwise calculate
    #[default]
    Auto,
    /// Always calculate from tokens and the price table
    Calculate,
    /// Only show recorded costs; entries without one cost nothing
    Display,
}

impl fmt::Display for CostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Calculate => write!(f, "calculate"),
            Self::Display => write!(f, "display"),
        }
    }
}

impl std::str::FromStr for CostMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "calculate" => Ok(Self::Calculate),
            "display" => Ok(Self::Display),
            _ => Err(format!("Invalid cost mode: {s}")),
        }
    }
}

/// Per-token USD rates in LiteLLM's naming
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    pub input_cost_per_token: Option<f64>,
    pub output_cost_per_token: Option<f64>,
    pub cache_creation_input_token_cost: Option<f64>,
    pub cache_read_input_token_cost: Option<f64>,
}

/// One normalized usage event
///
/// Providers produce these with `tokens` already expressed as a delta for
/// this single request, whatever shape the source log used.
///
/// # Examples
/// ```
/// use agstat_core::types::{ISOTimestamp, ModelName, SessionId, TokenCounts, UsageEntry};
/// use chrono::Utc;
///
/// let entry = UsageEntry {
///     session_id: SessionId::new("rollout-2025-01-01"),
///     timestamp: ISOTimestamp::new(Utc::now()),
///     model: ModelName::new("gpt-5"),
///     tokens: TokenCounts::new(1000, 500, 0, 200),
///     total_cost: None,
///     project: Some("agstat".to_string()),
/// };
/// assert_eq!(entry.tokens.total(), 1700);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEntry {
    /// Stream key the event belongs to
    pub session_id: SessionId,
    pub timestamp: ISOTimestamp,
    pub model: ModelName,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    /// Cost recorded by the agent itself, when it writes one
    pub total_cost: Option<f64>,
    /// Project name derived from the working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_total_excludes_reasoning() {
        let tokens = TokenCounts::new(10, 20, 30, 40).with_reasoning(1_000);
        assert_eq!(tokens.total(), 100);
        assert_eq!(tokens.non_cached_total(), 30);
    }

    #[test]
    fn test_token_counts_sum() {
        let parts = vec![
            TokenCounts::new(1, 2, 3, 4),
            TokenCounts::new(10, 20, 30, 40).with_reasoning(5),
        ];
        let sum: TokenCounts = parts.into_iter().sum();
        assert_eq!(sum, TokenCounts::new(11, 22, 33, 44).with_reasoning(5));
    }

    #[test]
    fn test_is_zero() {
        assert!(TokenCounts::default().is_zero());
        assert!(!TokenCounts::default().with_reasoning(1).is_zero());
    }

    #[test]
    #[should_panic(expected = "overflow")]
    #[cfg(debug_assertions)]
    fn test_token_counts_overflow_debug() {
        let big = TokenCounts::new(u64::MAX, 0, 0, 0);
        let _ = big + TokenCounts::new(1, 0, 0, 0);
    }

    #[test]
    fn test_cost_mode_parsing() {
        assert_eq!("auto".parse::<CostMode>().unwrap(), CostMode::Auto);
        assert_eq!("CALCULATE".parse::<CostMode>().unwrap(), CostMode::Calculate);
        assert_eq!("display".parse::<CostMode>().unwrap(), CostMode::Display);
        assert!("free".parse::<CostMode>().is_err());
    }

    #[test]
    fn test_timestamp_parse_normalizes_offset() {
        let ts = ISOTimestamp::parse("2025-01-15T10:30:00+02:00").unwrap();
        assert_eq!(*ts.inner(), Utc.with_ymd_and_hms(2025, 1, 15, 8, 30, 0).unwrap());
        assert!(ISOTimestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_reasoning_defaults_when_missing() {
        let json = r#"{"input_tokens":1,"output_tokens":2,"cache_creation_tokens":0,"cache_read_tokens":0}"#;
        let tokens: TokenCounts = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.reasoning_tokens, 0);
    }

    #[test]
    fn test_usage_entry_json_fields() {
        let entry = UsageEntry {
            session_id: SessionId::new("s"),
            timestamp: ISOTimestamp::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            model: ModelName::new("gpt-5"),
            tokens: TokenCounts::new(1, 2, 0, 0),
            total_cost: None,
            project: Some("agstat".to_string()),
        };
        let value = serde_json::to_value(&entry).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "cache_creation_tokens",
                "cache_read_tokens",
                "input_tokens",
                "model",
                "output_tokens",
                "project",
                "reasoning_tokens",
                "session_id",
                "timestamp",
                "total_cost",
            ]
        );
    }
}
