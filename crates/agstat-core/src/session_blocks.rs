//! Session block segmentation
//!
//! Usage is billed in rolling windows (5 hours by default) that open with
//! the first request after an idle period. This module partitions a
//! time-sorted event list into those windows. Whenever the silence between
//! two events is longer than the window, it also inserts a synthetic *gap*
//! block, so a rendered timeline shows the idle stretch.
//!
//! A new block starts when an event lands more than one window after the
//! current block's (hour-floored) start, or more than one window after the
//! previous event. Only the second condition produces a gap block.
//!
//! Blocks are rebuilt from scratch on every report; nothing here is stored.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::budget::TokenLimit;
use crate::error::{AgstatError, Result};
use crate::types::{ModelName, TokenCounts, UsageEntry};

/// Default billing window length in hours
pub const DEFAULT_SESSION_DURATION_HOURS: f64 = 5.0;

/// Default look-back for [`filter_recent_blocks`], in days
pub const DEFAULT_RECENT_DAYS: i64 = 3;

/// Largest accepted `--recent-days`
pub const MAX_RECENT_DAYS: i64 = 3_650;

/// Accepted window lengths: one minute up to one week
pub const MIN_SESSION_DURATION_HOURS: f64 = 1.0 / 60.0;
pub const MAX_SESSION_DURATION_HOURS: f64 = 24.0 * 7.0;

/// One billing window, or an idle gap between two windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBlock {
    /// RFC 3339 start time, prefixed with `gap-` for gap blocks
    pub id: String,
    /// Window start, floored to the hour (gap blocks: end of the idle tolerance)
    pub start_time: DateTime<Utc>,
    /// `start_time + window` (gap blocks: the next event's timestamp)
    pub end_time: DateTime<Utc>,
    /// Timestamp of the last contained event
    pub actual_end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_gap: bool,
    /// Contained events in timestamp order
    pub entries: Vec<UsageEntry>,
    pub tokens: TokenCounts,
    /// Zero until the pricing pass fills it in
    pub cost_usd: f64,
    /// Distinct models in order of first use
    pub models: Vec<ModelName>,
}

impl SessionBlock {
    /// Timestamp of the first contained event
    pub fn actual_start_time(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|e| *e.timestamp.inner())
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens.total()
    }

    fn gap(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: format!("gap-{}", start.to_rfc3339()),
            start_time: start,
            end_time: end,
            actual_end_time: None,
            is_active: false,
            is_gap: true,
            entries: Vec::new(),
            tokens: TokenCounts::default(),
            cost_usd: 0.0,
            models: Vec::new(),
        }
    }
}

/// Settings for the blocks report
#[derive(Debug, Clone)]
pub struct BlocksConfig {
    pub session_duration: Duration,
    pub token_limit: Option<TokenLimit>,
    pub recent_days: i64,
    /// Keep only blocks that are currently active
    pub active_only: bool,
    /// Apply [`filter_recent_blocks`] with `recent_days`
    pub recent_only: bool,
}

impl Default for BlocksConfig {
    fn default() -> Self {
        Self {
            session_duration: Duration::hours(DEFAULT_SESSION_DURATION_HOURS as i64),
            token_limit: None,
            recent_days: DEFAULT_RECENT_DAYS,
            active_only: false,
            recent_only: false,
        }
    }
}

/// Convert a window length given in (possibly fractional) hours
///
/// # Examples
/// ```
/// use agstat_core::session_blocks::session_duration_from_hours;
///
/// assert_eq!(session_duration_from_hours(1.5).unwrap().num_minutes(), 90);
/// assert!(session_duration_from_hours(0.0).is_err());
/// assert!(session_duration_from_hours(1e10).is_err());
/// ```
pub fn session_duration_from_hours(hours: f64) -> Result<Duration> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(AgstatError::InvalidSessionDuration(format!(
            "{hours} (must be a positive number of hours)"
        )));
    }
    if !(MIN_SESSION_DURATION_HOURS..=MAX_SESSION_DURATION_HOURS).contains(&hours) {
        return Err(AgstatError::InvalidSessionDuration(format!(
            "{hours} (must be between 1 minute and {MAX_SESSION_DURATION_HOURS} hours)"
        )));
    }
    Ok(Duration::milliseconds((hours * 3_600_000.0).round() as i64))
}

/// Truncate to the start of the containing UTC hour
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

/// Working set of the block currently being filled
struct OpenBlock {
    start: DateTime<Utc>,
    entries: Vec<UsageEntry>,
}

impl OpenBlock {
    fn starting_with(entry: UsageEntry) -> Self {
        Self {
            start: floor_to_hour(*entry.timestamp.inner()),
            entries: vec![entry],
        }
    }

    fn finish(self, window: Duration, now: DateTime<Utc>) -> SessionBlock {
        let end_time = self
            .start
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let actual_end_time = self.entries.last().map(|e| *e.timestamp.inner());

        // Both must hold: a block can still be inside its window yet long idle
        let is_active = actual_end_time
            .map(|last| now - last < window && now < end_time)
            .unwrap_or(false);

        let tokens = self.entries.iter().map(|e| e.tokens).sum();
        let mut models: Vec<ModelName> = Vec::new();
        for entry in &self.entries {
            if !models.contains(&entry.model) {
                models.push(entry.model.clone());
            }
        }

        SessionBlock {
            id: self.start.to_rfc3339(),
            start_time: self.start,
            end_time,
            actual_end_time,
            is_active,
            is_gap: false,
            entries: self.entries,
            tokens,
            cost_usd: 0.0,
            models,
        }
    }
}

/// Partition time-sorted events into session blocks
///
/// Callers sort `entries` ascending by timestamp; unsorted input is a bug
/// upstream and trips a debug assertion.
///
/// # Examples
/// ```
/// use agstat_core::session_blocks::identify_session_blocks;
/// use agstat_core::types::*;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let at = |h| UsageEntry {
///     session_id: SessionId::new("s"),
///     timestamp: ISOTimestamp::new(Utc.with_ymd_and_hms(2025, 1, 1, h, 15, 0).unwrap()),
///     model: ModelName::new("gpt-5"),
///     tokens: TokenCounts::new(10, 10, 0, 0),
///     total_cost: None,
///     project: None,
/// };
///
/// let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
/// let blocks = identify_session_blocks(vec![at(1), at(8)], Duration::hours(5), now);
/// assert_eq!(blocks.len(), 3);
/// assert!(blocks[1].is_gap);
/// ```
pub fn identify_session_blocks(
    entries: Vec<UsageEntry>,
    window: Duration,
    now: DateTime<Utc>,
) -> Vec<SessionBlock> {
    debug_assert!(
        entries.is_sorted_by_key(|e| e.timestamp),
        "session block input must be sorted by timestamp"
    );

    let mut blocks = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for entry in entries {
        let ts = *entry.timestamp.inner();

        let Some(mut current) = open.take() else {
            open = Some(OpenBlock::starting_with(entry));
            continue;
        };

        let prev_ts = current
            .entries
            .last()
            .map(|e| *e.timestamp.inner())
            .unwrap_or(current.start);
        let since_start = ts - current.start;
        let since_prev = ts - prev_ts;

        if since_start > window || since_prev > window {
            blocks.push(current.finish(window, now));
            if since_prev > window {
                blocks.push(SessionBlock::gap(prev_ts + window, ts));
            }
            open = Some(OpenBlock::starting_with(entry));
        } else {
            current.entries.push(entry);
            open = Some(current);
        }
    }

    if let Some(current) = open {
        blocks.push(current.finish(window, now));
    }

    blocks
}

/// Keep active blocks and blocks that started within the last `days`
pub fn filter_recent_blocks(
    blocks: Vec<SessionBlock>,
    days: i64,
    now: DateTime<Utc>,
) -> Vec<SessionBlock> {
    // A look-back past the representable range keeps everything
    let cutoff = Duration::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    blocks
        .into_iter()
        .filter(|b| b.is_active || b.start_time >= cutoff)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ISOTimestamp, SessionId};
    use chrono::TimeZone;

    fn entry(ts: DateTime<Utc>, model: &str, input: u64) -> UsageEntry {
        UsageEntry {
            session_id: SessionId::new("stream-1"),
            timestamp: ISOTimestamp::new(ts),
            model: ModelName::new(model),
            tokens: TokenCounts::new(input, 0, 0, 0),
            total_cost: None,
            project: None,
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap()
    }

    fn far_future() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert!(identify_session_blocks(Vec::new(), Duration::hours(5), base()).is_empty());
    }

    #[test]
    fn test_single_event_block() {
        let blocks = identify_session_blocks(
            vec![entry(base(), "gpt-5", 42)],
            Duration::hours(5),
            far_future(),
        );
        assert_eq!(blocks.len(), 1);
        let b = &blocks[0];
        assert_eq!(b.start_time, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(b.end_time, Utc.with_ymd_and_hms(2024, 1, 1, 15, 0, 0).unwrap());
        assert_eq!(b.actual_end_time, Some(base()));
        assert_eq!(b.entries.len(), 1);
        assert_eq!(b.tokens.input_tokens, 42);
        assert_eq!(b.cost_usd, 0.0);
        assert!(!b.is_active);
        assert_eq!(b.id, "2024-01-01T10:00:00+00:00");
    }

    #[test]
    fn test_four_hours_apart_is_one_block() {
        let blocks = identify_session_blocks(
            vec![entry(base(), "a", 1), entry(base() + Duration::hours(4), "a", 1)],
            Duration::hours(5),
            far_future(),
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].entries.len(), 2);
    }

    #[test]
    fn test_six_hours_apart_inserts_gap() {
        let later = base() + Duration::hours(6);
        let blocks = identify_session_blocks(
            vec![entry(base(), "a", 1), entry(later, "b", 2)],
            Duration::hours(5),
            far_future(),
        );
        assert_eq!(blocks.len(), 3);
        assert!(!blocks[0].is_gap);
        assert!(blocks[1].is_gap);
        assert!(!blocks[2].is_gap);

        let gap = &blocks[1];
        assert_eq!(gap.start_time, base() + Duration::hours(5));
        assert_eq!(gap.end_time, later);
        assert!(gap.entries.is_empty());
        assert!(gap.models.is_empty());
        assert_eq!(gap.tokens, TokenCounts::default());
        assert!(!gap.is_active);
        assert!(gap.id.starts_with("gap-"));

        assert_eq!(blocks[2].start_time, Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_window_rollover_without_gap() {
        // Steady activity every 2h: the window closes on elapsed time since
        // block start, but no gap is inserted
        let events: Vec<_> = (0..4)
            .map(|i| entry(base() + Duration::hours(2 * i), "a", 1))
            .collect();
        let blocks = identify_session_blocks(events, Duration::hours(5), far_future());
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| !b.is_gap));
        assert_eq!(blocks[0].entries.len(), 3);
        assert_eq!(blocks[1].entries.len(), 1);
        assert_eq!(blocks[1].start_time, Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_event_exactly_at_window_stays() {
        // Boundaries are strict: exactly one window later still belongs
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let blocks = identify_session_blocks(
            vec![entry(start, "a", 1), entry(start + Duration::hours(5), "a", 1)],
            Duration::hours(5),
            far_future(),
        );
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_models_deduplicated_in_order() {
        let events = vec![
            entry(base(), "sonnet", 1),
            entry(base() + Duration::minutes(5), "opus", 1),
            entry(base() + Duration::minutes(10), "sonnet", 1),
        ];
        let blocks = identify_session_blocks(events, Duration::hours(5), far_future());
        let names: Vec<_> = blocks[0].models.iter().map(|m| m.as_str()).collect();
        assert_eq!(names, vec!["sonnet", "opus"]);
        assert_eq!(blocks[0].tokens.input_tokens, 3);
    }

    #[test]
    fn test_active_requires_recent_activity_and_open_window() {
        let events = vec![entry(base(), "a", 1)];
        let window = Duration::hours(5);

        let now = base() + Duration::hours(1);
        assert!(identify_session_blocks(events.clone(), window, now)[0].is_active);

        // Window (10:00-15:00) has closed even though last activity was < 5h ago
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 15, 10, 0).unwrap();
        assert!(!identify_session_blocks(events, window, now)[0].is_active);
    }

    #[test]
    fn test_custom_window() {
        let events = vec![
            entry(base(), "a", 1),
            entry(base() + Duration::minutes(90), "a", 1),
        ];
        let blocks = identify_session_blocks(events, Duration::hours(1), far_future());
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].start_time, base() + Duration::hours(1));
    }

    #[test]
    #[should_panic(expected = "sorted")]
    #[cfg(debug_assertions)]
    fn test_unsorted_input_is_rejected_in_debug() {
        let events = vec![entry(base() + Duration::hours(1), "a", 1), entry(base(), "a", 1)];
        identify_session_blocks(events, Duration::hours(5), far_future());
    }

    #[test]
    fn test_filter_recent_blocks() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let events = vec![
            entry(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(), "a", 1),
            entry(Utc.with_ymd_and_hms(2024, 1, 9, 9, 0, 0).unwrap(), "a", 1),
            entry(Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap(), "a", 1),
        ];
        let blocks = identify_session_blocks(events, Duration::hours(5), now);
        assert_eq!(blocks.len(), 5);

        let recent = filter_recent_blocks(blocks, DEFAULT_RECENT_DAYS, now);
        assert_eq!(recent.len(), 3);
        assert!(recent.last().is_some_and(|b| b.is_active));

        let again = filter_recent_blocks(recent.clone(), DEFAULT_RECENT_DAYS, now);
        let ids = |v: &[SessionBlock]| v.iter().map(|b| b.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&again), ids(&recent));
    }

    #[test]
    fn test_session_duration_from_hours() {
        assert_eq!(session_duration_from_hours(5.0).unwrap(), Duration::hours(5));
        assert!(session_duration_from_hours(-1.0).is_err());
        assert!(session_duration_from_hours(f64::NAN).is_err());
    }

    #[test]
    fn test_session_duration_bounds() {
        let minute = session_duration_from_hours(MIN_SESSION_DURATION_HOURS).unwrap();
        assert_eq!(minute, Duration::minutes(1));
        let week = session_duration_from_hours(MAX_SESSION_DURATION_HOURS).unwrap();
        assert_eq!(week, Duration::days(7));

        for hours in [1e-9, 0.01, 168.5, 1e10, f64::INFINITY] {
            assert!(
                matches!(
                    session_duration_from_hours(hours),
                    Err(AgstatError::InvalidSessionDuration(_))
                ),
                "{hours} hours should be rejected"
            );
        }
    }

    #[test]
    fn test_huge_window_saturates_end_time() {
        let blocks = identify_session_blocks(
            vec![entry(base(), "a", 1)],
            Duration::MAX,
            far_future(),
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].end_time, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_huge_recent_days_keeps_everything() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let events = vec![
            entry(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(), "a", 1),
            entry(Utc.with_ymd_and_hms(2024, 1, 9, 9, 0, 0).unwrap(), "a", 1),
        ];
        let blocks = identify_session_blocks(events, Duration::hours(5), now);
        let count = blocks.len();

        for days in [10_000_000_000_000, i64::MAX] {
            assert_eq!(filter_recent_blocks(blocks.clone(), days, now).len(), count);
        }
    }
}
