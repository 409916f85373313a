//! Burn rate and end-of-window projection
//!
//! Both are linear: the projection assumes the block keeps consuming at the
//! pace observed between its first and last event, and claims nothing more.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session_blocks::SessionBlock;

/// Observed consumption pace of one block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRate {
    pub tokens_per_minute: f64,
    /// Input + output only; cache traffic would dwarf the signal
    pub tokens_per_minute_for_indicator: f64,
    pub cost_per_hour: f64,
}

/// Estimated totals at window close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedUsage {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub remaining_minutes: f64,
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// Pace between the block's first and last event
///
/// `None` for gap blocks, empty blocks, and blocks whose events all share
/// one timestamp.
///
/// # Examples
/// ```
/// use agstat_core::burn_rate::calculate_burn_rate;
/// use agstat_core::session_blocks::identify_session_blocks;
/// use agstat_core::types::*;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
/// let mk = |ts, input| UsageEntry {
///     session_id: SessionId::new("s"),
///     timestamp: ISOTimestamp::new(ts),
///     model: ModelName::new("gpt-5"),
///     tokens: TokenCounts::new(input, 0, 0, 0),
///     total_cost: None,
///     project: None,
/// };
/// let events = vec![mk(t0, 100), mk(t0 + Duration::minutes(60), 200)];
/// let blocks = identify_session_blocks(events, Duration::hours(5), t0);
/// let rate = calculate_burn_rate(&blocks[0]).unwrap();
/// assert_eq!(rate.tokens_per_minute, 5.0);
/// ```
pub fn calculate_burn_rate(block: &SessionBlock) -> Option<BurnRate> {
    if block.is_gap {
        return None;
    }
    let first = block.entries.first()?;
    let last = block.entries.last()?;

    let minutes = minutes_between(*first.timestamp.inner(), *last.timestamp.inner());
    if !minutes.is_finite() || minutes <= 0.0 {
        return None;
    }

    Some(BurnRate {
        tokens_per_minute: block.tokens.total() as f64 / minutes,
        tokens_per_minute_for_indicator: block.tokens.non_cached_total() as f64 / minutes,
        cost_per_hour: block.cost_usd / minutes * 60.0,
    })
}

/// Extrapolate the block's burn rate to its `end_time`
///
/// `None` unless the block is active with a defined burn rate and some
/// window time is left at `now`.
pub fn project_block_usage(block: &SessionBlock, now: DateTime<Utc>) -> Option<ProjectedUsage> {
    if !block.is_active || block.is_gap {
        return None;
    }
    let rate = calculate_burn_rate(block)?;

    let remaining_minutes = minutes_between(now, block.end_time).max(0.0);
    if remaining_minutes == 0.0 {
        return None;
    }

    let total_tokens =
        (block.tokens.total() as f64 + rate.tokens_per_minute * remaining_minutes).round() as u64;
    let total_cost = block.cost_usd + rate.cost_per_hour / 60.0 * remaining_minutes;

    Some(ProjectedUsage {
        total_tokens,
        total_cost: (total_cost * 100.0).round() / 100.0,
        remaining_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_blocks::identify_session_blocks;
    use crate::types::{ISOTimestamp, ModelName, SessionId, TokenCounts, UsageEntry};
    use chrono::{Duration, TimeZone};

    fn entry(ts: DateTime<Utc>, tokens: TokenCounts) -> UsageEntry {
        UsageEntry {
            session_id: SessionId::new("s"),
            timestamp: ISOTimestamp::new(ts),
            model: ModelName::new("claude-sonnet-4"),
            tokens,
            total_cost: None,
            project: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn hour_block(now: DateTime<Utc>) -> SessionBlock {
        let events = vec![
            entry(t0(), TokenCounts::new(50, 50, 0, 0)),
            entry(t0() + Duration::minutes(60), TokenCounts::new(100, 0, 0, 100)),
        ];
        let mut block = identify_session_blocks(events, Duration::hours(5), now).remove(0);
        block.cost_usd = 0.20;
        block
    }

    #[test]
    fn test_burn_rate_over_one_hour() {
        let block = hour_block(t0() + Duration::hours(10));
        let rate = calculate_burn_rate(&block).unwrap();
        assert_eq!(rate.tokens_per_minute, 5.0);
        assert!((rate.cost_per_hour - 0.20).abs() < 1e-12);
        // Cache reads are excluded from the indicator
        assert!((rate.tokens_per_minute_for_indicator - 200.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_burn_rate_single_event_is_none() {
        let block = identify_session_blocks(
            vec![entry(t0(), TokenCounts::new(1, 1, 0, 0))],
            Duration::hours(5),
            t0(),
        )
        .remove(0);
        assert!(calculate_burn_rate(&block).is_none());
    }

    #[test]
    fn test_burn_rate_gap_is_none() {
        let events = vec![
            entry(t0(), TokenCounts::new(1, 0, 0, 0)),
            entry(t0() + Duration::hours(8), TokenCounts::new(1, 0, 0, 0)),
        ];
        let blocks = identify_session_blocks(events, Duration::hours(5), t0());
        assert!(blocks[1].is_gap);
        assert!(calculate_burn_rate(&blocks[1]).is_none());
    }

    #[test]
    fn test_projection_extrapolates_linearly() {
        // Window 09:00-14:00, now 10:30 leaves 210 minutes
        let now = t0() + Duration::minutes(90);
        let block = hour_block(now);
        assert!(block.is_active);

        let p = project_block_usage(&block, now).unwrap();
        assert_eq!(p.remaining_minutes, 210.0);
        assert_eq!(p.total_tokens, 300 + 5 * 210);
        assert_eq!(p.total_cost, 0.9);
        assert!(p.total_tokens > block.total_tokens());
    }

    #[test]
    fn test_projection_requires_active_block() {
        let now = t0() + Duration::hours(6);
        let block = hour_block(now);
        assert!(!block.is_active);
        assert!(project_block_usage(&block, now).is_none());
    }

    #[test]
    fn test_projection_none_when_window_elapsed() {
        // Force an "active" flag at the very end of the window
        let now = t0() + Duration::hours(5);
        let mut block = hour_block(now);
        block.is_active = true;
        assert!(project_block_usage(&block, now).is_none());
    }
}
