//! Entry and month filters
//!
//! Date bounds are compared against the calendar day of each entry in the
//! reporting timezone, so `--since 2025-01-02` in Tokyo does not drop a
//! request made at 08:00 local time on the 2nd.
//!
//! # Examples
//!
//! ```
//! use agstat_core::filters::UsageFilter;
//! use chrono::NaiveDate;
//!
//! let filter = UsageFilter::new()
//!     .with_since(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
//!     .with_until(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap())
//!     .with_project("agstat".to_string());
//! assert!(filter.project.is_some());
//! ```

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use futures::{Stream, StreamExt};

use crate::error::Result;
use crate::types::UsageEntry;

/// Filter over individual usage entries
#[derive(Debug, Clone)]
pub struct UsageFilter {
    /// Inclusive lower bound
    pub since_date: Option<NaiveDate>,
    /// Inclusive upper bound
    pub until_date: Option<NaiveDate>,
    pub project: Option<String>,
    pub timezone: Tz,
}

impl Default for UsageFilter {
    fn default() -> Self {
        Self {
            since_date: None,
            until_date: None,
            project: None,
            timezone: Tz::UTC,
        }
    }
}

impl UsageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_since(mut self, date: NaiveDate) -> Self {
        self.since_date = Some(date);
        self
    }

    pub fn with_until(mut self, date: NaiveDate) -> Self {
        self.until_date = Some(date);
        self
    }

    pub fn with_project(mut self, project: String) -> Self {
        self.project = Some(project);
        self
    }

    /// Timezone used to turn timestamps into calendar days
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.since_date.is_none() && self.until_date.is_none() && self.project.is_none()
    }

    pub fn matches(&self, entry: &UsageEntry) -> bool {
        let day = *entry.timestamp.to_daily_date_with_tz(&self.timezone).inner();

        if self.since_date.is_some_and(|since| day < since) {
            return false;
        }
        if self.until_date.is_some_and(|until| day > until) {
            return false;
        }
        match &self.project {
            // Entries without a project never match a project filter
            Some(wanted) => entry.project.as_deref() == Some(wanted.as_str()),
            None => true,
        }
    }

    /// Drop non-matching entries from a stream, passing errors through
    pub fn filter_stream<S>(self, stream: S) -> impl Stream<Item = Result<UsageEntry>>
    where
        S: Stream<Item = Result<UsageEntry>>,
    {
        stream.filter(move |result| {
            let keep = match result {
                Ok(entry) => self.matches(entry),
                Err(_) => true,
            };
            futures::future::ready(keep)
        })
    }
}

/// Inclusive `(year, month)` range for the monthly report
#[derive(Debug, Clone, Default)]
pub struct MonthFilter {
    pub since: Option<(i32, u32)>,
    pub until: Option<(i32, u32)>,
}

impl MonthFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_since(mut self, year: i32, month: u32) -> Self {
        self.since = Some((year, month));
        self
    }

    pub fn with_until(mut self, year: i32, month: u32) -> Self {
        self.until = Some((year, month));
        self
    }

    pub fn matches_date(&self, date: &NaiveDate) -> bool {
        let ym = (date.year(), date.month());
        self.since.is_none_or(|since| ym >= since) && self.until.is_none_or(|until| ym <= until)
    }

    /// Match a `YYYY-MM` key; malformed keys never match
    pub fn matches_month_key(&self, key: &str) -> bool {
        let parsed = key
            .split_once('-')
            .and_then(|(y, m)| Some((y.parse::<i32>().ok()?, m.parse::<u32>().ok()?)))
            .and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1));
        parsed.is_some_and(|date| self.matches_date(&date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ISOTimestamp, ModelName, SessionId, TokenCounts};
    use chrono::{TimeZone, Utc};
    use futures::stream;

    fn entry_at(ts: chrono::DateTime<Utc>, project: Option<&str>) -> UsageEntry {
        UsageEntry {
            session_id: SessionId::new("s"),
            timestamp: ISOTimestamp::new(ts),
            model: ModelName::new("gpt-5"),
            tokens: TokenCounts::new(1, 1, 0, 0),
            total_cost: None,
            project: project.map(str::to_string),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_bounds_inclusive() {
        let filter = UsageFilter::new()
            .with_since(day(2025, 1, 10))
            .with_until(day(2025, 1, 20));

        let inside = entry_at(Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap(), None);
        let last = entry_at(Utc.with_ymd_and_hms(2025, 1, 20, 23, 59, 59).unwrap(), None);
        let before = entry_at(Utc.with_ymd_and_hms(2025, 1, 9, 23, 59, 59).unwrap(), None);
        assert!(filter.matches(&inside));
        assert!(filter.matches(&last));
        assert!(!filter.matches(&before));
    }

    #[test]
    fn test_timezone_shifts_calendar_day() {
        let filter = UsageFilter::new()
            .with_since(day(2025, 1, 2))
            .with_timezone(chrono_tz::Asia::Tokyo);
        // 23:30 UTC on the 1st is 08:30 on the 2nd in Tokyo
        let entry = entry_at(Utc.with_ymd_and_hms(2025, 1, 1, 23, 30, 0).unwrap(), None);
        assert!(filter.matches(&entry));
        assert!(!filter.clone().with_timezone(Tz::UTC).matches(&entry));
    }

    #[test]
    fn test_project_filter() {
        let filter = UsageFilter::new().with_project("web".to_string());
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(filter.matches(&entry_at(ts, Some("web"))));
        assert!(!filter.matches(&entry_at(ts, Some("api"))));
        assert!(!filter.matches(&entry_at(ts, None)));
    }

    #[tokio::test]
    async fn test_filter_stream_passes_errors() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let items = vec![
            Ok(entry_at(ts, Some("web"))),
            Ok(entry_at(ts, Some("api"))),
            Err(crate::AgstatError::Config("broken".to_string())),
        ];
        let filter = UsageFilter::new().with_project("web".to_string());
        let out: Vec<_> = filter.filter_stream(stream::iter(items)).collect().await;
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
    }

    #[test]
    fn test_month_filter() {
        let filter = MonthFilter::new().with_since(2024, 11).with_until(2025, 2);
        assert!(filter.matches_month_key("2024-11"));
        assert!(filter.matches_month_key("2025-02"));
        assert!(!filter.matches_month_key("2025-03"));
        assert!(!filter.matches_month_key("2024-10"));
        assert!(!filter.matches_month_key("garbage"));
    }
}
