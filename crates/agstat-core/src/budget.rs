//! Token-limit classification of session blocks
//!
//! The percentage shown to the user is always computed from the tokens a
//! block has actually used. The status is computed from the projected total
//! when one exists, so a block on pace to overrun is flagged before it does.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AgstatError;
use crate::session_blocks::SessionBlock;

/// Share of the limit at which a block turns to [`BudgetStatus::Warning`]
pub const WARNING_THRESHOLD: f64 = 0.8;

/// Configured token limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLimit {
    Fixed(u64),
    /// Largest total of any real block among the loaded blocks
    MaxObserved,
}

impl TokenLimit {
    /// Resolve to a concrete limit for this set of blocks
    ///
    /// `MaxObserved` resolves to `None` when no block has any usage.
    pub fn resolve(&self, blocks: &[SessionBlock]) -> Option<u64> {
        match self {
            Self::Fixed(n) => Some(*n),
            Self::MaxObserved => blocks
                .iter()
                .filter(|b| !b.is_gap)
                .map(|b| b.total_tokens())
                .max()
                .filter(|max| *max > 0),
        }
    }
}

impl FromStr for TokenLimit {
    type Err = AgstatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("max") {
            return Ok(Self::MaxObserved);
        }
        match s.replace('_', "").parse::<u64>() {
            Ok(n) if n > 0 => Ok(Self::Fixed(n)),
            _ => Err(AgstatError::InvalidTokenLimit(format!(
                "'{s}' (expected a positive integer or 'max')"
            ))),
        }
    }
}

impl fmt::Display for TokenLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::MaxObserved => write!(f, "max"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    Warning,
    Exceeds,
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Exceeds => write!(f, "exceeds"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAssessment {
    pub limit: u64,
    pub status: BudgetStatus,
    /// Actual usage as a percentage of `limit`
    pub usage_percent: f64,
}

/// Classify a block total against a token limit
///
/// # Examples
/// ```
/// use agstat_core::budget::{classify_budget, BudgetStatus};
///
/// // Only 500 used so far, but on pace for 1200
/// let a = classify_budget(500, Some(1_200), Some(1_000)).unwrap();
/// assert_eq!(a.status, BudgetStatus::Exceeds);
/// assert_eq!(a.usage_percent, 50.0);
///
/// assert!(classify_budget(500, None, None).is_none());
/// ```
pub fn classify_budget(
    actual_total: u64,
    projected_total: Option<u64>,
    limit: Option<u64>,
) -> Option<BudgetAssessment> {
    let limit = limit.filter(|l| *l > 0)?;
    let basis = projected_total.unwrap_or(actual_total);

    let status = if basis >= limit {
        BudgetStatus::Exceeds
    } else if basis as f64 >= limit as f64 * WARNING_THRESHOLD {
        BudgetStatus::Warning
    } else {
        BudgetStatus::Ok
    };

    Some(BudgetAssessment {
        limit,
        status,
        usage_percent: actual_total as f64 / limit as f64 * 100.0,
    })
}
