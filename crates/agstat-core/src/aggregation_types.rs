//! Report row types
//!
//! Plain data produced by the aggregator in the `agstat` crate and consumed
//! by the formatters in `agstat-terminal`. Nothing here prices or loads
//! anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::budget::BudgetAssessment;
use crate::burn_rate::{BurnRate, ProjectedUsage};
use crate::session_blocks::SessionBlock;
use crate::types::{DailyDate, ModelName, SessionId, TokenCounts};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: DailyDate,
    pub tokens: TokenCounts,
    pub total_cost: f64,
    /// Distinct models, in order of first use that day
    pub models_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyUsage {
    /// `YYYY-MM`
    pub month: String,
    pub tokens: TokenCounts,
    pub total_cost: f64,
    /// Days with any usage
    pub active_days: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUsage {
    pub session_id: SessionId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub tokens: TokenCounts,
    pub total_cost: f64,
    pub models_used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Tokens and cost of one model within a block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBreakdown {
    pub model: ModelName,
    pub tokens: TokenCounts,
    pub cost: f64,
}

/// A priced session block with everything derived from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockReport {
    pub block: SessionBlock,
    pub model_breakdowns: Vec<ModelBreakdown>,
    pub burn_rate: Option<BurnRate>,
    pub projection: Option<ProjectedUsage>,
    pub budget: Option<BudgetAssessment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Totals {
    pub tokens: TokenCounts,
    pub total_cost: f64,
}

impl Totals {
    fn accumulate<'a>(rows: impl IntoIterator<Item = (&'a TokenCounts, f64)>) -> Self {
        rows.into_iter().fold(Self::default(), |mut acc, (tokens, cost)| {
            acc.tokens += *tokens;
            acc.total_cost += cost;
            acc
        })
    }

    pub fn from_daily(rows: &[DailyUsage]) -> Self {
        Self::accumulate(rows.iter().map(|r| (&r.tokens, r.total_cost)))
    }

    pub fn from_monthly(rows: &[MonthlyUsage]) -> Self {
        Self::accumulate(rows.iter().map(|r| (&r.tokens, r.total_cost)))
    }

    pub fn from_sessions(rows: &[SessionUsage]) -> Self {
        Self::accumulate(rows.iter().map(|r| (&r.tokens, r.total_cost)))
    }

    /// Gap blocks carry no usage, so they add nothing
    pub fn from_blocks(rows: &[BlockReport]) -> Self {
        Self::accumulate(rows.iter().map(|r| (&r.block.tokens, r.block.cost_usd)))
    }
}
