//! Command-line interface
//!
//! Two-level subcommands: `agstat [provider] <report> [flags]`. Without a
//! provider the report runs against Claude Code data, so `agstat blocks` is
//! `agstat claude blocks`.
//!
//! ```bash
//! # Codex session blocks with a fixed token budget
//! agstat codex blocks --token-limit 2_000_000
//!
//! # Active Claude block, refreshed every 10 seconds
//! agstat blocks --active --watch --interval 10
//!
//! # Monthly Claude usage in JSON
//! agstat monthly --since 2025-01 --json
//! ```

use agstat_core::budget::TokenLimit;
use agstat_core::error::{AgstatError, Result};
use agstat_core::session_blocks::{
    BlocksConfig, DEFAULT_RECENT_DAYS, DEFAULT_SESSION_DURATION_HOURS, MAX_RECENT_DAYS,
    session_duration_from_hours,
};
use agstat_core::types::CostMode;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Summarize token usage and cost of AI coding agents
#[derive(Parser, Debug, Clone)]
#[command(name = "agstat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational logging (default shows only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Cost calculation mode: auto, calculate or display
    #[arg(long, default_value = "auto", global = true)]
    pub mode: CostMode,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Only include usage on or after this date (YYYY-MM-DD or YYYY-MM)
    #[arg(long, global = true)]
    pub since: Option<String>,

    /// Only include usage on or before this date (YYYY-MM-DD or YYYY-MM)
    #[arg(long, global = true)]
    pub until: Option<String>,

    /// Only include usage from this project
    #[arg(long, short = 'p', global = true)]
    pub project: Option<String>,

    /// Timezone for dates, e.g. "Europe/Berlin" (defaults to the system zone)
    #[arg(long, short = 'z', global = true)]
    pub timezone: Option<String>,

    /// Use UTC for dates (overrides --timezone)
    #[arg(long, global = true)]
    pub utc: bool,

    /// Show full model ids instead of short names
    #[arg(long, global = true)]
    pub full_model_names: bool,

    /// Use bundled pricing data instead of fetching it
    #[arg(long, global = true)]
    pub offline: bool,

    /// Keep refreshing the report
    #[arg(long, short = 'w', global = true)]
    pub watch: bool,

    /// Refresh interval in seconds for --watch, clamped to 1..=60
    #[arg(long, default_value = "5", global = true)]
    pub interval: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Claude,
    Codex,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Claude => write!(f, "claude"),
            Provider::Codex => write!(f, "codex"),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct BlocksArgs {
    /// Show only the active block
    #[arg(long)]
    pub active: bool,

    /// Show only blocks from the last --recent-days days, plus the active one
    #[arg(long)]
    pub recent: bool,

    /// Days kept by --recent
    #[arg(long, default_value_t = DEFAULT_RECENT_DAYS)]
    pub recent_days: i64,

    /// Token limit per block: a number, or "max" for the largest past block
    #[arg(long)]
    pub token_limit: Option<TokenLimit>,

    /// Session block length in hours
    #[arg(long, default_value_t = DEFAULT_SESSION_DURATION_HOURS)]
    pub session_duration: f64,
}

impl Default for BlocksArgs {
    fn default() -> Self {
        Self {
            active: false,
            recent: false,
            recent_days: DEFAULT_RECENT_DAYS,
            token_limit: None,
            session_duration: DEFAULT_SESSION_DURATION_HOURS,
        }
    }
}

impl BlocksArgs {
    pub fn to_config(&self) -> Result<BlocksConfig> {
        if !(1..=MAX_RECENT_DAYS).contains(&self.recent_days) {
            return Err(AgstatError::InvalidArgument(format!(
                "--recent-days must be between 1 and {MAX_RECENT_DAYS}, got {}",
                self.recent_days
            )));
        }
        Ok(BlocksConfig {
            session_duration: session_duration_from_hours(self.session_duration)?,
            token_limit: self.token_limit,
            recent_days: self.recent_days,
            active_only: self.active,
            recent_only: self.recent,
        })
    }
}

#[derive(Subcommand, Debug, Clone, Default)]
pub enum Report {
    /// Usage per day
    #[default]
    Daily,
    /// Usage per month
    Monthly,
    /// Usage per session
    Session,
    /// Usage in fixed-length session blocks
    Blocks(BlocksArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Claude Code usage
    Claude {
        #[command(subcommand)]
        report: Report,
    },
    /// Codex CLI usage
    Codex {
        #[command(subcommand)]
        report: Report,
    },

    /// Usage per day (provider: claude)
    Daily,
    /// Usage per month (provider: claude)
    Monthly,
    /// Usage per session (provider: claude)
    Session,
    /// Usage in fixed-length session blocks (provider: claude)
    Blocks(BlocksArgs),
}

/// Provider and report for a parsed command; no command means Claude daily
pub fn resolve_provider_report(cmd: Option<&Command>) -> (Provider, Report) {
    match cmd.cloned() {
        None => (Provider::Claude, Report::default()),
        Some(Command::Claude { report }) => (Provider::Claude, report),
        Some(Command::Codex { report }) => (Provider::Codex, report),
        Some(Command::Daily) => (Provider::Claude, Report::Daily),
        Some(Command::Monthly) => (Provider::Claude, Report::Monthly),
        Some(Command::Session) => (Provider::Claude, Report::Session),
        Some(Command::Blocks(args)) => (Provider::Claude, Report::Blocks(args)),
    }
}

/// Parse `YYYY-MM-DD`, or `YYYY-MM` as the first of that month
///
/// ```
/// use agstat::cli::parse_date_filter;
/// use chrono::Datelike;
///
/// assert_eq!(parse_date_filter("2025-02-14").unwrap().day(), 14);
/// assert_eq!(parse_date_filter("2025-02").unwrap().day(), 1);
/// assert!(parse_date_filter("2025").is_err());
/// ```
pub fn parse_date_filter(date_str: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }
    if date_str.split('-').count() != 2 {
        return Err(AgstatError::InvalidDate(format!(
            "Invalid date format '{date_str}', expected YYYY-MM-DD or YYYY-MM"
        )));
    }
    let (year, month) = parse_month_filter(date_str)?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AgstatError::InvalidDate(format!("Invalid date: {date_str}")))
}

/// Parse `YYYY-MM` (a full date is accepted and its day ignored)
pub fn parse_month_filter(month_str: &str) -> Result<(i32, u32)> {
    let parts: Vec<&str> = month_str.split('-').collect();
    let (year, month) = match parts.as_slice() {
        [y, m] | [y, m, _] => (*y, *m),
        _ => {
            return Err(AgstatError::InvalidDate(format!(
                "Invalid date format '{month_str}', expected YYYY-MM-DD or YYYY-MM"
            )));
        }
    };
    let year = year
        .parse::<i32>()
        .map_err(|_| AgstatError::InvalidDate(format!("Invalid year in '{month_str}'")))?;
    let month = month
        .parse::<u32>()
        .map_err(|_| AgstatError::InvalidDate(format!("Invalid month in '{month_str}'")))?;
    if !(1..=12).contains(&month) {
        return Err(AgstatError::InvalidDate(format!(
            "Month must be between 1-12, got {month}"
        )));
    }
    Ok((year, month))
}
