//! Live view of the active session block
//!
//! Draws an ASCII box with three bars: time elapsed in the window, tokens
//! used against the limit, and tokens projected at window close.

use agstat_core::aggregation_types::BlockReport;
use agstat_core::budget::{BudgetStatus, WARNING_THRESHOLD};
use agstat_core::model_formatter::format_model_list;
use chrono::{DateTime, Duration, Utc};
use colored::*;
use std::fmt;

use crate::output::{format_currency, format_number};

const BOX_CORNER: &str = "+";
const BOX_HORIZONTAL: &str = "-";
const BOX_VERTICAL: &str = "|";

const PROGRESS_FULL: &str = "#";
const PROGRESS_EMPTY: &str = ".";
const BAR_WIDTH: usize = 40;

/// Tokens/min (input + output) above which the pace is shown as high
const HIGH_BURN_TOKENS_PER_MINUTE: f64 = 1_000.0;
const ELEVATED_BURN_TOKENS_PER_MINUTE: f64 = 500.0;

pub struct BlocksMonitor {
    width: usize,
    timezone: chrono_tz::Tz,
    refresh_secs: u64,
    /// Cleared by `NO_COLOR`
    colored_output: bool,
}

impl BlocksMonitor {
    pub fn new(timezone: chrono_tz::Tz, refresh_secs: u64) -> Self {
        let raw_width = terminal_width().unwrap_or(100);
        let width = if raw_width < 60 {
            raw_width.max(20)
        } else {
            raw_width.clamp(60, 120)
        };
        Self {
            width,
            timezone,
            refresh_secs,
            colored_output: std::env::var_os("NO_COLOR").is_none(),
        }
    }

    /// Fixed width and colors off, for stable output
    pub fn plain(timezone: chrono_tz::Tz, width: usize) -> Self {
        Self {
            width: width.max(20),
            timezone,
            refresh_secs: 5,
            colored_output: false,
        }
    }

    /// Frame shown when no block is active
    pub fn render_idle(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        out.push_str(&self.border());
        out.push_str(&self.centered("AGSTAT - LIVE SESSION BLOCK"));
        out.push_str(&self.separator());
        out.push_str(&self.line(&format!(
            "No active session block at {}",
            now.with_timezone(&self.timezone).format("%H:%M:%S %Z")
        )));
        out.push_str(&self.separator());
        out.push_str(&self.centered(&self.footer()));
        out.push('\n');
        out.push_str(&self.border());
        out
    }

    pub fn render_active_block(&self, report: &BlockReport, now: DateTime<Utc>) -> String {
        let block = &report.block;
        let window = block.end_time - block.start_time;
        let elapsed = now - block.start_time;
        let remaining = block.end_time - now;
        let time_percent = if window.num_seconds() > 0 {
            elapsed.num_seconds() as f64 / window.num_seconds() as f64 * 100.0
        } else {
            0.0
        };

        let used = block.total_tokens();
        let limit = report.budget.map(|b| b.limit);
        let status = report.budget.map(|b| b.status);

        let mut out = String::new();
        out.push_str(&self.border());
        out.push_str(&self.centered("AGSTAT - LIVE SESSION BLOCK"));
        out.push_str(&self.separator());

        out.push_str(&self.line(&format!(
            "TIME         {}  {:5.1}%",
            self.bar(time_percent, None),
            time_percent.min(999.9)
        )));
        out.push_str(&self.line(&format!(
            "   Started: {}  Elapsed: {}  Remaining: {} ({})",
            block.start_time.with_timezone(&self.timezone).format("%H:%M:%S"),
            format_duration(elapsed),
            if remaining.num_seconds() > 0 {
                format_duration(remaining)
            } else {
                "Expired".to_string()
            },
            block.end_time.with_timezone(&self.timezone).format("%H:%M:%S"),
        )));
        out.push_str(&self.line(""));

        match (limit, report.budget) {
            (Some(limit), Some(budget)) => {
                out.push_str(&self.line(&format!(
                    "TOKENS       {}  {:5.1}% ({}/{})",
                    self.bar(budget.usage_percent, status),
                    budget.usage_percent.min(999.9),
                    format_number(used),
                    format_number(limit)
                )));
            }
            _ => {
                out.push_str(&self.line(&format!("TOKENS       {}", format_number(used))));
            }
        }
        let burn = report
            .burn_rate
            .map(|rate| {
                format!(
                    "{} tokens/min {}",
                    format_number(rate.tokens_per_minute.round() as u64),
                    self.burn_status(rate.tokens_per_minute_for_indicator)
                )
            })
            .unwrap_or_else(|| "n/a".to_string());
        out.push_str(&self.line(&format!(
            "   Cost: {}  Burn: {}",
            format_currency(block.cost_usd),
            burn
        )));
        out.push_str(&self.line(""));

        if let Some(projection) = report.projection {
            let projected_percent =
                limit.map(|l| projection.total_tokens as f64 / l as f64 * 100.0);
            let bar = projected_percent
                .map(|p| format!("{}  {:5.1}%", self.bar(p, status), p.min(999.9)))
                .unwrap_or_default();
            out.push_str(&self.line(&format!("PROJECTION   {bar}")));
            out.push_str(&self.line(&format!(
                "   Status: {}  Projected: {} tokens, {}",
                self.status_text(status),
                format_number(projection.total_tokens),
                format_currency(projection.total_cost)
            )));
            out.push_str(&self.line(""));
        }

        out.push_str(&self.line(&format!(
            "Models: {}  Events: {}",
            if block.models.is_empty() {
                "None".to_string()
            } else {
                format_model_list(&block.models, false, ", ")
            },
            block.entries.len()
        )));
        out.push_str(&self.separator());
        out.push_str(&self.centered(&self.footer()));
        out.push('\n');
        out.push_str(&self.border());
        out
    }

    fn footer(&self) -> String {
        format!("Refreshing every {}s - Press Ctrl+C to stop", self.refresh_secs)
    }

    fn border(&self) -> String {
        format!(
            "{BOX_CORNER}{}{BOX_CORNER}",
            BOX_HORIZONTAL.repeat(self.width.saturating_sub(2))
        )
    }

    fn separator(&self) -> String {
        format!("\n{}", self.border())
    }

    fn centered(&self, text: &str) -> String {
        let text_width = console::measure_text_width(text);
        let available = self.width.saturating_sub(2);
        if text_width >= available {
            return format!("\n{BOX_VERTICAL} {text} {BOX_VERTICAL}");
        }
        let left = (available - text_width) / 2;
        let right = available - left - text_width;
        format!(
            "\n{BOX_VERTICAL}{}{text}{}{BOX_VERTICAL}",
            " ".repeat(left),
            " ".repeat(right)
        )
    }

    fn line(&self, content: &str) -> String {
        let available = self.width.saturating_sub(4);
        let content = console::truncate_str(content, available, "...");
        let padding = available.saturating_sub(console::measure_text_width(&content));
        format!(
            "\n{BOX_VERTICAL} {content}{} {BOX_VERTICAL}",
            " ".repeat(padding)
        )
    }

    fn bar(&self, percent: f64, status: Option<BudgetStatus>) -> String {
        let clamped = percent.clamp(0.0, 100.0);
        let filled = ((clamped / 100.0) * BAR_WIDTH as f64) as usize;
        let filled = filled.min(BAR_WIDTH);
        let bar = format!(
            "[{}{}]",
            PROGRESS_FULL.repeat(filled),
            PROGRESS_EMPTY.repeat(BAR_WIDTH - filled)
        );
        match status {
            Some(status) if self.colored_output => paint(&bar, status),
            _ => bar,
        }
    }

    fn status_text(&self, status: Option<BudgetStatus>) -> String {
        let Some(status) = status else {
            return "NO LIMIT".to_string();
        };
        let text = match status {
            BudgetStatus::Exceeds => "WILL EXCEED LIMIT",
            BudgetStatus::Warning => "APPROACHING LIMIT",
            BudgetStatus::Ok => "WITHIN LIMITS",
        };
        if self.colored_output {
            paint(text, status)
        } else {
            text.to_string()
        }
    }

    fn burn_status(&self, indicator_rate: f64) -> String {
        let (text, status) = if indicator_rate > HIGH_BURN_TOKENS_PER_MINUTE {
            ("HIGH", BudgetStatus::Exceeds)
        } else if indicator_rate > ELEVATED_BURN_TOKENS_PER_MINUTE {
            ("ELEVATED", BudgetStatus::Warning)
        } else {
            ("NORMAL", BudgetStatus::Ok)
        };
        if self.colored_output {
            paint(text, status)
        } else {
            text.to_string()
        }
    }
}

fn paint(text: &str, status: BudgetStatus) -> String {
    match status {
        BudgetStatus::Exceeds => text.red().to_string(),
        BudgetStatus::Warning => text.yellow().to_string(),
        BudgetStatus::Ok => text.green().to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{}h {}m", duration.num_hours(), duration.num_minutes() % 60)
}

fn terminal_width() -> Option<usize> {
    terminal_size::terminal_size().map(|(width, _)| width.0 as usize)
}

impl fmt::Display for BlocksMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BlocksMonitor(width: {}, warning at {:.0}%)",
            self.width,
            WARNING_THRESHOLD * 100.0
        )
    }
}
