//! Report formatters
//!
//! Two formatters share the [`OutputFormatter`] interface:
//! - [`TableFormatter`] for the terminal
//! - [`JsonFormatter`] for scripts and other tools
//!
//! # Examples
//!
//! ```no_run
//! use agstat_core::aggregation_types::{DailyUsage, Totals};
//! use agstat_core::types::{DailyDate, TokenCounts};
//! use agstat_terminal::get_formatter;
//! use chrono::NaiveDate;
//!
//! let daily = vec![DailyUsage {
//!     date: DailyDate::new(NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()),
//!     tokens: TokenCounts::new(1000, 500, 100, 50),
//!     total_cost: 0.025,
//!     models_used: vec!["gpt-5-codex".to_string()],
//! }];
//! let totals = Totals::from_daily(&daily);
//!
//! println!("{}", get_formatter(false, false).format_daily(&daily, &totals));
//! println!("{}", get_formatter(true, false).format_daily(&daily, &totals));
//! ```

use agstat_core::aggregation_types::{
    BlockReport, DailyUsage, MonthlyUsage, SessionUsage, Totals,
};
use agstat_core::model_formatter::{format_model_list, format_model_name};
use agstat_core::types::TokenCounts;
use chrono::{DateTime, Utc};
use prettytable::{Cell, Row, Table, format, row};
use serde_json::{Value, json};

pub trait OutputFormatter {
    fn format_daily(&self, data: &[DailyUsage], totals: &Totals) -> String;

    fn format_monthly(&self, data: &[MonthlyUsage], totals: &Totals) -> String;

    fn format_sessions(&self, data: &[SessionUsage], totals: &Totals, tz: &chrono_tz::Tz)
    -> String;

    /// Session blocks, gaps included; `now` drives the remaining-time column
    fn format_blocks(
        &self,
        data: &[BlockReport],
        totals: &Totals,
        tz: &chrono_tz::Tz,
        now: DateTime<Utc>,
    ) -> String;
}

/// Thousands-separated integer, e.g. `1,234,567`
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (count, ch) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

pub fn format_currency(amount: f64) -> String {
    format!("${amount:.2}")
}

fn format_hm(duration: chrono::Duration) -> String {
    format!("{}h {}m", duration.num_hours(), duration.num_minutes() % 60)
}

pub struct TableFormatter {
    pub full_model_names: bool,
}

impl TableFormatter {
    pub fn new(full_model_names: bool) -> Self {
        Self { full_model_names }
    }

    fn new_table() -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table
    }

    fn totals_row(totals: &Totals, trailing: usize) -> Row {
        let mut cells = vec![
            Cell::new("TOTAL").style_spec("b"),
            Cell::new(&format_number(totals.tokens.input_tokens)).style_spec("br"),
            Cell::new(&format_number(totals.tokens.output_tokens)).style_spec("br"),
            Cell::new(&format_number(totals.tokens.cache_creation_tokens)).style_spec("br"),
            Cell::new(&format_number(totals.tokens.cache_read_tokens)).style_spec("br"),
            Cell::new(&format_number(totals.tokens.total())).style_spec("br"),
            Cell::new(&format_currency(totals.total_cost)).style_spec("br"),
        ];
        cells.extend((0..trailing).map(|_| Cell::new("")));
        Row::new(cells)
    }

    fn token_cells(tokens: &TokenCounts) -> Vec<Cell> {
        [
            tokens.input_tokens,
            tokens.output_tokens,
            tokens.cache_creation_tokens,
            tokens.cache_read_tokens,
            tokens.total(),
        ]
        .into_iter()
        .map(|n| Cell::new(&format_number(n)).style_spec("r"))
        .collect()
    }

    fn format_datetime_with_tz(dt: &DateTime<Utc>, tz: &chrono_tz::Tz) -> String {
        dt.with_timezone(tz).format("%Y-%m-%d %H:%M %Z").to_string()
    }

    fn block_status(report: &BlockReport, now: DateTime<Utc>) -> (String, String) {
        let block = &report.block;
        if block.is_gap {
            return (
                "(idle)".to_string(),
                format_hm(block.end_time - block.start_time),
            );
        }
        if block.is_active {
            let remaining = block.end_time - now;
            let remaining = if remaining.num_seconds() > 0 {
                format!("{} left", format_hm(remaining))
            } else {
                "Expired".to_string()
            };
            return ("ACTIVE".to_string(), remaining);
        }
        let elapsed = block
            .actual_start_time()
            .zip(block.actual_end_time)
            .map(|(first, last)| format_hm(last - first))
            .unwrap_or_else(|| "-".to_string());
        ("Complete".to_string(), elapsed)
    }

    /// Burn rate, projection and limit lines shown under the active block
    fn active_block_details(report: &BlockReport) -> String {
        let mut out = String::new();
        if let Some(rate) = &report.burn_rate {
            out.push_str(&format!(
                "\nBurn rate:  {} tokens/min ({})/h",
                format_number(rate.tokens_per_minute.round() as u64),
                format_currency(rate.cost_per_hour)
            ));
        }
        if let Some(projection) = &report.projection {
            out.push_str(&format!(
                "\nProjected:  {} tokens, {} ({} min remaining)",
                format_number(projection.total_tokens),
                format_currency(projection.total_cost),
                projection.remaining_minutes.round() as i64
            ));
        }
        if let Some(budget) = &report.budget {
            out.push_str(&format!(
                "\nLimit:      {} tokens, {:.1}% used, {}",
                format_number(budget.limit),
                budget.usage_percent,
                budget.status.to_string().to_uppercase()
            ));
        }
        out
    }
}

impl OutputFormatter for TableFormatter {
    fn format_daily(&self, data: &[DailyUsage], totals: &Totals) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![
            b -> "Date",
            b -> "Input",
            b -> "Output",
            b -> "Cache Create",
            b -> "Cache Read",
            b -> "Total",
            b -> "Cost",
            b -> "Models"
        ]);

        for day in data {
            let mut cells = vec![Cell::new(&day.date.format("%Y-%m-%d"))];
            cells.extend(Self::token_cells(&day.tokens));
            cells.push(Cell::new(&format_currency(day.total_cost)).style_spec("r"));
            cells.push(Cell::new(&format_model_list(
                &day.models_used,
                self.full_model_names,
                ", ",
            )));
            table.add_row(Row::new(cells));
        }

        table.add_row(Row::new(vec![Cell::new(""); 8]));
        table.add_row(Self::totals_row(totals, 1));
        table.to_string()
    }

    fn format_monthly(&self, data: &[MonthlyUsage], totals: &Totals) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![
            b -> "Month",
            b -> "Input",
            b -> "Output",
            b -> "Cache Create",
            b -> "Cache Read",
            b -> "Total",
            b -> "Cost",
            b -> "Active Days"
        ]);

        for month in data {
            let mut cells = vec![Cell::new(&month.month)];
            cells.extend(Self::token_cells(&month.tokens));
            cells.push(Cell::new(&format_currency(month.total_cost)).style_spec("r"));
            cells.push(Cell::new(&month.active_days.to_string()).style_spec("c"));
            table.add_row(Row::new(cells));
        }

        table.add_row(Row::new(vec![Cell::new(""); 8]));
        table.add_row(Self::totals_row(totals, 1));
        table.to_string()
    }

    fn format_sessions(
        &self,
        data: &[SessionUsage],
        totals: &Totals,
        tz: &chrono_tz::Tz,
    ) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![
            b -> "Session ID",
            b -> "Start Time",
            b -> "Duration",
            b -> "Input",
            b -> "Output",
            b -> "Total Tokens",
            b -> "Cost",
            b -> "Models"
        ]);

        for session in data {
            table.add_row(row![
                session.session_id.as_str(),
                Self::format_datetime_with_tz(&session.start_time, tz),
                format_hm(session.end_time - session.start_time),
                r -> format_number(session.tokens.input_tokens),
                r -> format_number(session.tokens.output_tokens),
                r -> format_number(session.tokens.total()),
                r -> format_currency(session.total_cost),
                format_model_list(&session.models_used, self.full_model_names, ", ")
            ]);
        }

        table.add_row(Row::new(vec![Cell::new(""); 8]));
        table.add_row(row![
            b -> "TOTAL",
            "",
            "",
            b -> format_number(totals.tokens.input_tokens),
            b -> format_number(totals.tokens.output_tokens),
            b -> format_number(totals.tokens.total()),
            b -> format_currency(totals.total_cost),
            ""
        ]);
        table.to_string()
    }

    fn format_blocks(
        &self,
        data: &[BlockReport],
        totals: &Totals,
        tz: &chrono_tz::Tz,
        now: DateTime<Utc>,
    ) -> String {
        let show_limit = data.iter().any(|r| r.budget.is_some());

        let mut table = Self::new_table();
        let mut titles = vec!["Block Start", "Status", "Time", "Models", "Input", "Output", "Total Tokens"];
        if show_limit {
            titles.push("% Limit");
        }
        titles.push("Cost");
        table.set_titles(Row::new(
            titles.iter().map(|t| Cell::new(t).style_spec("b")).collect(),
        ));

        for report in data {
            let block = &report.block;
            let (status, time) = Self::block_status(report, now);
            let mut cells = vec![
                Cell::new(&Self::format_datetime_with_tz(&block.start_time, tz)),
                Cell::new(&status),
                Cell::new(&time),
            ];

            if block.is_gap {
                cells.extend((0..titles.len() - 3).map(|_| Cell::new("-")));
            } else {
                cells.push(Cell::new(&format_model_list(
                    &block.models,
                    self.full_model_names,
                    ", ",
                )));
                cells.push(Cell::new(&format_number(block.tokens.input_tokens)).style_spec("r"));
                cells.push(Cell::new(&format_number(block.tokens.output_tokens)).style_spec("r"));
                cells.push(Cell::new(&format_number(block.tokens.total())).style_spec("r"));
                if show_limit {
                    let percent = report
                        .budget
                        .map(|b| format!("{:.1}%", b.usage_percent))
                        .unwrap_or_else(|| "-".to_string());
                    cells.push(Cell::new(&percent).style_spec("r"));
                }
                cells.push(Cell::new(&format_currency(block.cost_usd)).style_spec("r"));
            }
            table.add_row(Row::new(cells));
        }

        let mut totals_cells = vec![
            Cell::new("TOTAL").style_spec("b"),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(&format_number(totals.tokens.input_tokens)).style_spec("br"),
            Cell::new(&format_number(totals.tokens.output_tokens)).style_spec("br"),
            Cell::new(&format_number(totals.tokens.total())).style_spec("br"),
        ];
        if show_limit {
            totals_cells.push(Cell::new(""));
        }
        totals_cells.push(Cell::new(&format_currency(totals.total_cost)).style_spec("br"));
        table.add_row(Row::new(vec![Cell::new(""); titles.len()]));
        table.add_row(Row::new(totals_cells));

        let mut output = table.to_string();
        if let Some(active) = data.iter().find(|r| r.block.is_active) {
            output.push_str(&Self::active_block_details(active));
            output.push('\n');
        }
        output
    }
}

pub struct JsonFormatter;

impl JsonFormatter {
    fn tokens_json(tokens: &TokenCounts) -> Value {
        json!({
            "input_tokens": tokens.input_tokens,
            "output_tokens": tokens.output_tokens,
            "cache_creation_tokens": tokens.cache_creation_tokens,
            "cache_read_tokens": tokens.cache_read_tokens,
            "reasoning_tokens": tokens.reasoning_tokens,
            "total": tokens.total(),
        })
    }

    fn totals_json(totals: &Totals) -> Value {
        json!({
            "tokens": Self::tokens_json(&totals.tokens),
            "total_cost": totals.total_cost,
        })
    }

    fn block_json(report: &BlockReport) -> Value {
        let block = &report.block;
        json!({
            "id": block.id,
            "startTime": block.start_time.to_rfc3339(),
            "endTime": block.end_time.to_rfc3339(),
            "actualEndTime": block.actual_end_time.map(|t| t.to_rfc3339()),
            "isActive": block.is_active,
            "isGap": block.is_gap,
            "entries": block.entries.len(),
            "tokenCounts": {
                "inputTokens": block.tokens.input_tokens,
                "outputTokens": block.tokens.output_tokens,
                "cacheCreationInputTokens": block.tokens.cache_creation_tokens,
                "cacheReadInputTokens": block.tokens.cache_read_tokens,
                "reasoningOutputTokens": block.tokens.reasoning_tokens,
            },
            "totalTokens": block.tokens.total(),
            "costUSD": block.cost_usd,
            "models": block.models.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
            "modelBreakdowns": report.model_breakdowns.iter().map(|m| json!({
                "model": m.model.as_str(),
                "totalTokens": m.tokens.total(),
                "cost": m.cost,
            })).collect::<Vec<_>>(),
            "burnRate": report.burn_rate,
            "projection": report.projection,
            "tokenLimitStatus": report.budget.map(|b| json!({
                "limit": b.limit,
                "projectedUsage": report.projection.map(|p| p.total_tokens),
                "percentUsed": b.usage_percent,
                "status": b.status,
            })),
        })
    }

    fn render(value: &Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_default()
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_daily(&self, data: &[DailyUsage], totals: &Totals) -> String {
        Self::render(&json!({
            "daily": data.iter().map(|d| json!({
                "date": d.date.format("%Y-%m-%d"),
                "tokens": Self::tokens_json(&d.tokens),
                "total_cost": d.total_cost,
                "models_used": d.models_used,
            })).collect::<Vec<_>>(),
            "totals": Self::totals_json(totals),
        }))
    }

    fn format_monthly(&self, data: &[MonthlyUsage], totals: &Totals) -> String {
        Self::render(&json!({
            "monthly": data.iter().map(|m| json!({
                "month": m.month,
                "tokens": Self::tokens_json(&m.tokens),
                "total_cost": m.total_cost,
                "active_days": m.active_days,
            })).collect::<Vec<_>>(),
            "totals": Self::totals_json(totals),
        }))
    }

    fn format_sessions(
        &self,
        data: &[SessionUsage],
        totals: &Totals,
        _tz: &chrono_tz::Tz,
    ) -> String {
        Self::render(&json!({
            "sessions": data.iter().map(|s| json!({
                "session_id": s.session_id.as_str(),
                "start_time": s.start_time.to_rfc3339(),
                "end_time": s.end_time.to_rfc3339(),
                "duration_seconds": (s.end_time - s.start_time).num_seconds(),
                "tokens": Self::tokens_json(&s.tokens),
                "total_cost": s.total_cost,
                "models_used": s.models_used,
                "project": s.project,
            })).collect::<Vec<_>>(),
            "totals": Self::totals_json(totals),
        }))
    }

    fn format_blocks(
        &self,
        data: &[BlockReport],
        totals: &Totals,
        _tz: &chrono_tz::Tz,
        _now: DateTime<Utc>,
    ) -> String {
        Self::render(&json!({
            "blocks": data.iter().map(Self::block_json).collect::<Vec<_>>(),
            "totals": Self::totals_json(totals),
        }))
    }
}

/// Formatter for `--json` or table output
pub fn get_formatter(json: bool, full_model_names: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter::new(full_model_names))
    }
}
