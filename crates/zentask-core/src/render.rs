use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::grouping::{DateGroup, date_label};
use crate::motivation::Quote;
use crate::progress::{DayCount, Progress};
use crate::task::{Priority, Task};

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, groups, today))]
    pub fn print_groups(&self, groups: &[DateGroup<'_>], today: NaiveDate) -> anyhow::Result<()> {
        self.write_groups(io::stdout().lock(), groups, today)
    }

    pub fn write_groups<W: Write>(
        &self,
        mut out: W,
        groups: &[DateGroup<'_>],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if groups.is_empty() {
            writeln!(out, "No tasks yet. Add one with `zentask add <text>`.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Pri".to_string(),
            "Task".to_string(),
            "Calendar".to_string(),
        ];

        for (idx, group) in groups.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            let label = date_label(group.date, today);
            let heading = if group.date < today {
                self.paint(&label, "31")
            } else if group.date == today {
                self.paint(&label, "1")
            } else {
                label
            };
            writeln!(out, "{heading}")?;

            let rows = group.tasks.iter().map(|task| self.task_row(task)).collect();
            write_table(&mut out, headers.clone(), rows)?;
        }

        Ok(())
    }

    pub fn print_progress(&self, progress: &Progress) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write_progress(&mut out, progress)
    }

    #[tracing::instrument(skip(self, days))]
    pub fn print_weekly(&self, days: &[DayCount]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write_weekly(&mut out, days)
    }

    pub fn print_agenda(&self, tasks: &[&Task], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if tasks.is_empty() {
            writeln!(out, "Nothing upcoming.")?;
            return Ok(());
        }

        let headers = vec!["ID".to_string(), "When".to_string(), "Task".to_string()];
        let rows = tasks
            .iter()
            .map(|task| {
                let when = if task.due_date == today {
                    "Today".to_string()
                } else {
                    task.due_date.format("%b %-d").to_string()
                };
                vec![self.paint(task.short_id(), "33"), when, task.text.clone()]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    pub fn print_quote(&self, quote: &Quote) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "\"{}\"", quote.quote)?;
        writeln!(out, "  - {}", self.paint(&quote.author, "2"))?;
        Ok(())
    }

    pub fn print_sync_link(&self, task: &Task, url: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Add \"{}\" to your calendar:", task.text)?;
        writeln!(out, "{url}")?;
        Ok(())
    }

    fn task_row(&self, task: &Task) -> Vec<String> {
        let id = self.paint(task.short_id(), "33");
        let done = if task.completed { "[x]" } else { "[ ]" }.to_string();
        let priority = match task.priority {
            Priority::High => self.paint("high", "31"),
            Priority::Medium => "med".to_string(),
            Priority::Low => self.paint("low", "2"),
        };
        let text = if task.completed {
            self.paint(&task.text, "9")
        } else {
            task.text.clone()
        };
        // Sync status only matters while the task is open.
        let synced = if task.is_synced && !task.completed {
            self.paint("synced", "32")
        } else {
            String::new()
        };
        vec![id, done, priority, text, synced]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn write_progress<W: Write>(mut out: W, progress: &Progress) -> anyhow::Result<()> {
    let filled = usize::from(progress.percent) * BAR_WIDTH / 100;
    writeln!(
        out,
        "[{}{}] {}% ({}/{} done, {} to conquer)",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress.percent,
        progress.completed,
        progress.total,
        progress.pending(),
    )?;
    Ok(())
}

pub fn write_weekly<W: Write>(mut out: W, days: &[DayCount]) -> anyhow::Result<()> {
    let peak = days.iter().map(|d| d.completed).max().unwrap_or(0).max(1);
    for day in days {
        let len = day.completed * BAR_WIDTH / peak;
        writeln!(
            out,
            "{} {:>3} {}",
            day.date.format("%a"),
            day.completed,
            "#".repeat(len)
        )?;
    }
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
