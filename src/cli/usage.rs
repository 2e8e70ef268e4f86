//! `usage` command.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use crate::engine::usage::{FileUsageStore, UsageCounter, UsageLimits, UsageTracker};

/// Community tier usage options.
#[derive(Parser)]
pub struct UsageCommand {
    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageReport {
    day_count: u32,
    daily_limit: u32,
    month_count: u32,
    monthly_limit: u32,
    day: String,
    month: String,
}

impl UsageReport {
    fn new(counter: UsageCounter, limits: UsageLimits) -> Self {
        Self {
            day_count: counter.day_count,
            daily_limit: limits.daily,
            month_count: counter.month_count,
            monthly_limit: limits.monthly,
            day: counter.last_day_key,
            month: counter.last_month_key,
        }
    }

    fn render(&self) -> String {
        format!(
            "Community tier usage\n  today ({}): {}/{}\n  this month ({}): {}/{}",
            self.day,
            self.day_count,
            self.daily_limit,
            self.month,
            self.month_count,
            self.monthly_limit
        )
    }
}

impl UsageCommand {
    /// Executes the usage command.
    pub fn execute(self) -> Result<()> {
        let store = FileUsageStore::new()?;
        let path = store.path().display().to_string();
        let tracker = UsageTracker::new(Box::new(store));
        let report = UsageReport::new(tracker.read_counters(), tracker.limits());

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize usage")?
            );
        } else {
            println!("{}\n  counter file: {path}", report.render());
        }
        Ok(())
    }
}
