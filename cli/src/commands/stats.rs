use anyhow::Result;
use serde::Serialize;

use diatrack_core::insights::{Pattern, ReadingStats, Severity};
use diatrack_core::models::User;
use diatrack_core::service::DiatrackService;

#[derive(Serialize)]
struct StatsReport {
    stats: ReadingStats,
    patterns: Vec<Pattern>,
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Insight => "insight",
        Severity::Warning => "warning",
        Severity::Alert => "ALERT",
    }
}

pub(crate) fn cmd_stats(svc: &DiatrackService, user: &User, json: bool) -> Result<()> {
    let report = StatsReport {
        stats: svc.reading_stats(user.id)?,
        patterns: svc.patterns(user.id)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let stats = &report.stats;
    if stats.count == 0 {
        eprintln!("No readings yet. Use `diatrack reading add <value>` to record one.");
        return Ok(());
    }

    println!("Readings:  {}", stats.count);
    println!("Average:   {:.1} mg/dL", stats.average);
    println!("High:      {:.1} mg/dL", stats.high);
    println!("Low:       {:.1} mg/dL", stats.low);
    println!("Trend:     {:+.1}%", stats.trend_pct);

    if !report.patterns.is_empty() {
        println!();
        println!("Patterns:");
        for pattern in &report.patterns {
            println!("  [{}] {}", severity_label(pattern.severity), pattern.title);
            println!("      {}", pattern.description);
            println!("      -> {}", pattern.action);
        }
    }

    Ok(())
}
