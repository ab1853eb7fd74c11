use anyhow::Result;

use diatrack_core::models::{NewReading, ReadingKind, User, non_empty};
use diatrack_core::service::DiatrackService;

use super::helpers::{format_ts, parse_at, print_reading_table};

pub(crate) fn cmd_reading_add(
    svc: &DiatrackService,
    user: &User,
    value: f64,
    kind: &str,
    note: Option<String>,
    at: Option<String>,
    json: bool,
) -> Result<()> {
    let kind: ReadingKind = kind.parse()?;
    let reading = svc.log_reading(&NewReading {
        user_id: user.id,
        value,
        kind,
        note: non_empty(note),
        measured_at: parse_at(at)?,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reading)?);
    } else {
        println!(
            "Logged {} mg/dL ({}) at {}",
            reading.value,
            reading.kind,
            format_ts(reading.measured_at)
        );
        if let Some(ref n) = reading.note {
            println!("  Note: {n}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_reading_list(
    svc: &DiatrackService,
    user: &User,
    limit: usize,
    json: bool,
) -> Result<()> {
    let readings = svc.recent_readings(user.id, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&readings)?);
    } else if readings.is_empty() {
        eprintln!("No readings yet. Use `diatrack reading add <value>` to record one.");
    } else {
        print_reading_table(&readings);
    }

    Ok(())
}
