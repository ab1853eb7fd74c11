use anyhow::Result;
use chrono::NaiveDateTime;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use diatrack_core::models::{FoodEntry, Reading, parse_timestamp};

/// Parse an optional `--at` timestamp; `None` and "now" mean the current time.
pub(crate) fn parse_at(at: Option<String>) -> Result<Option<NaiveDateTime>> {
    match at.as_deref().map(str::trim) {
        None | Some("" | "now") => Ok(None),
        Some(s) => parse_timestamp(s).map(Some),
    }
}

pub(crate) fn format_ts(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

pub(crate) fn print_reading_table(readings: &[Reading]) {
    #[derive(Tabled)]
    struct ReadingRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Measured")]
        measured_at: String,
        #[tabled(rename = "mg/dL")]
        value: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Note")]
        note: String,
    }

    let rows: Vec<ReadingRow> = readings
        .iter()
        .map(|r| ReadingRow {
            id: r.id,
            measured_at: format_ts(r.measured_at),
            value: format!("{:.1}", r.value),
            kind: r.kind.to_string(),
            note: r.note.as_deref().map(|n| truncate(n, 40)).unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_food_table(foods: &[FoodEntry]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Logged")]
        logged_at: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "GI")]
        gi: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            logged_at: format_ts(f.logged_at),
            name: truncate(&f.name, 35),
            calories: f.calories.map_or("-".into(), |v| v.to_string()),
            gi: f.glycemic_index.map_or("-".into(), |v| v.to_string()),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
