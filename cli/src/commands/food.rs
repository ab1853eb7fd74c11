use anyhow::{Result, bail};

use diatrack_core::models::{NewFoodEntry, User};
use diatrack_core::service::DiatrackService;

use super::helpers::{format_ts, parse_at, print_food_table};

pub(crate) fn cmd_food_add(
    svc: &DiatrackService,
    user: &User,
    name: &str,
    calories: Option<i64>,
    gi: Option<i64>,
    at: Option<String>,
    json: bool,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Food name must not be empty");
    }

    let entry = svc.log_food(&NewFoodEntry {
        user_id: user.id,
        name: name.to_string(),
        calories,
        glycemic_index: gi,
        logged_at: parse_at(at)?,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let mut details = Vec::new();
        if let Some(cal) = entry.calories {
            details.push(format!("{cal} kcal"));
        }
        if let Some(gi) = entry.glycemic_index {
            details.push(format!("GI {gi}"));
        }
        let details = if details.is_empty() {
            String::new()
        } else {
            format!(" ({})", details.join(", "))
        };
        println!(
            "Logged {}{details} at {}",
            entry.name,
            format_ts(entry.logged_at)
        );
    }

    Ok(())
}

pub(crate) fn cmd_food_list(
    svc: &DiatrackService,
    user: &User,
    limit: usize,
    json: bool,
) -> Result<()> {
    let foods = svc.recent_foods(user.id, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else if foods.is_empty() {
        eprintln!("No food logged yet. Use `diatrack food add <name>` to log a meal.");
    } else {
        print_food_table(&foods);
    }

    Ok(())
}
