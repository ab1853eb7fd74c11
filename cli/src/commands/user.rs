use anyhow::{Context, Result};
use chrono::NaiveDate;

use diatrack_core::models::{UpdateUser, User};
use diatrack_core::service::DiatrackService;

fn print_user(user: &User) {
    println!("{} (id {})", user.name, user.id);
    if let Some(dob) = user.dob {
        println!("  Born:    {}", dob.format("%Y-%m-%d"));
    }
    println!("  Since:   {}", user.created_at.format("%Y-%m-%d"));
}

pub(crate) fn cmd_user_show(user: &User, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(user)?);
    } else {
        print_user(user);
    }
    Ok(())
}

/// `--dob none` clears the date of birth.
fn parse_dob(dob: Option<String>) -> Result<Option<Option<NaiveDate>>> {
    dob.map(|s| match s.trim() {
        "" | "none" => Ok(None),
        s => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .with_context(|| format!("Invalid date of birth '{s}'. Use YYYY-MM-DD")),
    })
    .transpose()
}

pub(crate) fn cmd_user_set(
    svc: &DiatrackService,
    user: &User,
    name: Option<String>,
    dob: Option<String>,
    json: bool,
) -> Result<()> {
    let update = UpdateUser {
        name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        dob: parse_dob(dob)?,
    };
    let user = svc.update_user(user.id, &update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        print_user(&user);
    }
    Ok(())
}
