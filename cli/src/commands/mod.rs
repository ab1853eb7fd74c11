mod export;
mod food;
mod helpers;
mod reading;
mod stats;
mod user;

use anyhow::Result;

use diatrack_core::models::User;
use diatrack_core::service::DiatrackService;

pub(crate) use export::{ExportFormat, cmd_export};
pub(crate) use food::{cmd_food_add, cmd_food_list};
pub(crate) use reading::{cmd_reading_add, cmd_reading_list};
pub(crate) use stats::cmd_stats;
pub(crate) use user::{cmd_user_set, cmd_user_show};

pub(crate) fn cmd_seed(svc: &DiatrackService, user: &User, json: bool) -> Result<()> {
    let summary = svc.seed_sample_data(user.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Added {} readings and {} food entries for {}",
            summary.readings, summary.foods, user.name
        );
        println!(
            "Now stored: {} readings, {} food entries",
            summary.total_readings, summary.total_foods
        );
    }

    Ok(())
}
