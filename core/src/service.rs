use std::path::Path;

use anyhow::{Result, ensure};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::Database;
use crate::export::{self, REPORT_READING_LIMIT};
use crate::insights::{self, Pattern, ReadingStats};
use crate::models::{FoodEntry, NewFoodEntry, NewReading, Reading, UpdateUser, User};
use crate::sample;

/// Readings shown on the overview page.
pub const OVERVIEW_READING_LIMIT: usize = 200;
/// Food entries shown on the overview page.
pub const OVERVIEW_FOOD_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub user: User,
    pub readings: Vec<Reading>,
    pub foods: Vec<FoodEntry>,
    pub stats: ReadingStats,
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub readings: usize,
    pub foods: usize,
    pub total_readings: i64,
    pub total_foods: i64,
}

/// Store access plus the exporters, always scoped to an explicit user.
pub struct DiatrackService {
    db: Database,
}

impl DiatrackService {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    // --- Users ---

    pub fn ensure_default_user(&self) -> Result<User> {
        self.db.ensure_default_user()
    }

    pub fn get_user(&self, user_id: i64) -> Result<User> {
        self.db.get_user(user_id)
    }

    pub fn update_user(&self, user_id: i64, update: &UpdateUser) -> Result<User> {
        self.db.update_user(user_id, update)
    }

    // --- Logging ---

    pub fn log_reading(&self, reading: &NewReading) -> Result<Reading> {
        ensure!(
            reading.value.is_finite(),
            "Reading value must be a number, got {}",
            reading.value
        );
        let reading = self.db.insert_reading(reading)?;
        log::debug!(
            "logged reading id={} user={} value={} kind={}",
            reading.id,
            reading.user_id,
            reading.value,
            reading.kind
        );
        Ok(reading)
    }

    pub fn log_food(&self, food: &NewFoodEntry) -> Result<FoodEntry> {
        let food = self.db.insert_food(food)?;
        log::debug!(
            "logged food id={} user={} name={:?}",
            food.id,
            food.user_id,
            food.name
        );
        Ok(food)
    }

    // --- Queries ---

    pub fn readings_ascending(&self, user_id: i64) -> Result<Vec<Reading>> {
        self.db.readings_ascending(user_id)
    }

    pub fn foods_ascending(&self, user_id: i64) -> Result<Vec<FoodEntry>> {
        self.db.foods_ascending(user_id)
    }

    pub fn recent_readings(&self, user_id: i64, limit: usize) -> Result<Vec<Reading>> {
        self.db.recent_readings(user_id, limit)
    }

    pub fn recent_foods(&self, user_id: i64, limit: usize) -> Result<Vec<FoodEntry>> {
        self.db.recent_foods(user_id, limit)
    }

    pub fn reading_stats(&self, user_id: i64) -> Result<ReadingStats> {
        Ok(insights::reading_stats(&self.db.readings_ascending(user_id)?))
    }

    pub fn patterns(&self, user_id: i64) -> Result<Vec<Pattern>> {
        Ok(insights::detect_patterns(
            &self.db.readings_ascending(user_id)?,
        ))
    }

    pub fn overview(&self, user_id: i64) -> Result<Overview> {
        let user = self.db.get_user(user_id)?;
        let history = self.db.readings_ascending(user_id)?;
        Ok(Overview {
            user,
            readings: self.db.recent_readings(user_id, OVERVIEW_READING_LIMIT)?,
            foods: self.db.recent_foods(user_id, OVERVIEW_FOOD_LIMIT)?,
            stats: insights::reading_stats(&history),
            patterns: insights::detect_patterns(&history),
        })
    }

    // --- Exports ---

    /// PNG trend chart of every reading, or `None` when there are none.
    pub fn dashboard_chart(&self, user_id: i64) -> Result<Option<Vec<u8>>> {
        let readings = self.db.readings_ascending(user_id)?;
        export::render_reading_chart(&readings)
    }

    pub fn export_workbook(&self, user_id: i64) -> Result<Vec<u8>> {
        let readings = self.db.readings_ascending(user_id)?;
        let foods = self.db.foods_ascending(user_id)?;
        export::build_workbook(&readings, &foods)
    }

    /// PDF summary of the most recent readings, newest first.
    pub fn export_report(&self, user_id: i64, generated_at: NaiveDateTime) -> Result<Vec<u8>> {
        let user = self.db.get_user(user_id)?;
        let readings = self.db.recent_readings(user_id, REPORT_READING_LIMIT)?;
        export::build_report_pdf(&readings, &user.name, generated_at)
    }

    // --- Demo data ---

    pub fn seed_sample_data(&self, user_id: i64) -> Result<SeedSummary> {
        let readings = sample::sample_readings(user_id)?;
        let foods = sample::sample_foods(user_id)?;
        let summary = self.db.in_transaction(|db| {
            for reading in &readings {
                db.insert_reading(reading)?;
            }
            for food in &foods {
                db.insert_food(food)?;
            }
            Ok(SeedSummary {
                readings: readings.len(),
                foods: foods.len(),
                total_readings: db.count_readings(user_id)?,
                total_foods: db.count_foods(user_id)?,
            })
        })?;
        log::info!(
            "seeded sample data user={} readings={} foods={}",
            user_id,
            summary.readings,
            summary.foods
        );
        Ok(summary)
    }
}
