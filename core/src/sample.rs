use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{NewFoodEntry, NewReading, ReadingKind};

/// (value, kind, day of September 2024, hour, minute, note)
const READINGS: &[(f64, ReadingKind, u32, u32, u32, &str)] = &[
    (98.0, ReadingKind::Fasting, 12, 7, 0, "Morning"),
    (145.0, ReadingKind::PostMeal, 12, 13, 30, "After lunch"),
    (92.0, ReadingKind::Fasting, 13, 7, 0, "Morning"),
    (138.0, ReadingKind::PostMeal, 13, 20, 0, "After dinner"),
    (105.0, ReadingKind::Fasting, 14, 7, 0, "Morning"),
    (152.0, ReadingKind::PostMeal, 14, 13, 0, "After lunch"),
    (88.0, ReadingKind::Fasting, 15, 7, 0, "Morning"),
    (142.0, ReadingKind::PostMeal, 15, 19, 45, "After dinner"),
    (95.0, ReadingKind::Fasting, 16, 7, 0, "Morning"),
    (135.0, ReadingKind::PostMeal, 16, 12, 45, "After lunch"),
    (102.0, ReadingKind::Fasting, 17, 7, 0, "Morning"),
    (148.0, ReadingKind::PostMeal, 17, 20, 15, "After dinner"),
    (90.0, ReadingKind::Fasting, 18, 7, 0, "Morning"),
    (140.0, ReadingKind::PostMeal, 18, 13, 20, "After lunch"),
];

/// (name, calories, glycemic index, day of September 2024, hour, minute)
const FOODS: &[(&str, i64, i64, u32, u32, u32)] = &[
    ("Oatmeal with berries", 250, 55, 12, 7, 30),
    ("Grilled chicken salad", 320, 35, 13, 13, 0),
    ("Brown rice and vegetables", 380, 50, 14, 19, 30),
    ("Greek yogurt", 150, 40, 15, 10, 0),
    ("Whole wheat toast with avocado", 280, 45, 16, 7, 30),
    ("Salmon with quinoa", 420, 35, 17, 20, 0),
];

fn september(day: u32, hour: u32, minute: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2024, 9, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .with_context(|| format!("invalid sample timestamp 2024-09-{day} {hour}:{minute}"))
}

/// The demo week of readings, oldest first.
pub fn sample_readings(user_id: i64) -> Result<Vec<NewReading>> {
    READINGS
        .iter()
        .map(|&(value, kind, day, hour, minute, note)| {
            Ok(NewReading {
                user_id,
                value,
                kind,
                note: Some(note.to_string()),
                measured_at: Some(september(day, hour, minute)?),
            })
        })
        .collect()
}

/// The demo week of meals, oldest first.
pub fn sample_foods(user_id: i64) -> Result<Vec<NewFoodEntry>> {
    FOODS
        .iter()
        .map(|&(name, calories, gi, day, hour, minute)| {
            Ok(NewFoodEntry {
                user_id,
                name: name.to_string(),
                calories: Some(calories),
                glycemic_index: Some(gi),
                logged_at: Some(september(day, hour, minute)?),
            })
        })
        .collect()
}
