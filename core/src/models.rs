use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Storage and display format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Display name of the user created when the store is empty.
pub const DEFAULT_USER_NAME: &str = "Demo User";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingKind {
    #[serde(rename = "fasting")]
    Fasting,
    #[serde(rename = "post-meal")]
    PostMeal,
}

pub const READING_KINDS: &[&str] = &["fasting", "post-meal"];

impl ReadingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fasting => "fasting",
            Self::PostMeal => "post-meal",
        }
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fasting" => Ok(Self::Fasting),
            "post-meal" | "post_meal" | "postmeal" => Ok(Self::PostMeal),
            _ => bail!(
                "Invalid reading kind '{s}'. Must be one of: {}",
                READING_KINDS.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub id: i64,
    pub user_id: i64,
    pub value: f64,
    pub kind: ReadingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub measured_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewReading {
    pub user_id: i64,
    pub value: f64,
    pub kind: ReadingKind,
    pub note: Option<String>,
    /// `None` stamps the reading with the current local time.
    pub measured_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodEntry {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glycemic_index: Option<i64>,
    pub logged_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFoodEntry {
    pub user_id: i64,
    pub name: String,
    pub calories: Option<i64>,
    pub glycemic_index: Option<i64>,
    /// `None` stamps the entry with the current local time.
    pub logged_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub dob: Option<Option<NaiveDate>>,
}

/// Parse a user-supplied timestamp.
///
/// Accepts the shapes an HTML `datetime-local` input and ISO 8601 produce:
/// `2024-09-12T07:00`, `2024-09-12 07:00:00`, fractional seconds, or a bare
/// date (midnight).
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    let s = s.trim();
    for format in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    bail!("Invalid timestamp '{s}'. Use YYYY-MM-DDTHH:MM or YYYY-MM-DD HH:MM[:SS]")
}

/// Treat empty form fields as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
