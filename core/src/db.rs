use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound};
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{
    DEFAULT_USER_NAME, FoodEntry, NewFoodEntry, NewReading, Reading, ReadingKind,
    TIMESTAMP_FORMAT, UpdateUser, User,
};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    dob TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS readings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    value REAL NOT NULL,
                    kind TEXT NOT NULL,
                    note TEXT,
                    measured_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    name TEXT NOT NULL,
                    calories INTEGER,
                    glycemic_index INTEGER,
                    logged_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_readings_user_time ON readings(user_id, measured_at);
                CREATE INDEX IF NOT EXISTS idx_food_logs_user_time ON food_logs(user_id, logged_at);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Run `f` inside one transaction. Any error rolls back every write made by `f`.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let value = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    // --- Row mapping helpers ---

    fn parse_timestamp_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let dob: Option<String> = row.get(2)?;
        let dob = dob
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?;
        let created_at: String = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            dob,
            created_at: Self::parse_timestamp_column(3, &created_at)?,
        })
    }

    fn reading_from_row(row: &rusqlite::Row) -> rusqlite::Result<Reading> {
        let kind: String = row.get(3)?;
        let kind = kind.parse::<ReadingKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?;
        let measured_at: String = row.get(5)?;
        Ok(Reading {
            id: row.get(0)?,
            user_id: row.get(1)?,
            value: row.get(2)?,
            kind,
            note: row.get(4)?,
            measured_at: Self::parse_timestamp_column(5, &measured_at)?,
        })
    }

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodEntry> {
        let logged_at: String = row.get(5)?;
        Ok(FoodEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            calories: row.get(3)?,
            glycemic_index: row.get(4)?,
            logged_at: Self::parse_timestamp_column(5, &logged_at)?,
        })
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }

    fn format_ts(ts: NaiveDateTime) -> String {
        ts.format(TIMESTAMP_FORMAT).to_string()
    }

    // --- Users ---

    pub fn insert_user(&self, name: &str, dob: Option<NaiveDate>) -> Result<User> {
        let dob_str = dob.map(|d| d.format("%Y-%m-%d").to_string());
        self.conn.execute(
            "INSERT INTO users (name, dob, created_at) VALUES (?1, ?2, ?3)",
            params![name, dob_str, Self::format_ts(Self::now())],
        )?;
        self.get_user(self.conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, name, dob, created_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .with_context(|| format!("User {id} not found"))
    }

    pub fn first_user(&self) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, dob, created_at FROM users ORDER BY id LIMIT 1",
                [],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Return the first user, creating the default one when the store is empty.
    pub fn ensure_default_user(&self) -> Result<User> {
        if let Some(user) = self.first_user()? {
            return Ok(user);
        }
        let user = self.insert_user(DEFAULT_USER_NAME, None)?;
        log::info!("created default user id={} name={:?}", user.id, user.name);
        Ok(user)
    }

    pub fn update_user(&self, id: i64, update: &UpdateUser) -> Result<User> {
        let mut user = self.get_user(id)?;
        if let Some(ref name) = update.name {
            user.name.clone_from(name);
        }
        if let Some(dob) = update.dob {
            user.dob = dob;
        }
        let dob_str = user.dob.map(|d| d.format("%Y-%m-%d").to_string());
        self.conn.execute(
            "UPDATE users SET name = ?1, dob = ?2 WHERE id = ?3",
            params![user.name, dob_str, id],
        )?;
        Ok(user)
    }

    // --- Readings ---

    pub fn insert_reading(&self, reading: &NewReading) -> Result<Reading> {
        let measured_at = reading
            .measured_at
            .map_or_else(Self::now, |ts| ts.trunc_subsecs(0));
        self.conn
            .execute(
                "INSERT INTO readings (user_id, value, kind, note, measured_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    reading.user_id,
                    reading.value,
                    reading.kind.as_str(),
                    reading.note,
                    Self::format_ts(measured_at)
                ],
            )
            .with_context(|| format!("Failed to insert reading for user {}", reading.user_id))?;
        let id = self.conn.last_insert_rowid();
        Ok(Reading {
            id,
            user_id: reading.user_id,
            value: reading.value,
            kind: reading.kind,
            note: reading.note.clone(),
            measured_at,
        })
    }

    /// All readings of a user, oldest first.
    pub fn readings_ascending(&self, user_id: i64) -> Result<Vec<Reading>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, value, kind, note, measured_at
             FROM readings WHERE user_id = ?1
             ORDER BY measured_at ASC, id ASC",
        )?;
        let readings = stmt
            .query_map(params![user_id], Self::reading_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    /// The `limit` most recent readings of a user, newest first.
    pub fn recent_readings(&self, user_id: i64, limit: usize) -> Result<Vec<Reading>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, value, kind, note, measured_at
             FROM readings WHERE user_id = ?1
             ORDER BY measured_at DESC, id DESC LIMIT ?2",
        )?;
        let readings = stmt
            .query_map(params![user_id, limit], Self::reading_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    pub fn count_readings(&self, user_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM readings WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Food log ---

    pub fn insert_food(&self, food: &NewFoodEntry) -> Result<FoodEntry> {
        let logged_at = food
            .logged_at
            .map_or_else(Self::now, |ts| ts.trunc_subsecs(0));
        self.conn
            .execute(
                "INSERT INTO food_logs (user_id, name, calories, glycemic_index, logged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    food.user_id,
                    food.name,
                    food.calories,
                    food.glycemic_index,
                    Self::format_ts(logged_at)
                ],
            )
            .with_context(|| format!("Failed to insert food entry for user {}", food.user_id))?;
        let id = self.conn.last_insert_rowid();
        Ok(FoodEntry {
            id,
            user_id: food.user_id,
            name: food.name.clone(),
            calories: food.calories,
            glycemic_index: food.glycemic_index,
            logged_at,
        })
    }

    /// All food entries of a user, oldest first.
    pub fn foods_ascending(&self, user_id: i64) -> Result<Vec<FoodEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, calories, glycemic_index, logged_at
             FROM food_logs WHERE user_id = ?1
             ORDER BY logged_at ASC, id ASC",
        )?;
        let foods = stmt
            .query_map(params![user_id], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// The `limit` most recent food entries of a user, newest first.
    pub fn recent_foods(&self, user_id: i64, limit: usize) -> Result<Vec<FoodEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, calories, glycemic_index, logged_at
             FROM food_logs WHERE user_id = ?1
             ORDER BY logged_at DESC, id DESC LIMIT ?2",
        )?;
        let foods = stmt
            .query_map(params![user_id, limit], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn count_foods(&self, user_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM food_logs WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
