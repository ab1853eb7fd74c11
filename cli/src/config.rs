use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const DB_FILE_NAME: &str = "diatrack.db";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve the data directory and database file.
    ///
    /// `db_override` (from `--db` or `DIATRACK_DB`) replaces the default
    /// `<data dir>/diatrack.db`; its parent directory is created if missing.
    pub fn load(db_override: Option<PathBuf>) -> Result<Self> {
        let config = match db_override {
            Some(db_path) => Self::with_db_path(db_path),
            None => {
                let proj_dirs = ProjectDirs::from("", "", "diatrack")
                    .context("Could not determine home directory")?;
                Self::in_data_dir(proj_dirs.data_dir())
            }
        };

        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                config.data_dir.display()
            )
        })?;
        log::debug!("using database {}", config.db_path.display());
        Ok(config)
    }

    fn in_data_dir(data_dir: &Path) -> Self {
        Config {
            db_path: data_dir.join(DB_FILE_NAME),
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn with_db_path(db_path: PathBuf) -> Self {
        let data_dir = db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Config { db_path, data_dir }
    }

    pub fn db_path_str(&self) -> Result<&str> {
        self.db_path
            .to_str()
            .with_context(|| format!("Database path is not UTF-8: {}", self.db_path.display()))
    }
}
