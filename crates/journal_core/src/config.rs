//! Environment-driven runtime configuration.
//!
//! Recognized variables:
//! - `JOURNAL_DB_PATH`: SQLite file; unset or blank means in-memory.
//! - `JOURNAL_LOG_LEVEL`: trace|debug|info|warn|error; defaults per build mode.
//! - `JOURNAL_LOG_DIR`: absolute directory for rolling logs; unset disables
//!   file logging.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{self, default_log_level, LoggingError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "JOURNAL_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "JOURNAL_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "JOURNAL_LOG_DIR";

/// Invalid configuration value.
#[derive(Debug)]
pub struct ConfigError {
    pub variable: &'static str,
    pub source: LoggingError,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.source)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalConfig {
    pub db_path: Option<PathBuf>,
    pub log_level: &'static str,
    pub log_dir: Option<PathBuf>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl JournalConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let log_level = match non_blank(LOG_LEVEL_ENV) {
            Some(level) => logging::normalize_level(&level).map_err(|source| ConfigError {
                variable: LOG_LEVEL_ENV,
                source,
            })?,
            None => default_log_level(),
        };

        Ok(Self {
            db_path: non_blank(DB_PATH_ENV).map(PathBuf::from),
            log_level,
            log_dir: non_blank(LOG_DIR_ENV).map(PathBuf::from),
        })
    }

    /// Opens the configured database, in memory when no path is set.
    pub fn open_db(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }

    /// Starts file logging when a log directory is configured. Returns
    /// whether logging is active afterwards.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        logging::init_logging(self.log_level, log_dir)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{JournalConfig, DB_PATH_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
    use crate::logging::default_log_level;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = JournalConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, JournalConfig::default());
        assert_eq!(config.log_level, default_log_level());
    }

    #[test]
    fn reads_paths_and_normalizes_level() {
        let config = JournalConfig::from_lookup(lookup_from(&[
            (DB_PATH_ENV, "/tmp/journal.db"),
            (LOG_LEVEL_ENV, "WARNING"),
            (LOG_DIR_ENV, "/tmp/journal-logs"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/journal.db")));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/journal-logs")));
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let config =
            JournalConfig::from_lookup(lookup_from(&[(DB_PATH_ENV, "  "), (LOG_DIR_ENV, "")]))
                .unwrap();
        assert!(config.db_path.is_none());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn unknown_level_names_the_variable() {
        let err = JournalConfig::from_lookup(lookup_from(&[(LOG_LEVEL_ENV, "loud")])).unwrap_err();
        assert_eq!(err.variable, LOG_LEVEL_ENV);
        assert!(err.to_string().contains("JOURNAL_LOG_LEVEL"));
    }

    #[test]
    fn missing_log_dir_skips_logging() {
        assert!(!JournalConfig::default().init_logging().unwrap());
    }

    #[test]
    fn default_config_opens_in_memory_database() {
        let conn = JournalConfig::default().open_db().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
