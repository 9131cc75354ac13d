use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_DATA_PATH: &str = "revenue_data.json";
pub const DEFAULT_LAST_UPDATED_PATH: &str = "last_updated.txt";

/// Settings read from the environment (and `.env`, loaded in `main`).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: Option<String>,
    pub revenue_data_path: PathBuf,
    pub last_updated_path: PathBuf,
    pub backend_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            database_url: non_empty("DATABASE_URL"),
            revenue_data_path: non_empty("REVENUE_DATA_PATH")
                .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string())
                .into(),
            last_updated_path: non_empty("LAST_UPDATED_PATH")
                .unwrap_or_else(|| DEFAULT_LAST_UPDATED_PATH.to_string())
                .into(),
            backend_url: non_empty("BACKEND_URL"),
        }
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}
