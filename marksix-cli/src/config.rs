use std::path::PathBuf;
use std::time::Duration;

use marksix_db::dataset::SourceOrder;
use marksix_db::db::{DEFAULT_DATASET, db_path};
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("环境变量 {var} 无效 : '{value}'")]
    Invalid { var: &'static str, value: String },
    #[error("未配置数据源，请使用 --url 或设置 MARKSIX_SOURCE_URL")]
    NoSource,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Results page URL, may contain `{year}`.
    pub url_template: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
    pub order: SourceOrder,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub dataset: String,
    pub source: SourceConfig,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout_secs = match non_empty("MARKSIX_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().ok().filter(|s| *s > 0).ok_or(ConfigError::Invalid {
                var: "MARKSIX_TIMEOUT_SECS",
                value: v,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let order = match non_empty("MARKSIX_SOURCE_ORDER") {
            Some(v) => parse_order(&v).ok_or(ConfigError::Invalid {
                var: "MARKSIX_SOURCE_ORDER",
                value: v,
            })?,
            None => SourceOrder::default(),
        };

        Ok(Self {
            db_path: non_empty("MARKSIX_DB").map(PathBuf::from).unwrap_or_else(db_path),
            dataset: non_empty("MARKSIX_DATASET").unwrap_or_else(|| DEFAULT_DATASET.to_string()),
            source: SourceConfig {
                url_template: non_empty("MARKSIX_SOURCE_URL"),
                user_agent: non_empty("MARKSIX_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                timeout: Duration::from_secs(timeout_secs),
                order,
            },
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

fn parse_order(s: &str) -> Option<SourceOrder> {
    match s.to_ascii_lowercase().as_str() {
        "newest-first" | "newest" | "desc" => Some(SourceOrder::NewestFirst),
        "oldest-first" | "oldest" | "asc" => Some(SourceOrder::OldestFirst),
        _ => None,
    }
}
