/*!
common/src/lib.rs

Shared configuration types and DB helper functions for Trendscope.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- Helpers to initialize an SQLite database and bootstrap the snapshot schema
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/trendscope.db")
    pub path: String,
}

/// Entity lookup (knowledge graph search) service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraphConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub result_limit: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

/// Search-interest (trends) service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendsConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Minimum delay between two consecutive calls to the service
    pub min_interval_millis: Option<u64>,
    pub max_retries: Option<u32>,
    /// Timeframe names, e.g. "last_90_days", "last_year"
    pub timeframes: Option<Vec<String>>,
}

/// Remote LLM config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config. The LLM only backs the free-text suggestion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote", "none"
    pub remote: Option<RemoteLlmConfig>,
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub max_related_entities: Option<usize>,
    pub suggestion_limit: Option<usize>,
    pub phase_one_high_limit: Option<usize>,
    pub max_trend_keywords: Option<usize>,
}

impl PipelineConfig {
    pub fn max_related_entities(&self) -> usize {
        self.max_related_entities.unwrap_or(50).min(50)
    }

    pub fn suggestion_limit(&self) -> usize {
        self.suggestion_limit.unwrap_or(20).min(20)
    }

    pub fn phase_one_high_limit(&self) -> usize {
        self.phase_one_high_limit.unwrap_or(3)
    }

    /// The search-interest service accepts at most five keywords per request.
    pub fn max_trend_keywords(&self) -> usize {
        self.max_trend_keywords.unwrap_or(5).clamp(1, 5)
    }
}

/// Admin / maintenance config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub auto_migrate: Option<bool>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub knowledge_graph: KnowledgeGraphConfig,
    #[serde(default)]
    pub trends: TrendsConfig,
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub admin: Option<AdminConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the service URLs are well formed so a typo fails at startup rather than on the first call.
    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("knowledge_graph.api_url", self.knowledge_graph.api_url.as_deref()),
            ("trends.api_url", self.trends.api_url.as_deref()),
            (
                "llm.remote.api_url",
                self.llm.as_ref().and_then(|l| l.remote.as_ref()).and_then(|r| r.api_url.as_deref()),
            ),
        ];
        for (key, value) in urls {
            if let Some(raw) = value {
                url::Url::parse(raw).with_context(|| format!("Invalid URL for {}: {}", key, raw))?;
            }
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Read an API key from the environment variable named in the config.
pub fn api_key_from_env(var_name: Option<&str>) -> Result<Option<String>> {
    match var_name {
        None => Ok(None),
        Some(name) => {
            let key = std::env::var(name)
                .with_context(|| format!("API key env var '{}' not set", name))?;
            Ok(Some(key))
        }
    }
}

/// Create the snapshot table if it does not exist yet.
///
/// Timestamps are stored as RFC 3339 text with nanosecond precision so that a
/// snapshot read back compares equal to the one written. Insertion order (`id`)
/// is the replay order.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quality_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            overall_score REAL NOT NULL,
            experience REAL NOT NULL,
            expertise REAL NOT NULL,
            authoritativeness REAL NOT NULL,
            trustworthiness REAL NOT NULL,
            human_elements_score REAL NOT NULL,
            content_quality_score REAL NOT NULL,
            human_inputs_quality REAL NOT NULL,
            recommendations_json TEXT NOT NULL DEFAULT '[]'
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create quality_snapshots table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_quality_snapshots_topic ON quality_snapshots (topic, recorded_at)",
    )
    .execute(pool)
    .await
    .context("Failed to create quality_snapshots index")?;

    Ok(())
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary, ensure the DB file exists
/// (attempting to create it if missing), and return a configured `SqlitePool`.
/// - max_connections: 5
/// - connection timeout default provided by `sqlx`
///
/// Example:
///   let pool = init_db_pool("data/trendscope.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    // Creating the file up front surfaces permission problems with a clearer message
    // than the SQLite connection error would.
    tokio::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}
