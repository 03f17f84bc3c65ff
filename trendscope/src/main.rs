/*
trendscope - single-binary main.rs
Runs one ecosystem analysis, or records and compares quality snapshots, and prints JSON.
*/

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use common::Config;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use common::init_db_pool;
use trendscope::llm::create_suggestion_service;
use trendscope::pipeline::EcosystemAnalyzer;
use trendscope::storage::SqliteBackend;
use trendscope::tracker::{Comparison, ImprovementTracker, SnapshotScores, SnapshotStore};

#[derive(Parser, Debug)]
#[command(name = "trendscope", about = "Entity & trend intelligence with continuous improvement tracking")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Map a topic's entity ecosystem and print a prioritized content plan
    Analyze {
        topic: String,
        /// Competitor entity to compare against (repeatable)
        #[arg(long = "competitor", value_name = "NAME")]
        competitors: Vec<String>,
    },
    /// Record a quality snapshot from a scores JSON file
    Track {
        #[arg(long, value_name = "FILE")]
        scores: PathBuf,
    },
    /// Compare the latest snapshot with the previous one (or a given one)
    Compare {
        topic: String,
        /// RFC 3339 timestamp of the snapshot to compare against
        #[arg(long, value_name = "RFC3339")]
        previous: Option<DateTime<Utc>>,
    },
    /// Score direction over the whole history of a topic
    Trajectory { topic: String },
    /// Compare the latest snapshot with industry tiers
    Benchmark { topic: String },
    /// List stored snapshots for a topic
    History { topic: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Logs go to stderr so stdout stays valid JSON
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    // Load configuration with defaults
    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    match args.command {
        Command::Analyze { topic, competitors } => {
            // a misconfigured suggestion service is a startup error, like the other adapters
            let suggestions = match &config.llm {
                Some(llm_config) => create_suggestion_service(llm_config)?,
                None => None,
            };
            if suggestions.is_none() {
                info!("LLM suggestions disabled");
            }
            let analyzer = EcosystemAnalyzer::from_config(&config, suggestions)?;
            let analysis = analyzer.analyze_entity_ecosystem(&topic, &competitors).await?;
            print_json(&analysis)
        }
        Command::Track { scores: path } => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read scores file: {}", path.display()))?;
            let scores: SnapshotScores =
                serde_json::from_str(&raw).with_context(|| format!("invalid scores JSON in {}", path.display()))?;
            let tracker = open_tracker(&config).await?;
            let snapshot = tracker.track(scores).await?;
            print_json(&snapshot)
        }
        Command::Compare { topic, previous } => {
            let tracker = open_tracker(&config).await?;
            let comparison = match previous {
                Some(ts) => tracker.compare_with(&topic, ts).await,
                None => tracker.compare_latest(&topic).await,
            };
            match &comparison {
                Comparison::NotFound { .. } => warn!(topic = %topic, "no matching snapshot"),
                Comparison::Incomparable { reason, .. } => warn!(topic = %topic, %reason, "snapshots not comparable"),
                _ => {}
            }
            print_json(&comparison)
        }
        Command::Trajectory { topic } => {
            let tracker = open_tracker(&config).await?;
            print_json(&tracker.trajectory(&topic).await)
        }
        Command::Benchmark { topic } => {
            let tracker = open_tracker(&config).await?;
            match tracker.benchmark(&topic).await {
                Some(report) => print_json(&report),
                None => {
                    warn!(topic = %topic, "no snapshots to benchmark");
                    print_json(&Comparison::NotFound { topic, timestamp: None })
                }
            }
        }
        Command::History { topic } => {
            let tracker = open_tracker(&config).await?;
            print_json(&tracker.store().history(&topic).await)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_tracker(config: &Config) -> Result<ImprovementTracker> {
    // Resolve and log the absolute DB path before connecting
    let db_path_abs = match tokio::fs::canonicalize(&config.database.path).await {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => config.database.path.clone(),
    };
    info!(db_path = %db_path_abs, "resolved DB path");

    let db_pool = match init_db_pool(&db_path_abs).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %db_path_abs, "failed to initialize database pool");
            return Err(e);
        }
    };

    // Schema bootstrap is on unless the administrator disabled it with `admin.auto_migrate = false`
    let backend = if config.admin.as_ref().and_then(|a| a.auto_migrate).unwrap_or(true) {
        SqliteBackend::new(db_pool).await?
    } else {
        info!("auto_migrate disabled: expecting quality_snapshots to exist");
        SqliteBackend::from_pool(db_pool)
    };
    let store = SnapshotStore::open(Arc::new(backend)).await?;
    Ok(ImprovementTracker::new(Arc::new(store)))
}
