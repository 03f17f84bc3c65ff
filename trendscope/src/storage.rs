use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::tracker::{ComponentScores, Snapshot, SnapshotBackend, SnapshotScores};

/// Snapshots persisted in the `quality_snapshots` table.
///
/// Rows are replayed ordered by `id`, i.e. in insertion order.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Wraps `pool`, creating the table if needed.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        common::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Wraps `pool` as is; the table must already exist.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    topic: String,
    recorded_at: String,
    overall_score: f64,
    experience: f64,
    expertise: f64,
    authoritativeness: f64,
    trustworthiness: f64,
    human_elements_score: f64,
    content_quality_score: f64,
    human_inputs_quality: f64,
    recommendations_json: String,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<Snapshot> {
        let timestamp = DateTime::parse_from_rfc3339(&self.recorded_at)
            .with_context(|| format!("invalid recorded_at: {}", self.recorded_at))?
            .with_timezone(&Utc);
        let recommendations: Vec<String> = serde_json::from_str(&self.recommendations_json)
            .context("invalid recommendations_json")?;

        let scores = SnapshotScores {
            topic: self.topic,
            overall_score: Some(self.overall_score),
            component_scores: ComponentScores {
                experience: self.experience,
                expertise: self.expertise,
                authoritativeness: self.authoritativeness,
                trustworthiness: self.trustworthiness,
            },
            human_elements_score: self.human_elements_score,
            content_quality_score: self.content_quality_score,
            human_inputs_quality: self.human_inputs_quality,
            recommendations,
        };
        Snapshot::new(scores, timestamp).map_err(anyhow::Error::new)
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for SqliteBackend {
    async fn load_all(&self) -> Result<Vec<Snapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT topic, recorded_at, overall_score, experience, expertise, authoritativeness,
                   trustworthiness, human_elements_score, content_quality_score,
                   human_inputs_quality, recommendations_json
            FROM quality_snapshots
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load snapshots")?;

        debug!(rows = rows.len(), "loaded snapshots");
        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }

    async fn append(&self, snapshot: &Snapshot) -> Result<()> {
        let recommendations =
            serde_json::to_string(snapshot.recommendations()).context("failed to encode recommendations")?;
        let scores = snapshot.component_scores();

        sqlx::query(
            r#"
            INSERT INTO quality_snapshots
                (topic, recorded_at, overall_score, experience, expertise, authoritativeness,
                 trustworthiness, human_elements_score, content_quality_score,
                 human_inputs_quality, recommendations_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot.topic())
        .bind(snapshot.timestamp().to_rfc3339_opts(SecondsFormat::Nanos, true))
        .bind(snapshot.overall_score())
        .bind(scores.experience)
        .bind(scores.expertise)
        .bind(scores.authoritativeness)
        .bind(scores.trustworthiness)
        .bind(snapshot.human_elements_score())
        .bind(snapshot.content_quality_score())
        .bind(snapshot.human_inputs_quality())
        .bind(recommendations)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert snapshot for {}", snapshot.topic()))?;

        Ok(())
    }
}
