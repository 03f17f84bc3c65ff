//! Continuous improvement tracking.
//!
//! Snapshots of quality scores are appended to a `SnapshotStore`; the
//! analyzer and benchmark comparator only ever read them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::error::{PipelineError, Result};

pub mod analyzer;
pub mod benchmark;
pub mod store;

pub use analyzer::{
    BaselineReport, Comparison, ImprovementAnalyzer, ImprovementLevel, ProgressReport, Trajectory,
    TrajectoryDirection,
};
pub use benchmark::{BenchmarkComparator, BenchmarkReport, BenchmarkStatus, MarketPosition};
pub use store::{MemoryBackend, SnapshotBackend, SnapshotStore};

pub const MAX_SCORE: f64 = 10.0;

/// The four E-E-A-T components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Experience,
    Expertise,
    Authoritativeness,
    Trustworthiness,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Experience,
        Component::Expertise,
        Component::Authoritativeness,
        Component::Trustworthiness,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Component::Experience => "experience",
            Component::Expertise => "expertise",
            Component::Authoritativeness => "authoritativeness",
            Component::Trustworthiness => "trustworthiness",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every metric a progress report computes a delta for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Overall,
    Experience,
    Expertise,
    Authoritativeness,
    Trustworthiness,
    HumanElements,
    ContentQuality,
    HumanInputsQuality,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Overall,
        Metric::Experience,
        Metric::Expertise,
        Metric::Authoritativeness,
        Metric::Trustworthiness,
        Metric::HumanElements,
        Metric::ContentQuality,
        Metric::HumanInputsQuality,
    ];
}

impl From<Component> for Metric {
    fn from(c: Component) -> Self {
        match c {
            Component::Experience => Metric::Experience,
            Component::Expertise => Metric::Expertise,
            Component::Authoritativeness => Metric::Authoritativeness,
            Component::Trustworthiness => Metric::Trustworthiness,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub experience: f64,
    pub expertise: f64,
    pub authoritativeness: f64,
    pub trustworthiness: f64,
}

impl ComponentScores {
    pub fn get(&self, component: Component) -> f64 {
        match component {
            Component::Experience => self.experience,
            Component::Expertise => self.expertise,
            Component::Authoritativeness => self.authoritativeness,
            Component::Trustworthiness => self.trustworthiness,
        }
    }

    pub fn mean(&self) -> f64 {
        Component::ALL.iter().map(|c| self.get(*c)).sum::<f64>() / Component::ALL.len() as f64
    }

    /// Population variance over the four components.
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        Component::ALL
            .iter()
            .map(|c| (self.get(*c) - mean).powi(2))
            .sum::<f64>()
            / Component::ALL.len() as f64
    }
}

/// Scores handed over by the scoring collaborator, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotScores {
    pub topic: String,
    /// Mean of the component scores when absent.
    #[serde(default)]
    pub overall_score: Option<f64>,
    pub component_scores: ComponentScores,
    pub human_elements_score: f64,
    pub content_quality_score: f64,
    pub human_inputs_quality: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// One immutable, validated record of quality scores for a topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    timestamp: DateTime<Utc>,
    topic: String,
    overall_score: f64,
    component_scores: ComponentScores,
    human_elements_score: f64,
    content_quality_score: f64,
    human_inputs_quality: f64,
    recommendations: Vec<String>,
}

fn check_score(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=MAX_SCORE).contains(&value) {
        return Err(PipelineError::invariant(format!(
            "{} must be within [0, {}], got {}",
            name, MAX_SCORE, value
        )));
    }
    Ok(())
}

impl Snapshot {
    /// Validate `scores` and stamp them with `timestamp`.
    pub fn new(scores: SnapshotScores, timestamp: DateTime<Utc>) -> Result<Self> {
        let topic = scores.topic.trim().to_string();
        if topic.is_empty() {
            return Err(PipelineError::malformed("snapshot topic must not be empty"));
        }

        for component in Component::ALL {
            check_score(component.name(), scores.component_scores.get(component))?;
        }
        let overall_score = scores.overall_score.unwrap_or_else(|| scores.component_scores.mean());
        check_score("overall_score", overall_score)?;
        check_score("human_elements_score", scores.human_elements_score)?;
        check_score("content_quality_score", scores.content_quality_score)?;
        check_score("human_inputs_quality", scores.human_inputs_quality)?;

        Ok(Self {
            timestamp,
            topic,
            overall_score,
            component_scores: scores.component_scores,
            human_elements_score: scores.human_elements_score,
            content_quality_score: scores.content_quality_score,
            human_inputs_quality: scores.human_inputs_quality,
            recommendations: scores.recommendations,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    pub fn component_scores(&self) -> &ComponentScores {
        &self.component_scores
    }

    pub fn human_elements_score(&self) -> f64 {
        self.human_elements_score
    }

    pub fn content_quality_score(&self) -> f64 {
        self.content_quality_score
    }

    pub fn human_inputs_quality(&self) -> f64 {
        self.human_inputs_quality
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Overall => self.overall_score,
            Metric::Experience => self.component_scores.experience,
            Metric::Expertise => self.component_scores.expertise,
            Metric::Authoritativeness => self.component_scores.authoritativeness,
            Metric::Trustworthiness => self.component_scores.trustworthiness,
            Metric::HumanElements => self.human_elements_score,
            Metric::ContentQuality => self.content_quality_score,
            Metric::HumanInputsQuality => self.human_inputs_quality,
        }
    }

    /// Back to the collaborator's shape, with the overall score made explicit.
    pub fn to_scores(&self) -> SnapshotScores {
        SnapshotScores {
            topic: self.topic.clone(),
            overall_score: Some(self.overall_score),
            component_scores: self.component_scores,
            human_elements_score: self.human_elements_score,
            content_quality_score: self.content_quality_score,
            human_inputs_quality: self.human_inputs_quality,
            recommendations: self.recommendations.clone(),
        }
    }
}

/// Store, analyzer and comparator behind one handle.
#[derive(Clone)]
pub struct ImprovementTracker {
    store: Arc<SnapshotStore>,
    analyzer: ImprovementAnalyzer,
    comparator: BenchmarkComparator,
}

impl ImprovementTracker {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self {
            store,
            analyzer: ImprovementAnalyzer,
            comparator: BenchmarkComparator::default(),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub async fn track(&self, scores: SnapshotScores) -> Result<Snapshot> {
        self.track_at(scores, Utc::now()).await
    }

    pub async fn track_at(&self, scores: SnapshotScores, timestamp: DateTime<Utc>) -> Result<Snapshot> {
        let snapshot = Snapshot::new(scores, timestamp)?;
        self.store.append(snapshot.clone()).await?;
        info!(topic = %snapshot.topic(), overall = snapshot.overall_score(), "snapshot tracked");
        Ok(snapshot)
    }

    /// Latest snapshot against the one before it, or a baseline when it is the only one.
    pub async fn compare_latest(&self, topic: &str) -> Comparison {
        let history = self.store.history(topic).await;
        match history.as_slice() {
            [] => Comparison::NotFound {
                topic: topic.to_string(),
                timestamp: None,
            },
            [only] => self.analyzer.compare(only, None),
            [.., previous, current] => self.analyzer.compare(current, Some(previous)),
        }
    }

    /// Latest snapshot against the one recorded at `previous`.
    pub async fn compare_with(&self, topic: &str, previous: DateTime<Utc>) -> Comparison {
        let Some(current) = self.store.latest(topic).await else {
            return Comparison::NotFound {
                topic: topic.to_string(),
                timestamp: None,
            };
        };
        match self.store.find(topic, previous).await {
            Some(prev) => self.analyzer.compare(&current, Some(&prev)),
            None => Comparison::NotFound {
                topic: topic.to_string(),
                timestamp: Some(previous),
            },
        }
    }

    pub async fn trajectory(&self, topic: &str) -> Trajectory {
        let history = self.store.history(topic).await;
        self.analyzer.trajectory(topic, &history)
    }

    /// Benchmarks the latest snapshot, projecting ROI with the latest velocity.
    pub async fn benchmark(&self, topic: &str) -> Option<BenchmarkReport> {
        let latest = self.store.latest(topic).await?;
        let velocity = match self.compare_latest(topic).await {
            Comparison::Progress(report) => report.velocity,
            _ => 0.0,
        };
        Some(self.comparator.compare(&latest, velocity))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn scores(topic: &str, overall: f64) -> SnapshotScores {
        SnapshotScores {
            topic: topic.to_string(),
            overall_score: Some(overall),
            component_scores: ComponentScores {
                experience: 6.0,
                expertise: 7.0,
                authoritativeness: 5.0,
                trustworthiness: 8.0,
            },
            human_elements_score: 5.5,
            content_quality_score: 6.5,
            human_inputs_quality: 4.0,
            recommendations: vec!["Add first-hand examples".to_string()],
        }
    }

    pub(crate) fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_overall_defaults_to_component_mean() {
        let mut s = scores("rust", 0.0);
        s.overall_score = None;
        let snap = Snapshot::new(s, at(1)).unwrap();
        assert_eq!(snap.overall_score(), 6.5);
    }

    #[test]
    fn test_out_of_range_scores_rejected() {
        let err = Snapshot::new(scores("rust", 10.5), at(1)).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));

        let mut s = scores("rust", 5.0);
        s.component_scores.trustworthiness = f64::NAN;
        assert!(matches!(Snapshot::new(s, at(1)), Err(PipelineError::InvariantViolation(_))));

        let mut s = scores("rust", 5.0);
        s.human_inputs_quality = -0.1;
        assert!(Snapshot::new(s, at(1)).is_err());

        assert!(matches!(
            Snapshot::new(scores("  ", 5.0), at(1)),
            Err(PipelineError::MalformedInput(_))
        ));
        assert!(Snapshot::new(scores("rust", 0.0), at(1)).is_ok());
        assert!(Snapshot::new(scores("rust", 10.0), at(1)).is_ok());
    }

    #[test]
    fn test_component_variance() {
        let c = ComponentScores {
            experience: 6.0,
            expertise: 7.0,
            authoritativeness: 5.0,
            trustworthiness: 8.0,
        };
        assert!((c.variance() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_scores_deserialize_without_overall() {
        let json = r#"{
            "topic": "rust",
            "component_scores": {"experience": 6, "expertise": 7, "authoritativeness": 5, "trustworthiness": 8},
            "human_elements_score": 5.5,
            "content_quality_score": 6.5,
            "human_inputs_quality": 4
        }"#;
        let s: SnapshotScores = serde_json::from_str(json).unwrap();
        assert_eq!(s.overall_score, None);
        assert!(s.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_tracker_flow() {
        let tracker = ImprovementTracker::new(Arc::new(SnapshotStore::in_memory()));
        assert!(matches!(tracker.compare_latest("rust").await, Comparison::NotFound { .. }));
        assert!(tracker.benchmark("rust").await.is_none());

        tracker.track_at(scores("rust", 4.0), at(1)).await.unwrap();
        assert!(matches!(tracker.compare_latest("rust").await, Comparison::Baseline(_)));
        // nonexistent previous snapshot
        assert!(matches!(
            tracker.compare_with("rust", at(9)).await,
            Comparison::NotFound { timestamp: Some(_), .. }
        ));

        tracker.track_at(scores("rust", 6.0), at(3)).await.unwrap();
        match tracker.compare_latest("rust").await {
            Comparison::Progress(report) => {
                assert_eq!(report.improvement_level, ImprovementLevel::Excellent);
                assert!((report.velocity - 1.0).abs() < 1e-9);
            }
            other => panic!("expected progress, got {:?}", other),
        }
        assert!(matches!(tracker.compare_with("rust", at(1)).await, Comparison::Progress(_)));

        let bench = tracker.benchmark("rust").await.unwrap();
        assert_eq!(bench.roi[0].days, 30);
        assert_eq!(bench.roi[0].projected_score, 10.0);
    }
}
