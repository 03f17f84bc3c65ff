use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::{Component, ComponentScores, Metric, Snapshot, MAX_SCORE};

const STRONG_BASELINE: f64 = 7.0;
const MODERATE_BASELINE: f64 = 5.0;
/// Total change over the whole history below this counts as stable.
const TRAJECTORY_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementLevel {
    Excellent,
    Good,
    Moderate,
    Minimal,
    Declining,
}

impl ImprovementLevel {
    pub fn from_delta(delta: f64) -> Self {
        if delta >= 2.0 {
            ImprovementLevel::Excellent
        } else if delta >= 1.0 {
            ImprovementLevel::Good
        } else if delta >= 0.5 {
            ImprovementLevel::Moderate
        } else if delta >= 0.0 {
            ImprovementLevel::Minimal
        } else {
            ImprovementLevel::Declining
        }
    }
}

impl fmt::Display for ImprovementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImprovementLevel::Excellent => "excellent",
            ImprovementLevel::Good => "good",
            ImprovementLevel::Moderate => "moderate",
            ImprovementLevel::Minimal => "minimal",
            ImprovementLevel::Declining => "declining",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineReport {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    pub component_scores: ComponentScores,
    /// `10 - overall`, never negative.
    pub improvement_potential: f64,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub topic: String,
    pub previous_timestamp: DateTime<Utc>,
    pub current_timestamp: DateTime<Utc>,
    pub days_between: i64,
    pub deltas: BTreeMap<Metric, f64>,
    pub velocity: f64,
    pub improvement_level: ImprovementLevel,
    pub balance_score: f64,
    pub most_improved: Vec<Component>,
    pub declining_components: Vec<Component>,
    pub insights: Vec<String>,
}

impl ProgressReport {
    pub fn delta(&self, metric: Metric) -> f64 {
        self.deltas.get(&metric).copied().unwrap_or(0.0)
    }
}

/// Outcome of a comparison. `NotFound` and `Incomparable` are regular values
/// so callers can branch on them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Comparison {
    Baseline(BaselineReport),
    Progress(ProgressReport),
    NotFound {
        topic: String,
        timestamp: Option<DateTime<Utc>>,
    },
    /// The pair belongs to different topics or is out of order.
    Incomparable {
        topic: String,
        previous_topic: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub topic: String,
    pub snapshots: usize,
    pub direction: TrajectoryDirection,
    pub total_change: f64,
    pub average_velocity: f64,
    pub best_overall: Option<f64>,
    pub worst_overall: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImprovementAnalyzer;

/// Whole days between two instants, never less than one.
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_days().max(1)
}

impl ImprovementAnalyzer {
    /// Progress needs `previous` to be an earlier (or same-instant) snapshot of
    /// the same topic; anything else is `Incomparable`.
    pub fn compare(&self, current: &Snapshot, previous: Option<&Snapshot>) -> Comparison {
        let Some(previous) = previous else {
            return Comparison::Baseline(self.baseline(current));
        };
        let reason = if previous.topic() != current.topic() {
            Some(format!(
                "snapshots belong to different topics ('{}' vs '{}')",
                previous.topic(),
                current.topic()
            ))
        } else if previous.timestamp() > current.timestamp() {
            Some(format!(
                "previous snapshot ({}) is newer than current ({})",
                previous.timestamp().to_rfc3339(),
                current.timestamp().to_rfc3339()
            ))
        } else {
            None
        };
        match reason {
            Some(reason) => Comparison::Incomparable {
                topic: current.topic().to_string(),
                previous_topic: previous.topic().to_string(),
                reason,
            },
            None => Comparison::Progress(self.progress(current, previous)),
        }
    }

    pub fn baseline(&self, current: &Snapshot) -> BaselineReport {
        let overall = current.overall_score();
        let mut insights = vec![if overall >= STRONG_BASELINE {
            format!("Strong baseline at {:.1}: focus on maintaining and refining quality", overall)
        } else if overall >= MODERATE_BASELINE {
            format!("Moderate baseline at {:.1}: targeted improvements will pay off", overall)
        } else {
            format!("Significant opportunity at {:.1}: prioritize foundational quality work", overall)
        }];

        let scores = current.component_scores();
        if let Some(weakest) = Component::ALL
            .into_iter()
            .min_by(|a, b| scores.get(*a).total_cmp(&scores.get(*b)))
        {
            insights.push(format!(
                "Weakest component is {} at {:.1}",
                weakest,
                scores.get(weakest)
            ));
        }

        BaselineReport {
            topic: current.topic().to_string(),
            timestamp: current.timestamp(),
            overall_score: overall,
            component_scores: *scores,
            improvement_potential: (MAX_SCORE - overall).clamp(0.0, MAX_SCORE),
            insights,
        }
    }

    pub fn progress(&self, current: &Snapshot, previous: &Snapshot) -> ProgressReport {
        let deltas: BTreeMap<Metric, f64> = Metric::ALL
            .into_iter()
            .map(|m| (m, current.metric(m) - previous.metric(m)))
            .collect();
        let overall_delta = deltas.get(&Metric::Overall).copied().unwrap_or(0.0);

        let days = days_between(previous.timestamp(), current.timestamp());
        let velocity = overall_delta / days as f64;
        let improvement_level = ImprovementLevel::from_delta(overall_delta);
        let balance_score = (MAX_SCORE - current.component_scores().variance()).max(0.0);

        let component_delta = |c: Component| deltas.get(&Metric::from(c)).copied().unwrap_or(0.0);
        let best = Component::ALL
            .into_iter()
            .map(component_delta)
            .fold(f64::NEG_INFINITY, f64::max);
        let most_improved: Vec<Component> = if best > 0.0 {
            Component::ALL
                .into_iter()
                .filter(|c| component_delta(*c) == best)
                .collect()
        } else {
            Vec::new()
        };
        let declining_components: Vec<Component> = Component::ALL
            .into_iter()
            .filter(|c| component_delta(*c) < 0.0)
            .collect();

        let mut insights = vec![format!(
            "Overall score moved {:+.1} over {} day(s) ({} improvement)",
            overall_delta, days, improvement_level
        )];
        for c in &most_improved {
            insights.push(format!("{} improved the most ({:+.1})", c, component_delta(*c)));
        }
        for c in &declining_components {
            insights.push(format!("{} declined ({:+.1}) and needs attention", c, component_delta(*c)));
        }
        if balance_score < 8.0 {
            insights.push("Component scores are uneven; strengthen the weakest areas".to_string());
        }

        ProgressReport {
            topic: current.topic().to_string(),
            previous_timestamp: previous.timestamp(),
            current_timestamp: current.timestamp(),
            days_between: days,
            deltas,
            velocity,
            improvement_level,
            balance_score,
            most_improved,
            declining_components,
            insights,
        }
    }

    /// Direction over the whole history, first snapshot to last.
    pub fn trajectory(&self, topic: &str, history: &[Snapshot]) -> Trajectory {
        let best_overall = history.iter().map(Snapshot::overall_score).reduce(f64::max);
        let worst_overall = history.iter().map(Snapshot::overall_score).reduce(f64::min);

        let (direction, total_change, average_velocity) = match (history.first(), history.last()) {
            (Some(first), Some(last)) if history.len() >= 2 => {
                let change = last.overall_score() - first.overall_score();
                let direction = if change > TRAJECTORY_TOLERANCE {
                    TrajectoryDirection::Improving
                } else if change < -TRAJECTORY_TOLERANCE {
                    TrajectoryDirection::Declining
                } else {
                    TrajectoryDirection::Stable
                };
                let days = days_between(first.timestamp(), last.timestamp());
                (direction, change, change / days as f64)
            }
            _ => (TrajectoryDirection::InsufficientData, 0.0, 0.0),
        };

        Trajectory {
            topic: topic.trim().to_string(),
            snapshots: history.len(),
            direction,
            total_change,
            average_velocity,
            best_overall,
            worst_overall,
        }
    }
}
