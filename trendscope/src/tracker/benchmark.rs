use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::{Snapshot, MAX_SCORE};

/// Differences within this band of a benchmark count as "at".
const STATUS_BAND: f64 = 0.2;
pub const ROI_HORIZONS_DAYS: [u32; 3] = [30, 90, 180];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkMetric {
    Experience,
    Expertise,
    Authoritativeness,
    Trustworthiness,
    OverallEeat,
    HumanElements,
    ContentQuality,
}

impl BenchmarkMetric {
    pub const ALL: [BenchmarkMetric; 7] = [
        BenchmarkMetric::Experience,
        BenchmarkMetric::Expertise,
        BenchmarkMetric::Authoritativeness,
        BenchmarkMetric::Trustworthiness,
        BenchmarkMetric::OverallEeat,
        BenchmarkMetric::HumanElements,
        BenchmarkMetric::ContentQuality,
    ];

    fn of(&self, snapshot: &Snapshot) -> f64 {
        let c = snapshot.component_scores();
        match self {
            BenchmarkMetric::Experience => c.experience,
            BenchmarkMetric::Expertise => c.expertise,
            BenchmarkMetric::Authoritativeness => c.authoritativeness,
            BenchmarkMetric::Trustworthiness => c.trustworthiness,
            BenchmarkMetric::OverallEeat => snapshot.overall_score(),
            BenchmarkMetric::HumanElements => snapshot.human_elements_score(),
            BenchmarkMetric::ContentQuality => snapshot.content_quality_score(),
        }
    }
}

/// A fixed set of reference scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkTier {
    pub name: &'static str,
    pub experience: f64,
    pub expertise: f64,
    pub authoritativeness: f64,
    pub trustworthiness: f64,
    pub overall_eeat: f64,
    pub human_elements: f64,
    pub content_quality: f64,
}

impl BenchmarkTier {
    pub const INDUSTRY_AVERAGE: BenchmarkTier = BenchmarkTier {
        name: "industry_average",
        experience: 5.5,
        expertise: 6.0,
        authoritativeness: 5.0,
        trustworthiness: 6.5,
        overall_eeat: 5.8,
        human_elements: 4.5,
        content_quality: 6.0,
    };

    pub const TOP_QUARTILE: BenchmarkTier = BenchmarkTier {
        name: "top_quartile",
        experience: 7.5,
        expertise: 8.0,
        authoritativeness: 7.0,
        trustworthiness: 8.5,
        overall_eeat: 7.8,
        human_elements: 7.0,
        content_quality: 8.0,
    };

    pub const INDUSTRY_LEADERS: BenchmarkTier = BenchmarkTier {
        name: "industry_leaders",
        experience: 9.0,
        expertise: 9.2,
        authoritativeness: 8.8,
        trustworthiness: 9.5,
        overall_eeat: 9.0,
        human_elements: 8.5,
        content_quality: 9.0,
    };

    pub fn get(&self, metric: BenchmarkMetric) -> f64 {
        match metric {
            BenchmarkMetric::Experience => self.experience,
            BenchmarkMetric::Expertise => self.expertise,
            BenchmarkMetric::Authoritativeness => self.authoritativeness,
            BenchmarkMetric::Trustworthiness => self.trustworthiness,
            BenchmarkMetric::OverallEeat => self.overall_eeat,
            BenchmarkMetric::HumanElements => self.human_elements,
            BenchmarkMetric::ContentQuality => self.content_quality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkStatus {
    Above,
    At,
    Below,
}

impl BenchmarkStatus {
    pub fn from_difference(difference: f64) -> Self {
        if difference > STATUS_BAND {
            BenchmarkStatus::Above
        } else if difference < -STATUS_BAND {
            BenchmarkStatus::Below
        } else {
            BenchmarkStatus::At
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPosition {
    IndustryLeader,
    TopQuartilePerformer,
    AboveAveragePerformer,
    BelowAveragePerformer,
}

impl fmt::Display for MarketPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketPosition::IndustryLeader => "industry_leader",
            MarketPosition::TopQuartilePerformer => "top_quartile_performer",
            MarketPosition::AboveAveragePerformer => "above_average_performer",
            MarketPosition::BelowAveragePerformer => "below_average_performer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricComparison {
    pub current: f64,
    pub benchmark: f64,
    pub difference: f64,
    pub status: BenchmarkStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierComparison {
    pub tier: &'static str,
    pub metrics: BTreeMap<BenchmarkMetric, MetricComparison>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoiProjection {
    pub days: u32,
    pub projected_score: f64,
    pub performance_improvement_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub tiers: Vec<TierComparison>,
    pub market_position: MarketPosition,
    pub velocity: f64,
    pub roi: Vec<RoiProjection>,
}

/// Compares snapshots against fixed tiers, ordered lowest to highest.
#[derive(Debug, Clone)]
pub struct BenchmarkComparator {
    tiers: [BenchmarkTier; 3],
}

impl Default for BenchmarkComparator {
    fn default() -> Self {
        Self {
            tiers: [
                BenchmarkTier::INDUSTRY_AVERAGE,
                BenchmarkTier::TOP_QUARTILE,
                BenchmarkTier::INDUSTRY_LEADERS,
            ],
        }
    }
}

fn performance_multiplier(score: f64) -> f64 {
    (score / 5.0).max(1.0)
}

impl BenchmarkComparator {
    pub fn tiers(&self) -> &[BenchmarkTier] {
        &self.tiers
    }

    pub fn compare(&self, snapshot: &Snapshot, velocity: f64) -> BenchmarkReport {
        let tiers = self
            .tiers
            .iter()
            .map(|tier| TierComparison {
                tier: tier.name,
                metrics: BenchmarkMetric::ALL
                    .into_iter()
                    .map(|m| {
                        let current = m.of(snapshot);
                        let benchmark = tier.get(m);
                        let difference = current - benchmark;
                        (
                            m,
                            MetricComparison {
                                current,
                                benchmark,
                                difference,
                                status: BenchmarkStatus::from_difference(difference),
                            },
                        )
                    })
                    .collect(),
            })
            .collect();

        BenchmarkReport {
            topic: snapshot.topic().to_string(),
            timestamp: snapshot.timestamp(),
            tiers,
            market_position: self.market_position(snapshot.overall_score()),
            velocity,
            roi: project_roi(snapshot.overall_score(), velocity),
        }
    }

    /// Highest tier whose overall threshold is met.
    pub fn market_position(&self, overall: f64) -> MarketPosition {
        let [average, top, leaders] = &self.tiers;
        if overall >= leaders.overall_eeat {
            MarketPosition::IndustryLeader
        } else if overall >= top.overall_eeat {
            MarketPosition::TopQuartilePerformer
        } else if overall >= average.overall_eeat {
            MarketPosition::AboveAveragePerformer
        } else {
            MarketPosition::BelowAveragePerformer
        }
    }
}

/// Linear extrapolation clamped to the score range.
pub fn project_roi(overall: f64, velocity: f64) -> Vec<RoiProjection> {
    let current = performance_multiplier(overall);
    ROI_HORIZONS_DAYS
        .into_iter()
        .map(|days| {
            let projected_score = (overall + velocity * days as f64).clamp(0.0, MAX_SCORE);
            RoiProjection {
                days,
                projected_score,
                performance_improvement_percent: (performance_multiplier(projected_score) / current - 1.0) * 100.0,
            }
        })
        .collect()
}
