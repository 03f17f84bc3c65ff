use serde::Serialize;
use std::fmt;

use crate::gaps::{Gap, GapFocus, GapPartition, GapPriority};
use crate::trend::{TrendDirection, TrendMomentum};

/// Phase 1 takes this many high-priority gaps when nothing else is configured.
pub const DEFAULT_PHASE_ONE_HIGH_LIMIT: usize = 3;
const QUICK_WIN_STRATEGY_THRESHOLD: usize = 5;

pub const CRITICAL_SUCCESS_FACTORS: [&str; 4] = [
    "Consistent content quality",
    "Strategic keyword targeting",
    "Authority signal building",
    "User experience optimization",
];

/// Share of effort per work stream, in percent. Sums to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceRequirements {
    pub content_creation: u8,
    pub technical_seo: u8,
    pub promotion_outreach: u8,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            content_creation: 60,
            technical_seo: 20,
            promotion_outreach: 20,
        }
    }
}

/// A checkpoint inside a phase; `day` counts from the start of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub day: u32,
    pub checkpoint: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedStrategy {
    CapitalizeOnMomentum,
    QuickWinsFirst,
    AuthorityBuilding,
    BalancedApproach,
}

impl fmt::Display for RecommendedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecommendedStrategy::CapitalizeOnMomentum => "capitalize_on_momentum",
            RecommendedStrategy::QuickWinsFirst => "quick_wins_first",
            RecommendedStrategy::AuthorityBuilding => "authority_building",
            RecommendedStrategy::BalancedApproach => "balanced_approach",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadmapPhase {
    pub name: &'static str,
    pub focus: &'static str,
    /// Days from the start of the plan, `[start, end)`.
    pub start_day: u32,
    pub end_day: u32,
    pub gaps: Vec<Gap>,
    pub success_metrics: Vec<&'static str>,
    pub milestones: Vec<Milestone>,
}

impl RoadmapPhase {
    fn foundation(gaps: Vec<Gap>) -> Self {
        Self {
            name: "foundation",
            focus: "Urgent trends and quick wins",
            start_day: 0,
            end_day: 30,
            gaps,
            success_metrics: vec![
                "Urgent trend content published",
                "Authority signals claimed",
                "Baseline keyword tracking in place",
            ],
            milestones: milestones(0, 30, "Baseline snapshot tracked"),
        }
    }

    fn growth(gaps: Vec<Gap>) -> Self {
        Self {
            name: "growth",
            focus: "Content coverage",
            start_day: 30,
            end_day: 90,
            gaps,
            success_metrics: vec![
                "Related entity coverage published",
                "Internal linking established",
                "Rankings improvement",
            ],
            milestones: milestones(30, 90, "Content coverage compared against baseline"),
        }
    }

    fn authority(gaps: Vec<Gap>) -> Self {
        Self {
            name: "authority",
            focus: "Authority and ecosystem",
            start_day: 90,
            end_day: 180,
            gaps,
            success_metrics: vec!["Industry recognition", "Backlink growth", "Thought leadership"],
            milestones: milestones(90, 180, "Benchmark against industry tiers"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// A midpoint review and a closing checkpoint for the phase `[start, end)`.
fn milestones(start: u32, end: u32, closing: &'static str) -> Vec<Milestone> {
    vec![
        Milestone {
            day: start + (end - start) / 2,
            checkpoint: "Mid-phase progress review",
        },
        Milestone { day: end, checkpoint: closing },
    ]
}

/// A static three-phase plan. Every input gap lands in exactly one phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyPlan {
    pub phases: [RoadmapPhase; 3],
    pub recommended_strategy: RecommendedStrategy,
    pub quick_win_count: usize,
    pub strategic_count: usize,
    pub momentum: TrendMomentum,
    pub critical_success_factors: Vec<&'static str>,
    pub resource_requirements: ResourceRequirements,
}

impl StrategyPlan {
    pub fn gap_count(&self) -> usize {
        self.phases.iter().map(|p| p.gaps.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct OpportunitySynthesizer {
    phase_one_high_limit: usize,
}

impl Default for OpportunitySynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE_ONE_HIGH_LIMIT)
    }
}

impl OpportunitySynthesizer {
    pub fn new(phase_one_high_limit: usize) -> Self {
        Self { phase_one_high_limit }
    }

    /// Bucket priority-sorted gaps into phases.
    ///
    /// Phase 1 takes every urgent gap and the first `phase_one_high_limit` high
    /// gaps. Of what is left, content work goes to phase 2 and authority or
    /// ecosystem work to phase 3. Order inside a phase follows the input.
    pub fn synthesize(&self, sorted_gaps: &[Gap], partition: &GapPartition, momentum: TrendMomentum) -> StrategyPlan {
        let mut phase_one = Vec::new();
        let mut phase_two = Vec::new();
        let mut phase_three = Vec::new();
        let mut high_taken = 0;

        for gap in sorted_gaps {
            let early = match gap.priority {
                GapPriority::Urgent => true,
                GapPriority::High if high_taken < self.phase_one_high_limit => {
                    high_taken += 1;
                    true
                }
                _ => false,
            };
            if early {
                phase_one.push(gap.clone());
            } else if gap.focus == GapFocus::Content {
                phase_two.push(gap.clone());
            } else {
                phase_three.push(gap.clone());
            }
        }

        let recommended_strategy = recommend(&phase_one, &phase_two, &phase_three, partition, &momentum);

        StrategyPlan {
            phases: [
                RoadmapPhase::foundation(phase_one),
                RoadmapPhase::growth(phase_two),
                RoadmapPhase::authority(phase_three),
            ],
            recommended_strategy,
            quick_win_count: partition.quick_wins.len(),
            strategic_count: partition.strategic.len(),
            momentum,
            critical_success_factors: CRITICAL_SUCCESS_FACTORS.to_vec(),
            resource_requirements: ResourceRequirements::default(),
        }
    }
}

fn recommend(
    phase_one: &[Gap],
    phase_two: &[Gap],
    phase_three: &[Gap],
    partition: &GapPartition,
    momentum: &TrendMomentum,
) -> RecommendedStrategy {
    let has_urgent = phase_one.iter().any(|g| g.priority == GapPriority::Urgent);
    if momentum.dominant_direction == TrendDirection::Rising && has_urgent {
        RecommendedStrategy::CapitalizeOnMomentum
    } else if partition.quick_wins.len() >= QUICK_WIN_STRATEGY_THRESHOLD {
        RecommendedStrategy::QuickWinsFirst
    } else if !phase_three.is_empty() && phase_three.len() > phase_one.len() && phase_three.len() > phase_two.len() {
        RecommendedStrategy::AuthorityBuilding
    } else {
        RecommendedStrategy::BalancedApproach
    }
}
