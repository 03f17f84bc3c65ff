use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Window of search-interest history requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    LastHour,
    Last4Hours,
    LastDay,
    Last7Days,
    Last30Days,
    Last90Days,
    LastYear,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::LastHour,
        Timeframe::Last4Hours,
        Timeframe::LastDay,
        Timeframe::Last7Days,
        Timeframe::Last30Days,
        Timeframe::Last90Days,
        Timeframe::LastYear,
    ];

    /// Code understood by the search-interest service.
    pub fn as_query(&self) -> &'static str {
        match self {
            Timeframe::LastHour => "now 1-H",
            Timeframe::Last4Hours => "now 4-H",
            Timeframe::LastDay => "now 1-d",
            Timeframe::Last7Days => "now 7-d",
            Timeframe::Last30Days => "today 1-m",
            Timeframe::Last90Days => "today 3-m",
            Timeframe::LastYear => "today 12-m",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Timeframe::LastHour => "last_hour",
            Timeframe::Last4Hours => "last_4_hours",
            Timeframe::LastDay => "last_day",
            Timeframe::Last7Days => "last_7_days",
            Timeframe::Last30Days => "last_30_days",
            Timeframe::Last90Days => "last_90_days",
            Timeframe::LastYear => "last_year",
        }
    }

    /// Only windows of a year carry enough history to talk about seasons.
    pub fn supports_seasonality(&self) -> bool {
        matches!(self, Timeframe::LastYear)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Timeframe::ALL
            .into_iter()
            .find(|t| t.name() == needle || t.as_query().to_lowercase() == needle)
            .ok_or_else(|| format!("unknown timeframe: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
    Unknown,
}

/// Second-half mean must move more than this fraction away from the first-half mean.
const DIRECTION_TOLERANCE: f64 = 0.10;
/// A month counts as a seasonal peak when its mean is this far above the overall mean.
const SEASONAL_PEAK_RATIO: f64 = 1.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Interest history for one keyword over one timeframe.
///
/// `direction` is computed from `interest_over_time` at construction and cannot
/// be set from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    keyword: String,
    timeframe: Timeframe,
    interest_over_time: Vec<InterestPoint>,
    interest_by_region: BTreeMap<String, f64>,
    direction: TrendDirection,
}

impl TrendSeries {
    pub fn new(
        keyword: impl Into<String>,
        timeframe: Timeframe,
        mut interest_over_time: Vec<InterestPoint>,
        interest_by_region: BTreeMap<String, f64>,
    ) -> Self {
        interest_over_time.sort_by_key(|p| p.timestamp);
        let values: Vec<f64> = interest_over_time.iter().map(|p| p.value).collect();
        let direction = classify_direction(&values);
        Self {
            keyword: keyword.into(),
            timeframe,
            interest_over_time,
            interest_by_region,
            direction,
        }
    }

    /// The value substituted when the service had nothing for this keyword.
    pub fn empty(keyword: impl Into<String>, timeframe: Timeframe) -> Self {
        Self::new(keyword, timeframe, Vec::new(), BTreeMap::new())
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn interest_over_time(&self) -> &[InterestPoint] {
        &self.interest_over_time
    }

    pub fn interest_by_region(&self) -> &BTreeMap<String, f64> {
        &self.interest_by_region
    }

    pub fn direction(&self) -> TrendDirection {
        self.direction
    }

    pub fn is_empty(&self) -> bool {
        self.interest_over_time.is_empty()
    }

    pub fn momentum(&self) -> f64 {
        let values: Vec<f64> = self.interest_over_time.iter().map(|p| p.value).collect();
        momentum(&values)
    }

    /// Month (1-12) whose mean interest stands clearly above the overall mean, if any.
    pub fn seasonal_peak_month(&self) -> Option<u32> {
        if self.interest_over_time.is_empty() {
            return None;
        }
        let overall = mean(self.interest_over_time.iter().map(|p| p.value))?;
        if overall <= 0.0 {
            return None;
        }

        let mut by_month: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for point in &self.interest_over_time {
            let entry = by_month.entry(point.timestamp.month()).or_insert((0.0, 0));
            entry.0 += point.value;
            entry.1 += 1;
        }
        if by_month.len() < 2 {
            return None;
        }

        // Earliest month wins ties.
        let (month, peak) = by_month
            .iter()
            .map(|(m, (sum, n))| (*m, sum / *n as f64))
            .fold(None::<(u32, f64)>, |best, (m, avg)| match best {
                Some((_, best_avg)) if best_avg >= avg => best,
                _ => Some((m, avg)),
            })?;

        (peak >= overall * SEASONAL_PEAK_RATIO).then_some(month)
    }

    /// Regions sorted by interest, highest first.
    pub fn top_regions(&self, n: usize) -> Vec<(String, f64)> {
        let mut regions: Vec<(String, f64)> = self
            .interest_by_region
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        regions.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        regions.truncate(n);
        regions
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn halves(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let mid = values.len() / 2;
    let first = mean(values[..mid].iter().copied())?;
    let second = mean(values[mid..].iter().copied())?;
    Some((first, second))
}

/// First-half mean against second-half mean.
pub fn classify_direction(values: &[f64]) -> TrendDirection {
    let Some((first, second)) = halves(values) else {
        return TrendDirection::Unknown;
    };
    if first <= 0.0 {
        return if second > 0.0 {
            TrendDirection::Rising
        } else {
            TrendDirection::Stable
        };
    }
    if second > first * (1.0 + DIRECTION_TOLERANCE) {
        TrendDirection::Rising
    } else if second < first * (1.0 - DIRECTION_TOLERANCE) {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    }
}

/// Percentage change from the first-half mean to the second-half mean.
pub fn momentum(values: &[f64]) -> f64 {
    match halves(values) {
        None => 0.0,
        Some((first, second)) if first <= 0.0 => {
            if second > 0.0 {
                100.0
            } else {
                0.0
            }
        }
        Some((first, second)) => (second - first) / first * 100.0,
    }
}

/// Momentum across every series of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendMomentum {
    pub dominant_direction: TrendDirection,
    pub average_momentum: f64,
    pub rising_keywords: Vec<String>,
    pub falling_keywords: Vec<String>,
}

impl TrendMomentum {
    pub fn from_series(series: &[TrendSeries]) -> Self {
        let known: Vec<&TrendSeries> = series
            .iter()
            .filter(|s| s.direction() != TrendDirection::Unknown)
            .collect();

        let count = |d: TrendDirection| known.iter().filter(|s| s.direction() == d).count();
        let (rising, falling, stable) = (
            count(TrendDirection::Rising),
            count(TrendDirection::Falling),
            count(TrendDirection::Stable),
        );

        let dominant_direction = if known.is_empty() {
            TrendDirection::Unknown
        } else if rising > falling && rising > stable {
            TrendDirection::Rising
        } else if falling > rising && falling > stable {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        };

        let average_momentum = mean(known.iter().map(|s| s.momentum())).unwrap_or(0.0);

        let keywords_with = |d: TrendDirection| {
            let mut out: Vec<String> = Vec::new();
            for s in known.iter().filter(|s| s.direction() == d) {
                if !out.iter().any(|k| k == s.keyword()) {
                    out.push(s.keyword().to_string());
                }
            }
            out
        };

        Self {
            dominant_direction,
            average_momentum,
            rising_keywords: keywords_with(TrendDirection::Rising),
            falling_keywords: keywords_with(TrendDirection::Falling),
        }
    }
}
