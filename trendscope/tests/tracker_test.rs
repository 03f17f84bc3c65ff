use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use trendscope::storage::SqliteBackend;
use trendscope::tracker::{
    Comparison, ComponentScores, ImprovementLevel, ImprovementTracker, MarketPosition, SnapshotScores,
    SnapshotStore, TrajectoryDirection,
};
use trendscope::PipelineError;

fn scores(topic: &str, overall: f64) -> SnapshotScores {
    SnapshotScores {
        topic: topic.to_string(),
        overall_score: Some(overall),
        component_scores: ComponentScores {
            experience: 7.0,
            expertise: 8.0,
            authoritativeness: 6.5,
            trustworthiness: 8.5,
        },
        human_elements_score: 6.0,
        content_quality_score: 7.5,
        human_inputs_quality: 5.0,
        recommendations: vec!["Add author bios".to_string(), "Cite primary sources".to_string()],
    }
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap() + Duration::days(n)
}

async fn sqlite_tracker(pool: SqlitePool) -> ImprovementTracker {
    let backend = SqliteBackend::new(pool).await.unwrap();
    let store = SnapshotStore::open(Arc::new(backend)).await.unwrap();
    ImprovementTracker::new(Arc::new(store))
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test pool");

    let tracker = sqlite_tracker(pool.clone()).await;
    let first = tracker.track_at(scores("rust", 5.0), day(0)).await.unwrap();
    let second = tracker
        .track_at(scores("rust", 6.5), day(3) + Duration::milliseconds(250))
        .await
        .unwrap();
    tracker.track_at(scores("go", 7.0), day(1)).await.unwrap();

    let reopened = sqlite_tracker(pool).await;
    let history = reopened.store().history("rust").await;
    assert_eq!(history, vec![first, second]);
    assert_eq!(history[1].recommendations().len(), 2);
    assert_eq!(reopened.store().topics().await, vec!["rust", "go"]);
}

#[tokio::test]
async fn test_improvement_boundaries() {
    let tracker = ImprovementTracker::new(Arc::new(SnapshotStore::in_memory()));

    tracker.track_at(scores("exact", 4.0), day(0)).await.unwrap();
    tracker.track_at(scores("exact", 6.0), day(2)).await.unwrap();
    let Comparison::Progress(report) = tracker.compare_latest("exact").await else {
        panic!("expected a progress report");
    };
    assert_eq!(report.improvement_level, ImprovementLevel::Excellent);
    assert!((report.velocity - 1.0).abs() < 1e-9);

    tracker.track_at(scores("short", 4.0), day(0)).await.unwrap();
    tracker.track_at(scores("short", 5.9), day(2)).await.unwrap();
    let Comparison::Progress(report) = tracker.compare_latest("short").await else {
        panic!("expected a progress report");
    };
    assert_eq!(report.improvement_level, ImprovementLevel::Good);
}

#[tokio::test]
async fn test_single_snapshot_is_baseline() {
    let tracker = ImprovementTracker::new(Arc::new(SnapshotStore::in_memory()));
    let only = tracker.track_at(scores("rust", 7.2), day(0)).await.unwrap();

    match tracker.compare_latest("rust").await {
        Comparison::Baseline(report) => {
            assert!((report.improvement_potential - 2.8).abs() < 1e-9);
            assert!((0.0..=10.0).contains(&report.improvement_potential));
            assert!(report.insights[0].starts_with("Strong baseline"));
        }
        other => panic!("expected baseline, got {:?}", other),
    }

    assert!(matches!(
        tracker.compare_with("rust", day(-5)).await,
        Comparison::NotFound { .. }
    ));
    assert!(matches!(tracker.compare_latest("unknown").await, Comparison::NotFound { .. }));
    // comparing with itself is a zero-delta progress report
    let Comparison::Progress(same) = tracker.compare_with("rust", only.timestamp()).await else {
        panic!("expected a progress report");
    };
    assert_eq!(same.velocity, 0.0);
    assert_eq!(same.improvement_level, ImprovementLevel::Minimal);
}

#[tokio::test]
async fn test_invalid_scores_are_rejected_before_storage() {
    let tracker = ImprovementTracker::new(Arc::new(SnapshotStore::in_memory()));
    let err = tracker.track_at(scores("rust", 11.0), day(0)).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvariantViolation(_)));
    assert!(tracker.store().is_empty().await);

    tracker.track_at(scores("rust", 5.0), day(5)).await.unwrap();
    let err = tracker.track_at(scores("rust", 6.0), day(4)).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvariantViolation(_)));
}

#[tokio::test]
async fn test_benchmark_and_trajectory() {
    let tracker = ImprovementTracker::new(Arc::new(SnapshotStore::in_memory()));
    tracker.track_at(scores("rust", 8.0), day(0)).await.unwrap();
    tracker.track_at(scores("rust", 9.2), day(12)).await.unwrap();

    let report = tracker.benchmark("rust").await.unwrap();
    assert_eq!(report.market_position, MarketPosition::IndustryLeader);
    assert!((report.velocity - 0.1).abs() < 1e-9);
    assert_eq!(report.roi.len(), 3);
    assert!(report.roi.iter().all(|r| r.projected_score <= 10.0));
    assert_eq!(report.roi[2].projected_score, 10.0);

    let trajectory = tracker.trajectory("rust").await;
    assert_eq!(trajectory.direction, TrajectoryDirection::Improving);
    assert_eq!(trajectory.snapshots, 2);
    assert_eq!(trajectory.best_overall, Some(9.2));

    let empty = tracker.trajectory("nothing").await;
    assert_eq!(empty.direction, TrajectoryDirection::InsufficientData);
}

#[tokio::test]
async fn test_file_backed_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("data").join("trendscope.db");
    let path = path.to_string_lossy().to_string();

    {
        let pool = common::init_db_pool(&path).await.unwrap();
        let tracker = sqlite_tracker(pool.clone()).await;
        tracker.track_at(scores("rust", 5.0), day(0)).await.unwrap();
        tracker.track_at(scores("rust", 5.5), day(7)).await.unwrap();
        pool.close().await;
    }

    let pool = common::init_db_pool(&path).await.unwrap();
    let tracker = sqlite_tracker(pool).await;
    let Comparison::Progress(report) = tracker.compare_latest("rust").await else {
        panic!("expected a progress report");
    };
    assert_eq!(report.days_between, 7);
    assert_eq!(report.improvement_level, ImprovementLevel::Moderate);
}
