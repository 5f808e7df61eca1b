//! End-to-end pipeline tests
//!
//! Jobs are submitted through the runner and awaited on their join handle,
//! then inspected through the registry.

mod helpers;

use fpx_an::models::{AnalyzeRequest, JobStatus};
use fpx_an::AnalysisError;
use fpx_common::events::FpxEvent;
use helpers::{fixture, FPS};
use serde_json::json;

async fn run_job(
    fx: &helpers::Fixture,
    project_id: i64,
    body: serde_json::Value,
) -> uuid::Uuid {
    let request: AnalyzeRequest = serde_json::from_value(body.clone()).unwrap();
    let (selection, params) = request.validate().unwrap();
    let (job, handle) = fx.state.runner.submit(project_id, selection, params, body).await;
    handle.await.unwrap();
    job.job_id
}

fn single_body(selection: serde_json::Value) -> serde_json::Value {
    json!({
        "selection": selection,
        "samplingRateHz": FPS,
        "mode": "single",
        "algorithm": "zscore",
        "events": ["reward"],
        "baselineWindow": {"start": -2.0, "end": 0.0},
        "responseWindow": {"start": 0.0, "end": 4.0},
        "columnMap": {"behavior": "Behavior", "start": "Start", "isPointEvent": true}
    })
}

#[tokio::test]
async fn test_single_event_reward_job_succeeds() {
    let fx = fixture().await;
    let (recording, annotation) = fx
        .add_session(1, "session1", &[("reward", 5.0), ("reward", 10.0), ("reward", 15.0)])
        .await;

    let job_id = run_job(&fx, 1, single_body(json!({"dataItemIds": [recording, annotation]}))).await;

    let job = fx.state.registry.get(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.progress, 100);
    assert!(job.error.is_none());

    let result = fx.state.registry.result(job_id).await.unwrap();
    assert_eq!(result.job_id, job_id);
    assert_eq!(result.meta.project_id, 1);
    assert_eq!(result.meta.mode, "single");
    assert_eq!(result.meta.dataset_count, 1);
    assert!(result.meta.tags_used.is_empty());

    assert_eq!(result.matrices.len(), 1);
    let matrix = &result.matrices[0];
    assert_eq!(matrix.key, "CH1/reward");
    assert_eq!(matrix.heatmap.len(), 3);
    assert_eq!(
        matrix.trial_ids,
        vec![
            format!("{}:trial_0_reward", recording),
            format!("{}:trial_1_reward", recording),
            format!("{}:trial_2_reward", recording),
        ]
    );
    assert!(matrix.heatmap.iter().all(|row| row.len() == matrix.x_axis.len()));

    let curve = &result.curves[0];
    assert_eq!(curve.key, "CH1/reward");
    assert_eq!(curve.mean.len(), curve.x_axis.len());
    assert_eq!(curve.sem.as_ref().map(Vec::len), Some(curve.x_axis.len()));

    // Result snapshot is on disk next to the status snapshot
    let location = job.result_location.expect("result location recorded");
    assert!(location.is_file());
    assert!(fx.layout.job_dir(1, &job_id).join("status.json").is_file());
}

#[tokio::test]
async fn test_multi_event_group_is_warped() {
    let fx = fixture().await;
    let (recording, annotation) = fx
        .add_session(
            1,
            "session1",
            &[("A", 2.0), ("B", 4.0), ("A", 6.0), ("B", 8.0), ("C", 10.0)],
        )
        .await;

    let body = json!({
        "selection": {"dataItemIds": [recording, annotation]},
        "samplingRateHz": FPS,
        "mode": "multi",
        "algorithm": "warping",
        "groups": [{"name": "AB", "events": ["A", "B"]}],
        "columnMap": {"behavior": "Behavior", "start": "Start"}
    });
    let job_id = run_job(&fx, 1, body).await;

    let result = fx.state.registry.result(job_id).await.unwrap();
    assert_eq!(result.meta.mode, "multi");
    let matrix = &result.matrices[0];
    assert_eq!(matrix.key, "CH1/AB");
    assert_eq!(matrix.trial_ids, vec![format!("{}:run_0", recording)]);
    // Three inter-event segments at the default length of 100
    assert_eq!(matrix.heatmap[0].len(), 300);
    assert_eq!(matrix.x_axis.first(), Some(&0.0));
    assert_eq!(matrix.x_axis.last(), Some(&1.0));
    assert_eq!(result.meta.analysis["warpSegmentLength"], 100);
}

#[tokio::test]
async fn test_group_without_runs_fails_job() {
    let fx = fixture().await;
    let (recording, annotation) = fx
        .add_session(1, "session1", &[("A", 2.0), ("C", 4.0), ("B", 6.0)])
        .await;
    let mut events = fx.state.event_bus.subscribe();

    let body = json!({
        "selection": {"dataItemIds": [recording, annotation]},
        "samplingRateHz": FPS,
        "mode": "multi",
        "groups": [{"name": "AB", "events": ["A", "B"]}],
        "columnMap": {"behavior": "Behavior", "start": "Start"}
    });
    let job_id = run_job(&fx, 1, body).await;

    let job = fx.state.registry.get(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 50);
    assert!(job.error.as_deref().unwrap_or("").contains("No valid trials"));

    match fx.state.registry.result(job_id).await {
        Err(AnalysisError::ResultNotReady { status, .. }) => assert_eq!(status, "failed"),
        other => panic!("expected ResultNotReady, got {:?}", other.map(|_| ())),
    }

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    match last {
        Some(FpxEvent::JobFailed { job_id: id, progress, .. }) => {
            assert_eq!(id, job_id);
            assert_eq!(progress, 50);
        }
        other => panic!("expected JobFailed last, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tag_selection_and_or() {
    let fx = fixture().await;
    let (rec_a, ann_a) = fx.add_session(1, "a", &[("reward", 5.0)]).await;
    let (rec_b, ann_b) = fx.add_session(1, "b", &[("reward", 6.0)]).await;
    let (rec_c, ann_c) = fx.add_session(1, "c", &[("reward", 7.0)]).await;

    let cohort = fx.catalog.create_tag(1, "cohort1").await.unwrap();
    let day1 = fx.catalog.create_tag(1, "day1").await.unwrap();
    let day2 = fx.catalog.create_tag(1, "day2").await.unwrap();
    for id in [rec_a, ann_a, rec_b, ann_b] {
        fx.catalog.tag_data_item(id, cohort).await.unwrap();
    }
    for id in [rec_a, ann_a] {
        fx.catalog.tag_data_item(id, day1).await.unwrap();
    }
    for id in [rec_b, ann_b, rec_c, ann_c] {
        fx.catalog.tag_data_item(id, day2).await.unwrap();
    }

    // cohort1 AND (day1 OR day2) → sessions a and b
    let body = single_body(json!({"tagFilter": {"and": [cohort], "or": [day1, day2]}}));
    let job_id = run_job(&fx, 1, body).await;
    let result = fx.state.registry.result(job_id).await.unwrap();
    assert_eq!(result.meta.dataset_count, 2);
    let mut tags = vec![cohort, day1, day2];
    tags.sort_unstable();
    assert_eq!(result.meta.tags_used, tags);

    let matrix = &result.matrices[0];
    assert_eq!(matrix.heatmap.len(), 2);
    assert!(matrix.trial_ids[0].starts_with(&format!("{}:", rec_a)));
    assert!(matrix.trial_ids[1].starts_with(&format!("{}:", rec_b)));
}

#[tokio::test]
async fn test_foreign_tag_selects_nothing() {
    let fx = fixture().await;
    fx.add_session(1, "a", &[("reward", 5.0)]).await;
    let foreign = fx.catalog.create_tag(2, "other-project").await.unwrap();

    let job_id = run_job(&fx, 1, single_body(json!({"tagFilter": {"or": [foreign]}}))).await;

    let job = fx.state.registry.get(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 5);
    assert!(job.error.unwrap().contains("no data items matched"));
}

#[tokio::test]
async fn test_unparseable_recording_is_skipped() {
    let fx = fixture().await;
    let (good, good_ann) = fx.add_session(1, "good", &[("reward", 5.0)]).await;
    let bad = fx
        .add_file(1, "bad/photometry.csv", "Time,CH1-410\n0.0,1.0\n")
        .await;

    let job_id = run_job(&fx, 1, single_body(json!({"dataItemIds": [good, good_ann, bad]}))).await;

    let result = fx.state.registry.result(job_id).await.unwrap();
    assert_eq!(result.meta.dataset_count, 1);
    assert_eq!(result.matrices[0].heatmap.len(), 1);
}

#[tokio::test]
async fn test_bad_annotation_file_drops_only_its_events() {
    let fx = fixture().await;
    let (recording, good_ann) = fx
        .add_session(1, "s", &[("reward", 5.0), ("reward", 10.0)])
        .await;
    // "labels" marks it as an annotation; it has no Behavior column
    let bad_ann = fx.add_file(1, "s/labels.csv", "Label,Start\nreward,12.0\n").await;

    let job_id = run_job(
        &fx,
        1,
        single_body(json!({"dataItemIds": [recording, good_ann, bad_ann]})),
    )
    .await;

    let job = fx.state.registry.get(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);

    let result = fx.state.registry.result(job_id).await.unwrap();
    assert_eq!(result.meta.dataset_count, 1);
    assert_eq!(result.matrices[0].heatmap.len(), 2);
    assert_eq!(
        result.matrices[0].trial_ids,
        vec![
            format!("{}:trial_0_reward", recording),
            format!("{}:trial_1_reward", recording),
        ]
    );
}

#[tokio::test]
async fn test_masks_remove_samples_before_windowing() {
    let fx = fixture().await;
    let (recording, annotation) = fx.add_session(1, "s", &[("reward", 15.0)]).await;

    // Dropping the first 10 s shortens the recording to 10 s, so an event at
    // 15 s now runs past the end and yields no trial.
    let mut body = single_body(json!({"dataItemIds": [recording, annotation]}));
    body["masks"] = json!({ recording.to_string(): [{"start": 0.0, "end": 10.0}] });
    let job_id = run_job(&fx, 1, body).await;

    let job = fx.state.registry.get(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("No valid trials"));
}
