mod common;

use common::{history, instance, instance_test, run, FakeResultsApi};
use rundiff::domain::models::{RunPage, TestStatus};
use rundiff::{Bucket, Comparison, Config, DiffError};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const SPEC: &str = "cypress/e2e/checkout.cy.ts";

fn runs() -> FakeResultsApi {
    FakeResultsApi::new()
        .with_run(
            run("run-1", Some("Earlier Author")),
            vec![(
                "run-1-i1".to_string(),
                instance(
                    SPEC,
                    vec![
                        instance_test("pay", TestStatus::Failed),
                        instance_test("cart", TestStatus::Passed),
                    ],
                ),
            )],
        )
        .with_run(
            run("run-2", Some("Dana Reyes")),
            vec![(
                "run-2-i1".to_string(),
                instance(
                    SPEC,
                    vec![
                        instance_test("pay", TestStatus::Passed),
                        instance_test("cart", TestStatus::Failed),
                        instance_test("coupon", TestStatus::Passed),
                    ],
                ),
            )],
        )
        .with_history(SPEC, "cart", history(&[TestStatus::Passed]))
}

#[tokio::test]
async fn test_explicit_previous_run() {
    common::setup_test_logging();

    let api = Arc::new(runs());
    let comparison = Comparison::new(api.clone(), &Config::default());

    let report = comparison.run("run-2", Some("run-1")).await.unwrap();

    assert_eq!(report.context.current_run_id(), "run-2");
    assert_eq!(report.context.previous_run_id, "run-1");
    assert_eq!(report.diff.locate("pay"), Some(Bucket::Resolved));
    assert_eq!(report.diff.locate("cart"), Some(Bucket::NewFailures));
    assert_eq!(report.diff.locate("coupon"), Some(Bucket::NewTests));

    let cart = &report.diff.new_failures()[0];
    assert_eq!(cart.author.as_deref(), Some("Dana Reyes"));
    assert_eq!(cart.consecutive_failures, Some(1));

    // Explicit id means no run listing
    assert_eq!(api.run_list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.instance_calls.load(Ordering::SeqCst), 2);

    let requests = api.signature_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].project_id, "test-project");
    assert_eq!(requests[0].spec_file_path, SPEC);
    assert_eq!(requests[0].test_title, "cart");
}

#[tokio::test]
async fn test_located_previous_run() {
    // Listing entries carry no spec instances; details come from the run endpoint
    let api = Arc::new(runs().with_run_pages(vec![RunPage {
        data: vec![run("run-2", None), run("run-1", None)],
        has_more: false,
        ..RunPage::default()
    }]));
    let comparison = Comparison::new(api.clone(), &Config::default());

    let report = comparison.run("run-2", None).await.unwrap();

    assert_eq!(report.context.previous_run_id, "run-1");
    assert_eq!(report.diff.locate("pay"), Some(Bucket::Resolved));
    assert_eq!(report.diff.locate("cart"), Some(Bucket::NewFailures));
    assert_eq!(report.diff.locate("coupon"), Some(Bucket::NewTests));
    assert_eq!(api.run_list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.instance_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_located_previous_run_unavailable_is_fatal() {
    let api = Arc::new(runs().with_run_pages(vec![RunPage {
        data: vec![run("run-2", None), run("run-0", None)],
        has_more: false,
        ..RunPage::default()
    }]));
    let comparison = Comparison::new(api, &Config::default());

    let err = comparison.run("run-2", None).await.unwrap_err();

    assert!(matches!(err, DiffError::SnapshotUnavailable { ref run_id, .. } if run_id == "run-0"));
}

#[tokio::test]
async fn test_missing_current_run_is_fatal() {
    let api = Arc::new(runs());
    let comparison = Comparison::new(api.clone(), &Config::default());

    let err = comparison.run("run-404", Some("run-1")).await.unwrap_err();

    assert!(matches!(err, DiffError::SnapshotUnavailable { ref run_id, .. } if run_id == "run-404"));
    assert!(err.is_fatal());
    assert_eq!(api.instance_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_explicit_previous_run_is_fatal() {
    let api = Arc::new(runs());
    let comparison = Comparison::new(api, &Config::default());

    let err = comparison.run("run-2", Some("run-0")).await.unwrap_err();

    assert!(matches!(err, DiffError::SnapshotUnavailable { ref run_id, .. } if run_id == "run-0"));
}

#[tokio::test]
async fn test_previous_run_not_found() {
    let api = Arc::new(runs().with_run_pages(vec![RunPage {
        data: vec![run("run-2", None)],
        has_more: false,
        ..RunPage::default()
    }]));
    let comparison = Comparison::new(api, &Config::default());

    let err = comparison.run("run-2", None).await.unwrap_err();

    assert!(matches!(err, DiffError::PreviousRunNotFound(ref id) if id == "run-2"));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_report_serializes_bucket_names() {
    let api = Arc::new(runs());
    let comparison = Comparison::new(api, &Config::default());

    let report = comparison.run("run-2", Some("run-1")).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["context"]["previousRunId"], "run-1");
    assert_eq!(json["diff"]["Resolved"][0]["testId"], "pay");
    assert_eq!(json["diff"]["New Failures"][0]["testId"], "cart");
    assert_eq!(json["diff"]["New Tests"][0]["testId"], "coupon");
    assert!(json["diff"]["Still Failing"].as_array().unwrap().is_empty());
}
