use chrono::{TimeZone, Utc};
use rundiff::domain::models::{
    Config, HistoryConfig, HistoryQuery, RunQuery, SignatureRequest, TestStatus,
};
use rundiff::{CurrentsClient, CurrentsClientConfig, HistoryFetcher, Requester, ResultsApi};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> CurrentsClient {
    let mut config = Config::default();
    config.api.base_url = format!("{}/", server.uri());
    config.api.api_key = "test-key-123456".to_string();
    config.api.project_id = "proj-1".to_string();
    config.retry.max_attempts = 2;
    config.retry.backoff_unit_ms = 5;
    config.rate_limit.requests_per_second = 1000.0;

    let requester = Requester::from_config(&config.retry, &config.rate_limit);
    CurrentsClient::new(CurrentsClientConfig::from(&config), requester).unwrap()
}

fn history_record(status: &str, sha: &str, created_at: &str) -> serde_json::Value {
    json!({
        "status": status,
        "createdAt": created_at,
        "commit": {"sha": sha, "authorName": "Dana", "branch": "main"},
        "tags": ["merge"],
        "groupId": "chrome"
    })
}

#[tokio::test]
async fn test_get_run_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/runs/run-1"))
        .and(header("authorization", "Bearer test-key-123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "runId": "run-1",
                "createdAt": "2024-03-10T12:00:00.000Z",
                "tags": ["merge"],
                "meta": {"commit": {"sha": "abc", "authorName": "Dana", "branch": "main"}},
                "specs": [{"instanceId": "i-1"}, {"instanceId": null}, {"instanceId": "i-2"}]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let run = client(&server).get_run("run-1").await.unwrap();

    assert_eq!(run.run_id, "run-1");
    assert_eq!(run.author(), Some("Dana"));
    assert_eq!(run.instance_ids(), vec!["i-1", "i-2"]);
}

#[tokio::test]
async fn test_get_instance_decodes_tests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/instances/i-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "groupId": "chrome",
                "spec": "cypress/e2e/login.cy.ts",
                "results": {
                    "tests": [
                        {"title": ["Login", "works"], "testId": "t-1", "state": "passed", "attempts": 1},
                        {"title": "broken", "testId": "t-2", "state": "failed", "attempts": [{}, {}]},
                        {"title": "pending", "testId": "t-3", "state": null}
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let instance = client(&server).get_instance("i-1").await.unwrap();
    let tests = instance.tests();

    assert_eq!(tests.len(), 3);
    assert_eq!(tests[0].state, TestStatus::Passed);
    assert_eq!(tests[1].attempts, 2);
    assert_eq!(tests[2].state, TestStatus::Other);
}

#[tokio::test]
async fn test_list_project_runs_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/projects/proj-1/runs"))
        .and(query_param("limit", "50"))
        .and(query_param("tags[]", "merge"))
        .and(query_param("ending_after", "cursor-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"runId": "run-8", "cursor": "cursor-8"}],
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = RunQuery {
        limit: 50,
        tags: vec!["merge".to_string()],
        branches: vec!["main".to_string()],
        ending_after: Some("cursor-9".to_string()),
    };
    let page = client(&server).list_project_runs(&query).await.unwrap();

    assert!(page.has_more);
    assert_eq!(page.data[0].run_id, "run-8");
    assert_eq!(page.data[0].cursor.as_deref(), Some("cursor-8"));
}

#[tokio::test]
async fn test_resolve_signature() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/signature/test"))
        .and(body_json(json!({
            "projectId": "proj-1",
            "specFilePath": "cypress/e2e/login.cy.ts",
            "testTitle": "Login > works"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"signature": "sig-1"}})),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/signature/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let client = client(&server);
    let request = SignatureRequest {
        project_id: client.project_id().to_string(),
        spec_file_path: "cypress/e2e/login.cy.ts".to_string(),
        test_title: "Login > works".to_string(),
    };
    assert_eq!(
        client.resolve_signature(&request).await.unwrap().as_deref(),
        Some("sig-1")
    );

    let unknown = SignatureRequest {
        test_title: "unknown".to_string(),
        ..request
    };
    assert_eq!(client.resolve_signature(&unknown).await.unwrap(), None);
}

#[tokio::test]
async fn test_history_query_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/test-results/sig-1"))
        .and(query_param("date_start", "2024-03-05T12:00:00.000Z"))
        .and(query_param("date_end", "2024-03-10T12:00:00.000Z"))
        .and(query_param_is_missing("starting_after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [history_record("failed", "c1", "2024-03-10T10:00:00.000Z")],
            "meta": {"next_cursor": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let end = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let query = HistoryQuery {
        date_start: end - chrono::Duration::days(5),
        date_end: end,
        starting_after: None,
    };
    let page = client(&server).get_test_results("sig-1", &query).await.unwrap();

    assert_eq!(page.data.len(), 1);
    assert!(page.meta.next_cursor.is_none());
}

#[tokio::test]
async fn test_history_fetcher_follows_cursors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/signature/test"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"signature": "sig-1"}})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/test-results/sig-1"))
        .and(query_param_is_missing("starting_after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [history_record("failed", "c3", "2024-03-10T10:00:00.000Z")],
            "meta": {"next_cursor": "page-2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/test-results/sig-1"))
        .and(query_param("starting_after", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [history_record("failed", "c2", "2024-03-10T08:00:00.000Z")],
            "meta": {"next_cursor": "page-3"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/test-results/sig-1"))
        .and(query_param("starting_after", "page-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [history_record("passed", "c1", "2024-03-10T06:00:00.000Z")],
            "meta": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HistoryFetcher::new(Arc::new(client(&server)), &HistoryConfig::default());
    let history = fetcher
        .fetch(
            "cypress/e2e/login.cy.ts",
            "Login > works",
            Some("2024-03-10T12:00:00.000Z"),
            Some("chrome"),
        )
        .await
        .unwrap();

    assert_eq!(history.records.len(), 3);
    assert_eq!(history.consecutive_failures, 2);
    assert_eq!(history.last_pass_commit_sha.as_deref(), Some("c1"));
    assert_eq!(history.first_failure_commit_sha.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_malformed_payload() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server).get_run("run-1").await.unwrap_err();
    assert!(matches!(err, rundiff::ApiError::Decode(_)));
}
