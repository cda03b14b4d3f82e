//! End-to-end tests through the HTTP API against tempfile-backed logs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tracescope::handlers::trace_api::TraceState;
use tracescope::query::TraceQuery;
use tracescope::server::create_router;

fn write_log(lines: &[&str]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    (dir, path)
}

fn app_for(path: &Path) -> Router {
    create_router(TraceState {
        query: Arc::new(TraceQuery::new(path)),
    })
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn test_tree_endpoint_builds_forest() {
    let (_dir, path) = write_log(&[
        r#"{"timestamp":"2024-01-01T00:00:00","level":"INFO","function":"outer","data":{"call_id":"a","event":"start"}}"#,
        r#"{"timestamp":"2024-01-01T00:00:01","level":"INFO","data":{"call_id":"b","parent_id":"a","event":"start"}}"#,
        r#"{"timestamp":"2024-01-01T00:00:02","level":"INFO","data":{"call_id":"b","event":"end"}}"#,
        r#"{"timestamp":"2024-01-01T00:00:03","level":"INFO","data":{"call_id":"a","event":"end","status":"success"}}"#,
    ]);
    let app = app_for(&path);

    let (status, body) = get_json(&app, "/api/tree").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_nodes"], 2);
    assert!(body["generated_at"].as_f64().unwrap() > 0.0);
    assert_eq!(body["log_file"].as_str().unwrap(), path.to_str().unwrap());

    let roots = body["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["call_id"], "a");
    assert_eq!(roots[0]["function"], "outer");
    assert_eq!(roots[0]["status"], "success");
    let children = roots[0]["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["call_id"], "b");
    assert_eq!(children[0]["status"], "success");
}

#[tokio::test]
async fn test_tree_endpoint_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(&dir.path().join("absent.log"));

    let (status, body) = get_json(&app, "/api/tree").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_nodes"], 0);
    assert!(body["roots"].as_array().unwrap().is_empty());
    assert!(body["metrics"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_logs_endpoint_window_and_rows() {
    let lines: Vec<String> = (0..5)
        .map(|n| {
            format!(
                r#"{{"timestamp":"2024-01-01T00:00:0{n}","level":"INFO","message":"m{n}","data":{{"call_id":"c{n}","event":"start"}}}}"#
            )
        })
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let (_dir, path) = write_log(&refs);
    let app = app_for(&path);

    let (status, body) = get_json(&app, "/api/logs?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_entries"], 5);

    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["id"], 3);
    assert_eq!(logs[1]["id"], 4);
    assert_eq!(logs[1]["message"], "m4");
    assert_eq!(logs[1]["call_id"], "c4");
    assert_eq!(logs[1]["linked_to_trace"], true);
    assert_eq!(logs[1]["is_trace_event"], true);
    assert_eq!(logs[1]["payload_truncated"], false);
}

#[tokio::test]
async fn test_log_payload_roundtrip_and_not_found() {
    let big = "y".repeat(400);
    let line = format!(
        r#"{{"timestamp":"t","level":"INFO","data":{{"call_id":"a","event":"start","blob":"{big}"}}}}"#
    );
    let (_dir, path) = write_log(&[&line]);
    let app = app_for(&path);

    let (status, body) = get_json(&app, "/api/logs?preview=100").await;
    assert_eq!(status, StatusCode::OK);
    let row = &body["logs"][0];
    assert_eq!(row["payload_truncated"], true);
    let reported_size = row["payload_size"].as_u64().unwrap();

    let (status, body) = get_json(&app, "/api/logs/0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 0);
    assert!(body["payload_json"].as_str().unwrap().contains(&big));
    assert!(body["payload_size"].as_u64().unwrap() >= reported_size);
    assert_eq!(body["payload"]["call_id"], "a");
    assert_eq!(body["entry"]["level"], "INFO");

    let (status, body) = get_json(&app, "/api/logs/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}

#[tokio::test]
async fn test_entries_endpoint_returns_raw_records() {
    let (_dir, path) = write_log(&[
        r#"{"timestamp":"t1","level":"INFO","message":"first"}"#,
        "not json",
        r#"{"timestamp":"t2","level":"WARN","message":"second"}"#,
    ]);
    let app = app_for(&path);

    let (status, body) = get_json(&app, "/api/entries").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["message"], "first");
    assert_eq!(entries[1]["level"], "WARN");
}

#[tokio::test]
async fn test_growth_between_requests_is_visible() {
    let (_dir, path) = write_log(&[
        r#"{"timestamp":"t1","level":"INFO","data":{"call_id":"a","event":"start"}}"#,
    ]);
    let app = app_for(&path);

    let (_, body) = get_json(&app, "/api/tree").await;
    assert_eq!(body["total_nodes"], 1);
    assert_eq!(body["roots"][0]["status"], "running");

    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(
        file,
        r#"{{"timestamp":"t2","level":"INFO","data":{{"call_id":"a","event":"end"}}}}"#
    )
    .unwrap();

    let (_, body) = get_json(&app, "/api/tree").await;
    assert_eq!(body["total_nodes"], 1);
    assert_eq!(body["roots"][0]["status"], "success");
}

#[tokio::test]
async fn test_rotation_between_requests_resets_view() {
    let (_dir, path) = write_log(&[
        r#"{"timestamp":"t1","level":"INFO","data":{"call_id":"a","event":"start"}}"#,
        r#"{"timestamp":"t2","level":"INFO","data":{"call_id":"b","event":"start"}}"#,
    ]);
    let app = app_for(&path);

    let (_, body) = get_json(&app, "/api/tree").await;
    assert_eq!(body["total_nodes"], 2);

    std::fs::remove_file(&path).unwrap();
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"{{"timestamp":"t3","level":"INFO","data":{{"call_id":"z","event":"start"}}}}"#
    )
    .unwrap();

    let (_, body) = get_json(&app, "/api/tree").await;
    assert_eq!(body["total_nodes"], 1);
    assert_eq!(body["roots"][0]["call_id"], "z");
}

#[tokio::test]
async fn test_metrics_summary_split_from_tree() {
    let (_dir, path) = write_log(&[
        r#"{"timestamp":"2024-01-01T00:00:00","level":"INFO","data":{"call_id":"a","event":"start"}}"#,
        r#"{"timestamp":"2024-01-01T00:00:01","level":"INFO","data":{"event":"metrics_summary","metrics":[{"function":"f","count":2,"total":0.5,"average":0.25}],"total_functions":1,"total_calls":2}}"#,
    ]);
    let app = app_for(&path);

    let (_, body) = get_json(&app, "/api/tree").await;
    assert_eq!(body["total_nodes"], 1);
    let metrics = body["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0]["total_calls"], 2);
    assert_eq!(metrics[0]["metrics"][0]["function"], "f");
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(&dir.path().join("trace.log"));

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
