//! Share API over HTTP

use serde_json::{json, Value};
use studio_tests::common::{setup_test_logging, TestShareServer};

#[tokio::test]
async fn test_snapshots_from_every_tool() {
    setup_test_logging();
    let server = TestShareServer::start().await.unwrap();
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for (tool, data) in [
        ("code", json!({"files": [{"name": "main.py", "language": "python"}]})),
        ("scene", json!({"objects": [{"type": "cube"}]})),
        ("music", json!({"tempo": 120})),
        ("video", json!({"clips": []})),
    ] {
        let resp = client
            .post(server.url("/api/share"))
            .json(&json!({"tool": tool, "name": format!("{tool} demo"), "data": data}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        ids.push((tool, body["id"].as_str().unwrap().to_string()));
    }

    for (tool, id) in ids {
        let body: Value = client
            .get(server.url(&format!("/api/share/{id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["snapshot"]["id"], json!(id));
        assert_eq!(body["snapshot"]["tool"], json!(tool));
    }

    server.stop();
}

#[tokio::test]
async fn test_error_responses() {
    setup_test_logging();
    let server = TestShareServer::start().await.unwrap();
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/api/share"))
        .json(&json!({"tool": "code"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({"success": false, "error": "Invalid data provided"})
    );

    let resp = client
        .get(server.url("/api/share/00000000-0000-0000-0000-000000000000"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({"success": false, "error": "Snapshot not found"})
    );

    server.stop();
}

#[tokio::test]
async fn test_health_reports_version() {
    let server = TestShareServer::start().await.unwrap();
    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], json!("healthy"));
    assert!(body["version"].is_string());
    server.stop();
}
