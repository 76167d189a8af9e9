//! Health and metrics endpoint integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use live_test_utils::TestLiveServer;
use serde_json::json;

#[tokio::test]
async fn test_health_reports_registry_sizes() -> Result<()> {
    let server = TestLiveServer::spawn().await?;
    let client = reqwest::Client::new();
    let alice = server.user("alice");

    client
        .post(format!("{}/live/rooms", server.url()))
        .bearer_auth(server.api_token(&alice))
        .json(&json!({"name": "Chess Stream", "visibility": 0}))
        .send()
        .await?
        .error_for_status()?;

    client
        .post(format!("{}/live/upload", server.url()))
        .bearer_auth(server.streaming_token(&alice))
        .body("v=0")
        .send()
        .await?
        .error_for_status()?;

    let body: serde_json::Value = client
        .get(format!("{}/health", server.url()))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rooms"], 1);
    assert_eq!(body["uploadSessions"], 1);

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let server = TestLiveServer::spawn().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), 200);
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_404() -> Result<()> {
    let server = TestLiveServer::spawn().await?;

    let response = reqwest::get(format!("{}/live/nowhere", server.url())).await?;

    assert_eq!(response.status(), 404);
    Ok(())
}
