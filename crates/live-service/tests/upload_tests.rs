//! Upload session integration tests.
//!
//! The server runs on a `MockTransport`, so tests drive connection events by
//! hand.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use live_service::auth::AuthUser;
use live_service::transport::TransportEvent;
use live_service::upload::SessionState;
use live_test_utils::{MockTransport, TestLiveServer};
use std::collections::HashMap;
use std::time::Duration;

const OFFER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

async fn begin(server: &TestLiveServer, user: &AuthUser) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .post(format!("{}/live/upload", server.url()))
        .bearer_auth(server.streaming_token(user))
        .header("content-type", "application/sdp")
        .body(OFFER)
        .send()
        .await?)
}

async fn end(server: &TestLiveServer, user: &AuthUser) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .delete(format!("{}/live/upload", server.url()))
        .bearer_auth(server.streaming_token(user))
        .send()
        .await?)
}

/// Poll until `check` holds, failing after five seconds.
async fn eventually<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition should hold eventually");
}

#[tokio::test]
async fn test_begin_returns_sdp_answer() -> Result<()> {
    let server = TestLiveServer::spawn().await?;
    let alice = server.user("alice");

    let response = begin(&server, &alice).await?;

    assert_eq!(response.status(), 201);
    assert_eq!(response.headers()["location"], "/live/upload");
    assert_eq!(response.headers()["content-type"], "application/sdp");
    assert!(response.text().await?.starts_with("v=0"));

    // Pending sessions occupy the slot but are not visible yet
    assert_eq!(server.state().uploads.len(), 1);
    assert!(server.state().uploads.get(alice.id).is_none());

    Ok(())
}

#[tokio::test]
async fn test_second_begin_conflicts() -> Result<()> {
    let server = TestLiveServer::spawn().await?;
    let alice = server.user("alice");
    let bob = server.user("bob");

    assert_eq!(begin(&server, &alice).await?.status(), 201);

    let response = begin(&server, &alice).await?;
    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "ALREADY_STREAMING");

    // Other identities are unaffected
    assert_eq!(begin(&server, &bob).await?.status(), 201);
    assert_eq!(server.state().uploads.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_empty_offer_rejected() -> Result<()> {
    let server = TestLiveServer::spawn().await?;
    let alice = server.user("alice");

    let response = reqwest::Client::new()
        .post(format!("{}/live/upload", server.url()))
        .bearer_auth(server.streaming_token(&alice))
        .body("")
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    assert_eq!(server.transport().negotiate_count(), 0);
    assert!(server.state().uploads.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_connected_session_becomes_visible() -> Result<()> {
    let server = TestLiveServer::spawn().await?;
    let alice = server.user("alice");

    begin(&server, &alice).await?;
    assert!(server.transport().emit_latest(TransportEvent::Connected).await);

    let uploads = server.state().uploads.clone();
    eventually(|| uploads.get(alice.id).is_some()).await;

    let session = uploads.get(alice.id).unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.owner(), alice.id);
    assert_eq!(uploads.active_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_end_then_begin_again() -> Result<()> {
    let server = TestLiveServer::spawn().await?;
    let alice = server.user("alice");

    begin(&server, &alice).await?;
    server.transport().emit_latest(TransportEvent::Connected).await;

    assert_eq!(end(&server, &alice).await?.status(), 204);
    assert_eq!(server.transport().teardown_count(), 1);
    assert!(server.state().uploads.is_empty());

    // The identity is free again right away
    assert_eq!(begin(&server, &alice).await?.status(), 201);
    Ok(())
}

#[tokio::test]
async fn test_end_without_session_conflicts() -> Result<()> {
    let server = TestLiveServer::spawn().await?;
    let alice = server.user("alice");

    let response = end(&server, &alice).await?;

    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NOT_STREAMING");
    Ok(())
}

#[tokio::test]
async fn test_negotiation_failure_releases_identity() -> Result<()> {
    let server = TestLiveServer::spawn_with(MockTransport::rejecting(), HashMap::new()).await?;
    let alice = server.user("alice");

    let first = begin(&server, &alice).await?;
    assert_eq!(first.status(), 500);
    let body: serde_json::Value = first.json().await?;
    assert_eq!(body["error"]["code"], "NEGOTIATION_FAILED");

    // Not a conflict: the failed attempt left no reservation behind
    assert_eq!(begin(&server, &alice).await?.status(), 500);
    assert_eq!(server.transport().negotiate_count(), 2);
    assert!(server.state().uploads.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_transport_loss_frees_identity() -> Result<()> {
    let server = TestLiveServer::spawn().await?;
    let alice = server.user("alice");

    begin(&server, &alice).await?;
    server.transport().emit_latest(TransportEvent::Connected).await;
    server
        .transport()
        .emit_latest(TransportEvent::Disconnected {
            reason: "ice failed".to_string(),
        })
        .await;

    let uploads = server.state().uploads.clone();
    eventually(|| uploads.is_empty()).await;

    assert_eq!(begin(&server, &alice).await?.status(), 201);
    Ok(())
}

#[tokio::test]
async fn test_unconnected_session_times_out() -> Result<()> {
    let vars = HashMap::from([("NEGOTIATION_TIMEOUT_SECONDS".to_string(), "1".to_string())]);
    let server = TestLiveServer::spawn_with(MockTransport::accepting(), vars).await?;
    let alice = server.user("alice");

    assert_eq!(begin(&server, &alice).await?.status(), 201);

    let uploads = server.state().uploads.clone();
    eventually(|| uploads.is_empty()).await;
    assert_eq!(server.transport().teardown_count(), 1);

    Ok(())
}
