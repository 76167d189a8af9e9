//! Test server harness for E2E testing
//!
//! Provides `TestLiveServer` for spawning real live service instances in
//! tests, backed by a `MockTransport`.

use crate::token_builders::TEST_TOKEN_SECRET;
use common::types::UserId;
use live_service::auth::{AuthUser, TokenPurpose};
use live_service::config::Config;
use live_service::routes::{self, AppState};
use live_service::transport::MockTransport;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Test harness for spawning the live service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let server = TestLiveServer::spawn().await?;
/// let alice = server.user("alice");
///
/// let response = reqwest::Client::new()
///     .post(format!("{}/live/rooms", server.url()))
///     .bearer_auth(server.api_token(&alice))
///     .json(&serde_json::json!({"name": "Chess Stream", "visibility": 0}))
///     .send()
///     .await?;
///
/// assert_eq!(response.status(), 201);
/// ```
pub struct TestLiveServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    transport: Arc<MockTransport>,
    _handle: JoinHandle<()>,
}

impl TestLiveServer {
    /// Spawn a server whose transport accepts every non-empty offer.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(MockTransport::accepting(), HashMap::new()).await
    }

    /// Spawn a server with a specific transport and extra config variables.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        transport: MockTransport,
        extra_vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("TOKEN_SECRET".to_string(), TEST_TOKEN_SECRET.to_string()),
            ("DRAIN_SECONDS".to_string(), "0".to_string()),
        ]);
        vars.extend(extra_vars);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let transport = Arc::new(transport);
        let state = Arc::new(AppState::new(config, transport.clone()));

        // Per-server recorder; the global recorder is left alone
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(Arc::clone(&state), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            transport,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state (registries, token service, config).
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The mock transport behind the upload registry.
    pub fn transport(&self) -> &MockTransport {
        &self.transport
    }

    /// A fresh user identity.
    pub fn user(&self, name: &str) -> AuthUser {
        AuthUser {
            id: UserId::new(),
            name: name.to_string(),
        }
    }

    /// An API token for `user` issued by the server's token service.
    pub fn api_token(&self, user: &AuthUser) -> String {
        self.state
            .tokens
            .issue(user, TokenPurpose::Api, Duration::from_secs(3600))
            .expect("API token issuance should succeed")
    }

    /// A streaming token for `user` issued by the server's token service.
    pub fn streaming_token(&self, user: &AuthUser) -> String {
        self.state
            .tokens
            .issue(user, TokenPurpose::Streaming, Duration::from_secs(3600))
            .expect("streaming token issuance should succeed")
    }
}

impl Drop for TestLiveServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestLiveServer::spawn().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["rooms"], 0);
        assert_eq!(body["uploadSessions"], 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let server = TestLiveServer::spawn().await?;
        let addr = server.addr();

        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));

        Ok(())
    }

    #[tokio::test]
    async fn test_issued_tokens_verify() -> Result<(), anyhow::Error> {
        let server = TestLiveServer::spawn().await?;
        let alice = server.user("alice");

        let api = server.api_token(&alice);
        let verified = server.state().tokens.verify(&api, TokenPurpose::Api)?;
        assert_eq!(verified, alice);

        let streaming = server.streaming_token(&alice);
        assert!(server
            .state()
            .tokens
            .verify(&streaming, TokenPurpose::Api)
            .is_err());

        Ok(())
    }
}
