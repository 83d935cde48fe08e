//! Test server harness for E2E testing
//!
//! Provides `TestVcServer` for spawning real VC server instances in
//! tests, backed by in-memory stores and a mock RTC client so no
//! external infrastructure is needed.

use crate::fixtures::TestContext;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use vc_service::routes;

/// Test harness for spawning the Videocall Controller in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> anyhow::Result<()> {
///     let server = TestVcServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .get(format!("{}/v1/health", server.url()))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestVcServer {
    addr: SocketAddr,
    context: TestContext,
    _handle: JoinHandle<()>,
}

impl TestVcServer {
    /// Spawn a server over a fresh context (healthy mock provider).
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(TestContext::new()).await
    }

    /// Spawn a server over a caller-prepared context.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(context: TestContext) -> Result<Self, anyhow::Error> {
        // Build routes using vc-service's real route builder
        let app = routes::build_routes(context.app_state());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            context,
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

    /// The stores and services behind the running server, for direct
    /// state assertions.
    pub fn context(&self) -> &TestContext {
        &self.context
    }
}

impl Drop for TestVcServer {
    fn drop(&mut self) {
        // Explicitly abort the HTTP server task to ensure immediate
        // cleanup when the test completes.
        self._handle.abort();
    }
}
