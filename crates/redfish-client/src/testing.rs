//! Test utilities for redfish-client
//!
//! Runs an axum router as a stand-in BMC on a loopback port, so the workflow
//! can be exercised end to end over real HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::ClientConfig;
use crate::{Credentials, EndpointMap, RedfishClient, Result};

/// A mock BMC that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on an ephemeral loopback port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use axum::{routing::post, Router};
    /// use redfish_client::testing::TestServer;
    ///
    /// let router = Router::new().route("/redfish/v1/SessionService/Sessions", post(login));
    /// let server = TestServer::start(router).await?;
    /// let mut client = server.client(Credentials::new("admin", "pw"), EndpointMap::new())?;
    /// client.login().await?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> std::io::Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Plain-HTTP client configuration pointing at this server
    ///
    /// Polling intervals are shortened so workflow tests finish quickly.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::builder(self.addr.ip().to_string())
            .https(false)
            .port(self.addr.port())
            .request_timeout_ms(5_000)
            .connect_timeout_ms(2_000)
            .task_polling_ms(20, 2_000)
            .inventory_polling_ms(20, 2_000)
            .build()
    }

    /// A client for this server with [`Self::config`]
    pub fn client(
        &self,
        credentials: Credentials,
        endpoints: EndpointMap,
    ) -> Result<RedfishClient> {
        RedfishClient::new(self.config(), credentials, endpoints)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
