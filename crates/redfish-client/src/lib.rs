//! Redfish BMC Client Library
//!
//! Session-authenticated client for Redfish BMCs with a firmware update
//! workflow: upload an image, trigger the update, poll the task, clean up
//! placeholders and power-cycle the system.
//!
//! Service paths are looked up per platform in an [`EndpointMap`], falling
//! back to the `default` platform and then to standard Redfish paths.
//!
//! # Example
//!
//! ```rust,no_run
//! use redfish_client::{ClientConfig, Credentials, EndpointMap, RedfishClient, UpdateRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::from_yaml_file("redfish.yaml")?;
//!     let endpoints = EndpointMap::load("endpoints.json");
//!     let password = std::env::var("BMC_PASSWORD")?;
//!
//!     let mut client = RedfishClient::new(config, Credentials::new("admin", password), endpoints)?;
//!     client.login().await?;
//!
//!     let request = UpdateRequest::new("bios.bin", "ActiveBIOSTarget").preserve_config(true);
//!     let outcome = client
//!         .firmware()
//!         .update_firmware(&request, Some(|phase| println!("phase: {}", phase)))
//!         .await?;
//!     println!("task: {:?}", outcome.task_uri);
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module serves an axum router as a mock BMC:
//!
//! ```rust,ignore
//! use redfish_client::testing::TestServer;
//!
//! let server = TestServer::start(router).await?;
//! let mut client = server.client(Credentials::new("admin", "pw"), EndpointMap::new())?;
//! ```

pub mod auth;
mod client;
pub mod config;
pub mod endpoints;
mod error;
pub mod firmware;
pub mod logging;
pub mod testing;
pub mod transport;

pub use auth::{Authenticator, Credentials, Session, SessionAuth, AUTH_TOKEN_HEADER};
pub use client::RedfishClient;
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use endpoints::{EndpointMap, DEFAULT_PLATFORM};
pub use error::{RedfishError, Result, TransportError, TransportErrorKind};
pub use firmware::{
    FirmwareService, InventoryEntry, ResetType, Task, TaskState, UpdateOutcome, UpdatePhase,
    UpdateRequest, UploadResult,
};
pub use transport::{HttpTransport, RedfishRequest, RedfishResponse, RequestBody, Transport};
