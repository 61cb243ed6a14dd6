//! Redfish client aggregate: configuration, endpoint map, transport and session

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::auth::{Authenticator, Credentials, Session, SessionAuth};
use crate::config::ClientConfig;
use crate::endpoints::{services, EndpointMap};
use crate::error::{RedfishError, Result};
use crate::firmware::FirmwareService;
use crate::transport::{HttpTransport, RedfishRequest, RedfishResponse, Transport};

/// Redfish REST API client
///
/// Owns at most one session. `login`/`logout` take `&mut self`; every other
/// call borrows the client and fails fast with [`RedfishError::Auth`] when no
/// valid session exists.
pub struct RedfishClient {
    config: ClientConfig,
    endpoints: Arc<EndpointMap>,
    transport: Box<dyn Transport>,
    auth: Box<dyn Authenticator>,
    session: Option<Session>,
}

impl std::fmt::Debug for RedfishClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedfishClient")
            .field("base_url", &self.transport.base_url().as_str())
            .field("platform", &self.config.connection.platform)
            .field("session", &self.session)
            .finish()
    }
}

impl RedfishClient {
    /// Create a client using the `reqwest` transport and session authentication
    ///
    /// # Example
    /// ```rust,no_run
    /// use redfish_client::{ClientConfig, Credentials, EndpointMap, RedfishClient};
    ///
    /// # async fn run() -> anyhow::Result<()> {
    /// let config = ClientConfig::builder("10.0.0.5").platform("default").build();
    /// let endpoints = EndpointMap::load("endpoints.json");
    /// let mut client = RedfishClient::new(config, Credentials::new("admin", "secret"), endpoints)?;
    /// client.login().await?;
    /// let inventory = client.firmware().get_firmware_inventory().await?;
    /// client.logout().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        config: ClientConfig,
        credentials: Credentials,
        endpoints: impl Into<Arc<EndpointMap>>,
    ) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        info!("Redfish client created for {}", transport.base_url());
        Ok(Self::with_parts(
            config,
            endpoints,
            transport,
            SessionAuth::new(credentials),
        ))
    }

    /// Assemble a client from explicit transport and authenticator implementations
    pub fn with_parts(
        config: ClientConfig,
        endpoints: impl Into<Arc<EndpointMap>>,
        transport: impl Transport + 'static,
        auth: impl Authenticator + 'static,
    ) -> Self {
        Self {
            config,
            endpoints: endpoints.into(),
            transport: Box::new(transport),
            auth: Box::new(auth),
            session: None,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &EndpointMap {
        &self.endpoints
    }

    /// Platform type used for endpoint resolution
    pub fn platform(&self) -> &str {
        &self.config.connection.platform
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Current session, if any (valid or not)
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_valid)
    }

    /// Resolve a logical service name for this client's platform
    pub fn resolve(&self, service: &str) -> Result<String> {
        self.endpoints.resolve(self.platform(), service)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Open a fresh session, replacing any existing one
    ///
    /// The BMC may expire a token at any time, so a locally valid session is
    /// never trusted here. On failure the previous session is left in place.
    #[instrument(skip(self))]
    pub async fn login(&mut self) -> Result<()> {
        let path = self.resolve(services::SESSION_SERVICE)?;
        let session = self.auth.login(self.transport.as_ref(), &path).await?;
        if let Some(previous) = self.session.replace(session) {
            debug!("Replaced previous session {:?}", previous.session_uri());
        }
        Ok(())
    }

    /// Close the session. A no-op when not logged in.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            warn!("Not logged in, nothing to log out");
            return Ok(());
        };
        self.auth.logout(self.transport.as_ref(), session).await?;
        self.session = None;
        Ok(())
    }

    /// The active session, or an authentication error
    pub fn require_session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .filter(|s| s.is_valid())
            .ok_or_else(|| RedfishError::auth("no active session, call login() first"))
    }

    // =========================================================================
    // Authenticated requests
    // =========================================================================

    /// Execute an authenticated request
    pub async fn request(&self, request: RedfishRequest) -> Result<RedfishResponse> {
        let session = self.require_session()?;
        self.transport.request(request, Some(session)).await
    }

    pub async fn get(&self, path: &str) -> Result<RedfishResponse> {
        self.request(RedfishRequest::get(path)).await
    }

    /// GET and deserialize the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path).await?.json()
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<RedfishResponse> {
        self.request(RedfishRequest::post(path).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: serde_json::Value) -> Result<RedfishResponse> {
        self.request(RedfishRequest::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<RedfishResponse> {
        self.request(RedfishRequest::delete(path)).await
    }

    /// Firmware update operations bound to this client's session
    pub fn firmware(&self) -> FirmwareService<'_> {
        FirmwareService::new(self)
    }
}
