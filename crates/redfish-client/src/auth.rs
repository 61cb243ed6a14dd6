//! Session authentication
//!
//! Redfish session login: `POST` credentials to the session collection, keep
//! the `X-Auth-Token` response header and the `Location` of the session
//! resource, and `DELETE` that resource on logout.

use std::fmt;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{snippet, RedfishError, Result, TransportError};
use crate::transport::{RedfishRequest, Transport};

/// Header carrying the session token on every authenticated call
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Login credentials. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// An authenticated Redfish session
#[derive(Clone)]
pub struct Session {
    token: String,
    session_uri: Option<String>,
    base_url: Url,
    valid: bool,
}

impl Session {
    pub fn new(token: impl Into<String>, session_uri: Option<String>, base_url: Url) -> Self {
        let token = token.into();
        let valid = !token.is_empty();
        Self {
            token,
            session_uri,
            base_url,
            valid,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Session resource URI returned in the login `Location` header
    pub fn session_uri(&self) -> Option<&str> {
        self.session_uri.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// True while the token is usable
    pub fn is_valid(&self) -> bool {
        self.valid && !self.token.is_empty()
    }

    /// Drop the token locally
    pub fn invalidate(&mut self) {
        self.token.clear();
        self.valid = false;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token_len", &self.token.len())
            .field("session_uri", &self.session_uri)
            .field("base_url", &self.base_url.as_str())
            .field("valid", &self.valid)
            .finish()
    }
}

/// Login/logout capability.
///
/// [`SessionAuth`] is the token-session implementation; BMC dialects with a
/// different scheme plug in here.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Open a session against the session collection at `sessions_path`
    async fn login(&self, transport: &dyn Transport, sessions_path: &str) -> Result<Session>;

    /// Close `session` on the BMC and invalidate it locally
    async fn logout(&self, transport: &dyn Transport, session: &mut Session) -> Result<()>;
}

/// Token-based Redfish session authentication
#[derive(Debug, Clone)]
pub struct SessionAuth {
    credentials: Credentials,
}

impl SessionAuth {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }
}

#[async_trait]
impl Authenticator for SessionAuth {
    #[instrument(skip(self, transport), fields(user = %self.credentials.username))]
    async fn login(&self, transport: &dyn Transport, sessions_path: &str) -> Result<Session> {
        info!(
            "Logging in: user {} path {} payload {}",
            self.credentials.username,
            sessions_path,
            json!({"UserName": self.credentials.username, "Password": "***"})
        );

        let payload = json!({
            "UserName": self.credentials.username,
            "Password": self.credentials.password,
        });
        let response = transport
            .request(RedfishRequest::post(sessions_path).json(payload), None)
            .await
            .map_err(|e| match e {
                RedfishError::Transport(TransportError::HttpStatus { code, body, .. }) => {
                    RedfishError::auth(format!(
                        "login to {} rejected with HTTP {}: {}",
                        sessions_path, code, body
                    ))
                }
                RedfishError::Transport(t) => {
                    RedfishError::auth(format!("login request failed: {}", t))
                }
                other => other,
            })?;

        if response.status != 200 && response.status != 201 {
            return Err(RedfishError::auth(format!(
                "login to {} returned unexpected HTTP {}: {}",
                sessions_path,
                response.status,
                snippet(&response.text())
            )));
        }

        let token = response
            .header(AUTH_TOKEN_HEADER)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                RedfishError::auth(format!(
                    "login to {} succeeded without an {} header",
                    sessions_path, AUTH_TOKEN_HEADER
                ))
            })?
            .to_string();

        let session_uri = response
            .header("Location")
            .map(str::to_string)
            .or_else(|| {
                response
                    .json_value()
                    .and_then(|body| body["@odata.id"].as_str().map(str::to_string))
            });

        info!(
            "Login succeeded: session_path={} | token_len={}",
            session_uri.as_deref().unwrap_or("<none>"),
            token.len()
        );

        Ok(Session::new(
            token,
            session_uri,
            transport.base_url().clone(),
        ))
    }

    #[instrument(skip(self, transport, session))]
    async fn logout(&self, transport: &dyn Transport, session: &mut Session) -> Result<()> {
        if !session.is_valid() {
            debug!("No active session, nothing to log out");
            return Ok(());
        }

        let Some(uri) = session.session_uri().map(str::to_string) else {
            warn!("Session has no resource URI, dropping token locally");
            session.invalidate();
            return Ok(());
        };

        debug!("Logging out: session_path={}", uri);
        match transport.delete(&uri, Some(&*session)).await {
            Ok(response) => {
                info!("Logout succeeded: status {}", response.status);
            }
            Err(e) if e.is_not_found() => {
                info!("Session {} already gone on the BMC", uri);
            }
            Err(e) if e.is_session_rejected() => {
                warn!("Session {} no longer accepted by the BMC: {}", uri, e);
            }
            Err(e) => {
                return Err(RedfishError::auth(format!("logout of {} failed: {}", uri, e)));
            }
        }

        session.invalidate();
        Ok(())
    }
}
