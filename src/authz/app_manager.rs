//! # App-Manager Client
//!
//! Fetches the namespace allow-set for a principal from the app-manager
//! service.
//!
//! ## Protocol
//!
//! `POST {endpoint}/login?username=..&password=..` with an empty JSON body.
//! The service answers with an envelope:
//!
//! ```json
//! { "code": 200, "msg": "ok", "data": { "namespaces": ["team-a"] } }
//! ```
//!
//! Any `code` other than 200, a transport failure or an unreadable body is an
//! authorization failure. The password is never logged.

use super::NamespaceAllowSet;
use crate::constants::{APP_MANAGER_SUCCESS_CODE, DEFAULT_APP_MANAGER_TIMEOUT_SECS};
use crate::error::DeployError;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Login for the app-manager service
#[derive(Clone)]
pub struct AppManagerCredentials {
    pub username: String,
    password: Zeroizing<String>,
}

impl AppManagerCredentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl fmt::Debug for AppManagerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppManagerCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(default)]
    namespaces: Vec<String>,
}

/// HTTP client for the app-manager login endpoint
#[derive(Debug, Clone)]
pub struct AppManagerClient {
    http: Client,
    endpoint: String,
}

impl AppManagerClient {
    /// Create a client for `endpoint` with the default request timeout
    pub fn new(endpoint: &str) -> Result<Self, DeployError> {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_APP_MANAGER_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, DeployError> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(DeployError::Configuration(
                "app-manager endpoint is empty".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Log in and return the namespaces the principal may deploy into
    pub async fn fetch_allowed_namespaces(
        &self,
        credentials: &AppManagerCredentials,
    ) -> Result<NamespaceAllowSet, DeployError> {
        let url = format!("{}/login", self.endpoint);
        info!(url = %url, username = %credentials.username, "Fetching namespace privileges");

        let response = self
            .http
            .post(&url)
            .query(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                // reqwest errors can carry the full URL, query string included
                warn!(url = %url, "App-manager request failed");
                DeployError::Authorization(format!(
                    "app-manager request failed: {}",
                    e.without_url()
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            DeployError::Authorization(format!(
                "failed to read app-manager response: {}",
                e.without_url()
            ))
        })?;
        debug!(status = %status, "App-manager responded");

        let envelope: LoginEnvelope = serde_json::from_str(&body).map_err(|e| {
            warn!(status = %status, "App-manager returned an unreadable body");
            DeployError::Authorization(format!(
                "unreadable app-manager response (HTTP {status}): {e}"
            ))
        })?;

        if envelope.code != APP_MANAGER_SUCCESS_CODE {
            let msg = envelope.msg.unwrap_or_default();
            warn!(code = envelope.code, msg = %msg, "App-manager login rejected");
            return Err(DeployError::Authorization(format!(
                "app-manager login failed with code {}: {msg}",
                envelope.code
            )));
        }

        let allowed: NamespaceAllowSet = envelope
            .data
            .map(|d| d.namespaces)
            .unwrap_or_default()
            .into_iter()
            .filter(|ns| !ns.trim().is_empty())
            .collect();
        info!(count = allowed.len(), "Namespace privileges loaded");
        Ok(allowed)
    }
}
