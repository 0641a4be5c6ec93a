//! Secrets API client
//!
//! The fetch orchestrator only needs one call from the remote side: a
//! conditional download of the current secrets. [`SecretsSource`] is that
//! seam; [`HttpSource`] implements it over HTTPS with `ureq`.

use crate::cache::{IdentityKey, SecretMap};
use crate::error::{KeepsakeError, KeepsakeResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Result of a conditional fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteResponse {
    /// The secrets still match the freshness token that was sent
    Unchanged,
    /// Current secrets and the token that validates them
    Modified {
        secrets: SecretMap,
        etag: Option<String>,
    },
}

/// Where secrets come from when the network is available
pub trait SecretsSource {
    /// Fetch the secrets for `identity`. When `etag` is set the source may
    /// answer [`RemoteResponse::Unchanged`].
    fn fetch(&self, identity: &IdentityKey, etag: Option<&str>) -> KeepsakeResult<RemoteResponse>;
}

/// `SecretsSource` backed by the HTTP API
pub struct HttpSource {
    agent: ureq::Agent,
    host: String,
}

impl HttpSource {
    const DOWNLOAD_PATH: &'static str = "/v3/configs/config/secrets/download";

    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.host, Self::DOWNLOAD_PATH)
    }
}

impl SecretsSource for HttpSource {
    fn fetch(&self, identity: &IdentityKey, etag: Option<&str>) -> KeepsakeResult<RemoteResponse> {
        let url = self.url();
        debug!("GET {} (etag: {})", url, etag.unwrap_or("none"));

        let mut request = self
            .agent
            .get(&url)
            .query("format", "json")
            .header("Authorization", &format!("Bearer {}", identity.credential()))
            .header("Accept", "application/json")
            .header("User-Agent", concat!("keepsake/", env!("CARGO_PKG_VERSION")));
        if !identity.project().is_empty() {
            request = request.query("project", identity.project());
        }
        if !identity.config().is_empty() {
            request = request.query("config", identity.config());
        }
        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }

        let mut response = request
            .call()
            .map_err(|e| KeepsakeError::Remote(e.to_string()))?;
        let status = response.status().as_u16();

        if status == 304 {
            debug!("Secrets unchanged since {}", etag.unwrap_or("none"));
            return Ok(RemoteResponse::Unchanged);
        }

        let new_etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| KeepsakeError::Remote(format!("reading response body: {}", e)))?;

        if !(200..300).contains(&status) {
            return Err(KeepsakeError::RemoteStatus {
                status,
                message: api_error_message(&body),
            });
        }

        let secrets: SecretMap = serde_json::from_str(&body)
            .map_err(|e| KeepsakeError::Remote(format!("invalid secrets payload: {}", e)))?;
        debug!("Fetched {} secrets", secrets.len());

        Ok(RemoteResponse::Modified {
            secrets,
            etag: new_etag,
        })
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    messages: Vec<String>,
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.messages.is_empty() => parsed.messages.join(", "),
        _ if body.trim().is_empty() => "no error message".to_string(),
        _ => body.trim().chars().take(200).collect(),
    }
}
