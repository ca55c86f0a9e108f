//! Connection establishment and credential proxy exchange.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tracing::debug;

use crate::error::{Error, Result};
use crate::session::LiveSession;
use crate::types::LiveConfig;

/// Default bound on the WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for establishing live sessions against a credentialed endpoint.
///
/// The URL is expected to already carry its credentials (obtained via
/// [`exchange_secure_url`]); API keys never live in this crate's config.
pub struct LiveClient {
    url: String,
    handshake_timeout: Duration,
}

impl LiveClient {
    /// Creates a client for the given WebSocket URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Overrides the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Establishes a session and transmits `config` as the first message.
    ///
    /// Fails with [`Error::InvalidConfig`] when the model is missing, with
    /// [`Error::ConnectTimeout`] when the handshake exceeds the bound (no
    /// partial state is left open), and with [`Error::Connection`] on any
    /// other transport failure.
    pub async fn connect(&self, config: &LiveConfig) -> Result<LiveSession> {
        if config.model.trim().is_empty() {
            return Err(Error::InvalidConfig("model is required".to_string()));
        }

        debug!("connecting to: {}", redact_query(&self.url));
        let (ws_stream, _response) =
            tokio::time::timeout(self.handshake_timeout, connect_async(self.url.as_str()))
                .await
                .map_err(|_| Error::ConnectTimeout(self.handshake_timeout))?
                .map_err(|e| Error::Connection(format!("failed to connect: {}", e)))?;

        LiveSession::start(ws_stream, config).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest<'a> {
    ws_url: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    #[serde(default)]
    secure_ws_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Exchanges a template WebSocket URL for a credentialed one via the proxy,
/// so the API key never reaches this process's configuration.
///
/// Anything other than a 2xx response carrying a `wss://` URL is an
/// [`Error::InvalidConfig`] for this connect attempt.
pub async fn exchange_secure_url(
    http: &reqwest::Client,
    proxy_endpoint: &str,
    ws_url: &str,
) -> Result<String> {
    let response = http
        .post(proxy_endpoint)
        .json(&ExchangeRequest { ws_url })
        .send()
        .await?;

    let status = response.status();
    let body: ExchangeResponse = response.json().await.map_err(|e| {
        Error::InvalidConfig(format!("credential proxy returned malformed body: {}", e))
    })?;

    if let Some(message) = body.error {
        return Err(Error::InvalidConfig(format!(
            "credential proxy rejected request: {}",
            message
        )));
    }
    if !status.is_success() {
        return Err(Error::InvalidConfig(format!(
            "credential proxy returned status {}",
            status
        )));
    }

    let secure = body
        .secure_ws_url
        .ok_or_else(|| Error::InvalidConfig("credential proxy returned no URL".to_string()))?;
    validate_secure_url(&secure)?;
    Ok(secure)
}

/// Checks that a credentialed URL uses the secure WebSocket scheme.
pub(crate) fn validate_secure_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| Error::InvalidConfig(format!("credential proxy returned bad URL: {}", e)))?;
    if parsed.scheme() != "wss" {
        return Err(Error::InvalidConfig(format!(
            "credential proxy returned non-secure URL scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(())
}

/// Strips the query string for logging; the key lives there.
fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
