//! HTTP client for the conversation-log sink.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::SessionLog;

/// Errors returned by the sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The request never completed.
    #[error("sink request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The sink answered with a structured rejection.
    #[error("sink rejected log ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Deserialize)]
struct SinkRejection {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Delivers completed session logs to the external sink, one POST per
/// session. The caller (the recorder) logs failures and does not retry.
pub struct SinkClient {
    endpoint: String,
    http: reqwest::Client,
}

impl SinkClient {
    /// Creates a sink client for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: endpoint.into(),
            http,
        }
    }

    /// Returns the sink endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts the full session log.
    pub async fn save(&self, log: &SessionLog) -> Result<(), SinkError> {
        debug!(
            session_id = %log.session_id,
            messages = log.messages.len(),
            "posting session log"
        );
        let response = self.http.post(&self.endpoint).json(log).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = match response.json::<SinkRejection>().await {
            Ok(rejection) => {
                let mut message = rejection.error.unwrap_or_else(|| "unknown error".to_string());
                if let Some(details) = rejection.details {
                    message.push_str(": ");
                    message.push_str(&details);
                }
                message
            }
            Err(_) => "unreadable error body".to_string(),
        };
        Err(SinkError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_sink_is_http_error() {
        // Port 9 (discard) refuses connections.
        let sink = SinkClient::new("http://127.0.0.1:9/log-conversation");
        let log = SessionLog::new("s-1", "u-1", "sam");
        let err = sink.save(&log).await.unwrap_err();
        assert!(matches!(err, SinkError::Http(_)));
    }

    #[test]
    fn test_rejected_error_display() {
        let err = SinkError::Rejected {
            status: 400,
            message: "Missing required fields".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("Missing required fields"));
    }
}
