//! Per-user context injection for session configuration.
//!
//! Before connecting, free-text context about the user is fetched from an
//! external profile source and spliced into the system instruction. The
//! fetch degrades gracefully: any failure — timeout, non-2xx, malformed
//! payload, empty body — leaves the configuration as it was and never
//! blocks or fails the connect path.
//!
//! Insertion is driven by a fixed marker token rather than searching the
//! prose for an anchor phrase, so the splice point is deterministic:
//! instructions carry [`CONTEXT_MARKER`] where the context block belongs,
//! and instructions without the marker get the block appended. The splice
//! is textual by design; the context source returns prose, not structure.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use tutorlive_live::LiveConfig;

/// Marker token replaced by the context block during augmentation.
pub const CONTEXT_MARKER: &str = "{{user_context}}";

const BLOCK_OPEN: &str = "--- Important information about this user ---";
const BLOCK_CLOSE: &str = "--- End of user information ---";
const BLOCK_GUIDANCE: &str = "Reference this information naturally to personalize your \
assistance. Do not state that you have it.";

/// Default bound on the context fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct ContextResponse {
    #[serde(default)]
    context: Option<String>,
}

/// Client for the external user-context source.
pub struct ContextSource {
    endpoint: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl ContextSource {
    /// Creates a source for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    /// Overrides the fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetches context for `username`. Returns `None` on any failure or
    /// when the source has nothing for this user.
    pub async fn fetch(&self, username: &str) -> Option<String> {
        debug!(username, "fetching user context");
        let result = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "username": username }))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("context fetch failed: {}; continuing without context", e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(
                status = %response.status(),
                "context source returned an error; continuing without context"
            );
            return None;
        }

        // The source may answer with `{"context": "..."}` or raw prose.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("context body unreadable: {}; continuing without context", e);
                return None;
            }
        };
        let text = match serde_json::from_str::<ContextResponse>(&body) {
            Ok(parsed) => parsed.context.unwrap_or_default(),
            Err(_) => body,
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            debug!(username, "no context available");
            None
        } else {
            Some(text)
        }
    }

    /// Fetches context for the configured user and splices it into the
    /// system instruction. On any failure the original config comes back
    /// with only the marker token removed.
    pub async fn augment(&self, mut config: LiveConfig) -> LiveConfig {
        let Some(instruction) = config.instruction_text().map(str::to_string) else {
            return config;
        };
        let context = self.fetch(&config.username).await;
        config.set_instruction_text(splice_context(&instruction, context.as_deref()));
        config
    }
}

/// Splices a context block into an instruction at the marker token, or
/// appends it when the marker is absent. Without context the marker is
/// stripped so placeholder text never reaches the service.
pub fn splice_context(instruction: &str, context: Option<&str>) -> String {
    let Some(context) = context else {
        return instruction.replace(CONTEXT_MARKER, "").trim_end().to_string();
    };

    let block = format!(
        "{}\n{}\n{}\n\n{}",
        BLOCK_OPEN, context, BLOCK_CLOSE, BLOCK_GUIDANCE
    );

    if instruction.contains(CONTEXT_MARKER) {
        instruction.replace(CONTEXT_MARKER, &block)
    } else {
        format!("{}\n\n{}", instruction.trim_end(), block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_is_replaced() {
        let instruction = format!("You are a tutor.\n\n{}\n\nBe friendly.", CONTEXT_MARKER);
        let out = splice_context(&instruction, Some("Prefers synthwave."));

        assert!(!out.contains(CONTEXT_MARKER));
        assert!(out.contains("Prefers synthwave."));
        assert!(out.contains(BLOCK_OPEN));
        // Surrounding prose keeps its position around the splice.
        let block_pos = out.find(BLOCK_OPEN).unwrap();
        assert!(out.find("You are a tutor.").unwrap() < block_pos);
        assert!(out.find("Be friendly.").unwrap() > block_pos);
    }

    #[test]
    fn test_missing_marker_appends_block() {
        let out = splice_context("You are a tutor.", Some("Uses a groovebox."));
        assert!(out.starts_with("You are a tutor."));
        assert!(out.ends_with(BLOCK_GUIDANCE));
        assert!(out.contains("Uses a groovebox."));
    }

    #[test]
    fn test_no_context_strips_marker() {
        let instruction = format!("You are a tutor.\n\n{}", CONTEXT_MARKER);
        let out = splice_context(&instruction, None);
        assert_eq!(out, "You are a tutor.");
    }

    #[test]
    fn test_no_context_no_marker_is_identity() {
        let out = splice_context("You are a tutor.", None);
        assert_eq!(out, "You are a tutor.");
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_gracefully() {
        // Unreachable endpoint: fetch yields None, augment passes the
        // config through with the marker stripped.
        let source = ContextSource::new("http://127.0.0.1:9/context")
            .with_timeout(Duration::from_millis(200));

        assert_eq!(source.fetch("sam").await, None);

        let config = tutorlive_live::LiveConfig::new("m")
            .with_identity("u-1", "sam")
            .with_instruction_text(format!("Hello.\n\n{}", CONTEXT_MARKER));
        let augmented = source.augment(config).await;
        assert_eq!(augmented.instruction_text(), Some("Hello."));
        assert_eq!(augmented.model, "m");
    }

    #[tokio::test]
    async fn test_augment_without_instruction_is_identity() {
        let source = ContextSource::new("http://127.0.0.1:9/context")
            .with_timeout(Duration::from_millis(200));
        let config = tutorlive_live::LiveConfig::new("m");
        let augmented = source.augment(config).await;
        assert!(augmented.instruction_text().is_none());
    }
}
