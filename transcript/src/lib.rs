//! Conversation transcript types, accumulation, and delivery.
//!
//! A [`TranscriptRecorder`] observes one session's traffic and accumulates
//! an ordered transcript; on teardown the transcript is flushed exactly
//! once to the external conversation-log sink, falling back to a local log
//! record when the sink is unreachable so nothing is lost silently.

pub mod format;
pub mod recorder;
pub mod sink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use format::format_session_log;
pub use recorder::{TranscriptRecorder, AUDIO_ONLY_PLACEHOLDER};
pub use sink::{SinkClient, SinkError};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Returns the string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The full conversation log for one session.
///
/// Messages are append-ordered with non-decreasing timestamps. Role
/// alternation is expected but never enforced: consecutive same-role
/// messages (an unanswered user message followed by another) are kept
/// verbatim, never merged or dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub session_id: String,
    pub user_id: String,
    pub username: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Vec<Message>,
}

impl SessionLog {
    /// Creates an empty log starting now.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            username: username.into(),
            start_time: Utc::now(),
            end_time: None,
            messages: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            r#""assistant""#
        );
        let parsed: Role = serde_json::from_str(r#""assistant""#).unwrap();
        assert_eq!(parsed, Role::Assistant);
    }

    #[test]
    fn test_session_log_json_shape() {
        let log = SessionLog::new("s-1", "u-1", "sam");
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["session_id"], "s-1");
        assert_eq!(value["user_id"], "u-1");
        assert_eq!(value["username"], "sam");
        assert!(value["end_time"].is_null());
        assert!(value["messages"].as_array().unwrap().is_empty());
    }
}
