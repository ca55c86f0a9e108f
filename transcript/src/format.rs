//! Human-readable rendering of a session log.

use chrono::{DateTime, Utc};

use crate::SessionLog;

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Renders a session log as text: a header with the participant and
/// duration, then one block per message. Used for the local fallback record
/// when the sink is unavailable.
pub fn format_session_log(log: &SessionLog) -> String {
    let mut text = format!("Voice session with {}\n", log.username);
    text.push_str(&format!("Started: {}\n", format_timestamp(log.start_time)));

    match log.end_time {
        Some(end) => {
            text.push_str(&format!("Ended: {}\n", format_timestamp(end)));
            let duration = (end - log.start_time).num_seconds().max(0);
            text.push_str(&format!(
                "Duration: {}m {}s\n\n",
                duration / 60,
                duration % 60
            ));
        }
        None => text.push_str("Session in progress\n\n"),
    }

    text.push_str("CONVERSATION LOG:\n\n");
    for message in &log.messages {
        text.push_str(&format!(
            "[{} - {}]\n{}\n\n",
            message.role.as_str().to_uppercase(),
            format_timestamp(message.timestamp),
            message.content
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, Role};
    use chrono::TimeZone;

    fn sample_log() -> SessionLog {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        SessionLog {
            session_id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            username: "sam".to_string(),
            start_time: start,
            end_time: Some(start + chrono::Duration::seconds(95)),
            messages: vec![
                Message {
                    role: Role::User,
                    content: "hello".to_string(),
                    timestamp: start + chrono::Duration::seconds(2),
                },
                Message {
                    role: Role::Assistant,
                    content: "hi there".to_string(),
                    timestamp: start + chrono::Duration::seconds(4),
                },
            ],
        }
    }

    #[test]
    fn test_header_and_duration() {
        let text = format_session_log(&sample_log());
        assert!(text.contains("Voice session with sam"));
        assert!(text.contains("Duration: 1m 35s"));
    }

    #[test]
    fn test_message_blocks() {
        let text = format_session_log(&sample_log());
        assert!(text.contains("[USER - 2025-03-01 12:00:02 UTC]\nhello"));
        assert!(text.contains("[ASSISTANT - 2025-03-01 12:00:04 UTC]\nhi there"));
    }

    #[test]
    fn test_in_progress_session() {
        let mut log = sample_log();
        log.end_time = None;
        let text = format_session_log(&log);
        assert!(text.contains("Session in progress"));
        assert!(!text.contains("Duration:"));
    }
}
