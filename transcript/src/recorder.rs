//! Event-driven transcript accumulation with exactly-once flush.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::format::format_session_log;
use crate::sink::SinkClient;
use crate::{Message, Role, SessionLog};

/// Placeholder content recorded when an assistant turn finishes with audio
/// but no text, preserving turn-taking structure for later analysis.
pub const AUDIO_ONLY_PLACEHOLDER: &str = "[Assistant Audio Response]";

#[derive(Default)]
struct OpenTurn {
    text: String,
    has_audio: bool,
}

/// Accumulates one session's transcript from observed traffic.
///
/// Assistant text fragments collect into an open turn that is committed at
/// the turn boundary; a boundary with audio and no text commits the
/// placeholder instead, so a user message is never left dangling by a pure
/// audio response. User messages append immediately.
///
/// `flush` runs at most once per recorder regardless of how many teardown
/// paths race into it, and never returns an error: sink failure downgrades
/// to a local log record.
pub struct TranscriptRecorder {
    log: Mutex<SessionLog>,
    open_turn: Mutex<OpenTurn>,
    flushed: AtomicBool,
    sink: Option<SinkClient>,
}

impl TranscriptRecorder {
    /// Creates a recorder for one session. `sink` is optional; without it,
    /// flush only writes the local record.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
        sink: Option<SinkClient>,
    ) -> Self {
        Self {
            log: Mutex::new(SessionLog::new(session_id, user_id, username)),
            open_turn: Mutex::new(OpenTurn::default()),
            flushed: AtomicBool::new(false),
            sink,
        }
    }

    /// Records an outbound user turn.
    pub fn record_user_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.append(Role::User, text.to_string());
    }

    /// Accumulates assistant text for the turn in progress.
    pub fn record_assistant_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.open_turn.lock().unwrap().text.push_str(text);
    }

    /// Notes that the turn in progress carried audio.
    pub fn record_assistant_audio(&self) {
        self.open_turn.lock().unwrap().has_audio = true;
    }

    /// Commits the assistant turn at the service's turn boundary.
    pub fn record_turn_complete(&self) {
        let mut open = self.open_turn.lock().unwrap();
        let turn = std::mem::take(&mut *open);
        drop(open);

        if !turn.text.is_empty() {
            self.append(Role::Assistant, turn.text);
        } else if turn.has_audio {
            self.append(Role::Assistant, AUDIO_ONLY_PLACEHOLDER.to_string());
        }
        // A boundary with neither text nor audio records nothing.
    }

    /// Number of messages accumulated so far.
    pub fn message_count(&self) -> usize {
        self.log.lock().unwrap().messages.len()
    }

    /// Returns a copy of the current log.
    pub fn snapshot(&self) -> SessionLog {
        self.log.lock().unwrap().clone()
    }

    /// True once the transcript has been flushed.
    pub fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::SeqCst)
    }

    /// Delivers the transcript to the sink. Runs at most once: subsequent
    /// calls are no-ops returning false. Returns false (after logging the
    /// transcript locally) when the sink rejects the log — data is never
    /// silently lost, and teardown is never blocked by a sink failure.
    pub async fn flush(&self) -> bool {
        if self.flushed.swap(true, Ordering::SeqCst) {
            debug!("transcript already flushed");
            return false;
        }

        // Commit any assistant turn left open by an abrupt teardown.
        self.record_turn_complete();

        let log = {
            let mut log = self.log.lock().unwrap();
            if log.end_time.is_none() {
                log.end_time = Some(Utc::now());
            }
            log.clone()
        };

        match &self.sink {
            Some(sink) => match sink.save(&log).await {
                Ok(()) => {
                    debug!(
                        session_id = %log.session_id,
                        messages = log.messages.len(),
                        "transcript delivered"
                    );
                    true
                }
                Err(e) => {
                    warn!("transcript sink rejected log: {}; keeping local record", e);
                    info!("{}", format_session_log(&log));
                    false
                }
            },
            None => {
                info!("{}", format_session_log(&log));
                true
            }
        }
    }

    fn append(&self, role: Role, content: String) {
        let mut log = self.log.lock().unwrap();
        let now = Utc::now();
        // Timestamps are non-decreasing in append order even if the clock
        // steps backwards.
        let timestamp = match log.messages.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        log.messages.push(Message {
            role,
            content,
            timestamp,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> TranscriptRecorder {
        TranscriptRecorder::new("s-1", "u-1", "sam", None)
    }

    #[test]
    fn test_simple_exchange() {
        let r = recorder();
        r.record_user_text("hello");
        r.record_assistant_text("hi there");
        r.record_turn_complete();

        let log = r.snapshot();
        assert_eq!(log.messages.len(), 2);
        assert_eq!(log.messages[0].role, Role::User);
        assert_eq!(log.messages[0].content, "hello");
        assert_eq!(log.messages[1].role, Role::Assistant);
        assert_eq!(log.messages[1].content, "hi there");
    }

    #[test]
    fn test_pure_audio_turn_gets_placeholder() {
        let r = recorder();
        r.record_user_text("play a sound");
        r.record_assistant_audio();
        r.record_turn_complete();

        let log = r.snapshot();
        assert_eq!(log.messages.len(), 2);
        assert_eq!(log.messages[1].content, AUDIO_ONLY_PLACEHOLDER);
    }

    #[test]
    fn test_audio_with_text_keeps_text_only() {
        let r = recorder();
        r.record_assistant_audio();
        r.record_assistant_text("spoken transcript");
        r.record_turn_complete();

        let log = r.snapshot();
        assert_eq!(log.messages.len(), 1);
        assert_eq!(log.messages[0].content, "spoken transcript");
    }

    #[test]
    fn test_empty_turn_boundary_records_nothing() {
        let r = recorder();
        r.record_turn_complete();
        assert_eq!(r.message_count(), 0);
    }

    #[test]
    fn test_consecutive_user_messages_are_preserved() {
        let r = recorder();
        r.record_user_text("first, unanswered");
        r.record_user_text("second");
        r.record_assistant_text("answer");
        r.record_turn_complete();

        let log = r.snapshot();
        assert_eq!(log.messages.len(), 3);
        assert_eq!(log.messages[0].role, Role::User);
        assert_eq!(log.messages[1].role, Role::User);
        assert_eq!(log.messages[2].role, Role::Assistant);
    }

    #[test]
    fn test_message_count_is_sends_plus_texts_plus_placeholders() {
        let r = recorder();
        // N = 2 user sends
        r.record_user_text("one");
        r.record_user_text("two");
        // M = 1 text turn
        r.record_assistant_text("text reply");
        r.record_turn_complete();
        // K = 2 pure-audio turns
        for _ in 0..2 {
            r.record_assistant_audio();
            r.record_turn_complete();
        }
        assert_eq!(r.message_count(), 2 + 1 + 2);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let r = recorder();
        for i in 0..10 {
            r.record_user_text(&format!("m{}", i));
        }
        let log = r.snapshot();
        for pair in log.messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_flush_runs_exactly_once() {
        let r = recorder();
        r.record_user_text("hello");

        assert!(!r.is_flushed());
        assert!(r.flush().await);
        assert!(r.is_flushed());

        // Second flush (the racing teardown path) is a no-op.
        assert!(!r.flush().await);
    }

    #[tokio::test]
    async fn test_flush_commits_open_turn_and_sets_end_time() {
        let r = recorder();
        r.record_user_text("hello");
        r.record_assistant_text("cut off mid-");

        r.flush().await;
        let log = r.snapshot();
        assert_eq!(log.messages.len(), 2);
        assert_eq!(log.messages[1].content, "cut off mid-");
        assert!(log.end_time.is_some());
    }

    #[tokio::test]
    async fn test_flush_with_unreachable_sink_falls_back() {
        let sink = SinkClient::new("http://127.0.0.1:9/log-conversation");
        let r = TranscriptRecorder::new("s-1", "u-1", "sam", Some(sink));
        r.record_user_text("hello");

        // Sink is unreachable: flush reports failure but never errors, and
        // the transcript is still consumed exactly once.
        assert!(!r.flush().await);
        assert!(r.is_flushed());
    }
}
