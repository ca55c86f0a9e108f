//! Turn lifecycle state machine.

use std::fmt;

/// Where the session stands in the user/assistant turn exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnState {
    /// No turn in flight.
    #[default]
    Idle,
    /// A user turn went out without a completion flag.
    UserTurnSent,
    /// The user turn is complete; the assistant has not started responding.
    AwaitingResponse,
    /// Assistant output (text, audio, or tool calls) is streaming in.
    AssistantStreaming,
    /// The service preempted its own response because the user began
    /// speaking. Resolves on the next turn boundary.
    Interrupted,
}

impl TurnState {
    /// Returns true while an assistant response is expected or streaming.
    pub fn is_assistant_active(&self) -> bool {
        matches!(
            self,
            TurnState::AwaitingResponse | TurnState::AssistantStreaming
        )
    }

    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::UserTurnSent => "user_turn_sent",
            TurnState::AwaitingResponse => "awaiting_response",
            TurnState::AssistantStreaming => "assistant_streaming",
            TurnState::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the turn state machine and outstanding tool calls.
///
/// A tool call received mid-response keeps the turn open: a completion
/// signal only returns the machine to `Idle` once every outstanding call
/// has received its response.
#[derive(Debug, Default)]
pub struct TurnTracker {
    state: TurnState,
    pending_calls: Vec<String>,
}

impl TurnTracker {
    /// Creates a tracker in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// IDs of tool calls still awaiting a response.
    pub fn pending_tool_calls(&self) -> &[String] {
        &self.pending_calls
    }

    /// Resets to idle, dropping any pending calls. Used when a connection
    /// is (re)established.
    pub fn reset(&mut self) {
        self.state = TurnState::Idle;
        self.pending_calls.clear();
    }

    /// A user turn was accepted for transmission.
    pub fn on_user_turn(&mut self, turn_complete: bool) {
        self.state = if turn_complete {
            TurnState::AwaitingResponse
        } else {
            TurnState::UserTurnSent
        };
    }

    /// Assistant content (text or audio) arrived.
    pub fn on_model_content(&mut self) {
        self.state = TurnState::AssistantStreaming;
    }

    /// The service requested function invocations; the turn stays open.
    pub fn on_tool_call<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.pending_calls.extend(ids);
        self.state = TurnState::AssistantStreaming;
    }

    /// The service withdrew calls it no longer wants answered.
    pub fn on_tool_call_cancellation(&mut self, ids: &[String]) {
        self.pending_calls.retain(|id| !ids.contains(id));
    }

    /// A tool response was sent. Returns false when the ID matched no
    /// outstanding call (a reportable, non-fatal condition).
    pub fn on_tool_response(&mut self, id: &str) -> bool {
        let before = self.pending_calls.len();
        self.pending_calls.retain(|c| c != id);
        self.pending_calls.len() != before
    }

    /// The service signalled the end of its turn. Returns true when the
    /// machine advanced to idle; false when outstanding tool calls keep the
    /// turn open.
    pub fn on_turn_complete(&mut self) -> bool {
        if self.pending_calls.is_empty() {
            self.state = TurnState::Idle;
            true
        } else {
            false
        }
    }

    /// The service preempted its in-progress response.
    pub fn on_interrupted(&mut self) {
        self.state = TurnState::Interrupted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_exchange() {
        let mut t = TurnTracker::new();
        assert_eq!(t.state(), TurnState::Idle);

        t.on_user_turn(true);
        assert_eq!(t.state(), TurnState::AwaitingResponse);

        t.on_model_content();
        assert_eq!(t.state(), TurnState::AssistantStreaming);

        assert!(t.on_turn_complete());
        assert_eq!(t.state(), TurnState::Idle);
    }

    #[test]
    fn test_incomplete_user_turn() {
        let mut t = TurnTracker::new();
        t.on_user_turn(false);
        assert_eq!(t.state(), TurnState::UserTurnSent);

        t.on_user_turn(true);
        assert_eq!(t.state(), TurnState::AwaitingResponse);
    }

    #[test]
    fn test_tool_call_holds_turn_open() {
        let mut t = TurnTracker::new();
        t.on_user_turn(true);
        t.on_tool_call(vec!["abc".to_string()]);
        assert_eq!(t.state(), TurnState::AssistantStreaming);

        // Completion without the tool response does not resolve the turn.
        assert!(!t.on_turn_complete());
        assert_eq!(t.state(), TurnState::AssistantStreaming);
        assert_eq!(t.pending_tool_calls(), ["abc"]);

        // Exactly one matching response resolves it.
        assert!(t.on_tool_response("abc"));
        assert!(t.on_turn_complete());
        assert_eq!(t.state(), TurnState::Idle);
    }

    #[test]
    fn test_unmatched_tool_response_is_reported() {
        let mut t = TurnTracker::new();
        t.on_tool_call(vec!["abc".to_string()]);
        assert!(!t.on_tool_response("xyz"));
        assert_eq!(t.pending_tool_calls(), ["abc"]);
    }

    #[test]
    fn test_tool_call_cancellation_releases_turn() {
        let mut t = TurnTracker::new();
        t.on_user_turn(true);
        t.on_tool_call(vec!["abc".to_string(), "def".to_string()]);

        t.on_tool_call_cancellation(&["abc".to_string()]);
        assert_eq!(t.pending_tool_calls(), ["def"]);

        t.on_tool_call_cancellation(&["def".to_string()]);
        assert!(t.on_turn_complete());
        assert_eq!(t.state(), TurnState::Idle);
    }

    #[test]
    fn test_interruption_path() {
        let mut t = TurnTracker::new();
        t.on_user_turn(true);
        t.on_model_content();
        t.on_interrupted();
        assert_eq!(t.state(), TurnState::Interrupted);

        // The boundary after an interruption returns to idle.
        assert!(t.on_turn_complete());
        assert_eq!(t.state(), TurnState::Idle);
    }

    #[test]
    fn test_reset_clears_pending_calls() {
        let mut t = TurnTracker::new();
        t.on_tool_call(vec!["abc".to_string()]);
        t.reset();
        assert_eq!(t.state(), TurnState::Idle);
        assert!(t.pending_tool_calls().is_empty());
    }

    #[test]
    fn test_spontaneous_assistant_turn() {
        // With server-side voice detection the user "turn" is realtime audio
        // only, so assistant content can arrive straight from idle.
        let mut t = TurnTracker::new();
        t.on_model_content();
        assert_eq!(t.state(), TurnState::AssistantStreaming);
        assert!(t.on_turn_complete());
    }
}
