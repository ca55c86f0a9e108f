//! Wire message shapes and inbound classification.
//!
//! The remote protocol is a fixed external contract; the shapes here mirror
//! it one-to-one. Inbound frames classify into exactly one
//! [`ServerMessage`] variant, with anything unrecognized landing in
//! `Unknown` — logged by the caller, never fatal.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Content, FunctionCall, FunctionResponse, LiveConfig};

// ============================================================================
// Client → server
// ============================================================================

/// Messages sent by the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Initial session configuration; must be the first message on the wire
    /// and is sent exactly once per connection.
    Setup(LiveConfig),

    /// Streaming media chunks (fire-and-forget, no acknowledgement).
    RealtimeInput(RealtimeInput),

    /// A structured user turn.
    ClientContent(ClientContent),

    /// Responses to outstanding tool calls.
    ToolResponse(ToolResponsePayload),
}

/// Payload of a `realtimeInput` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

/// One base64 media chunk with its mime descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

/// Payload of a `clientContent` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

/// Payload of a `toolResponse` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponsePayload {
    pub function_responses: Vec<FunctionResponse>,
}

// ============================================================================
// Server → client
// ============================================================================

/// Classified inbound message.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// The service acknowledged the setup message.
    SetupComplete,
    /// Model output, turn completion, or an interruption signal.
    Content(ServerContent),
    /// The service requests one or more function invocations.
    ToolCall(ToolCallPayload),
    /// The service withdrew previously issued tool calls.
    ToolCallCancellation(ToolCallCancellation),
    /// Anything this client does not recognize. Ignored with a diagnostic.
    Unknown,
}

/// Payload of a `serverContent` message. The three fields are not mutually
/// exclusive on the wire; a single frame may carry a model turn and a
/// completion flag together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub interrupted: Option<bool>,
}

/// Payload of a `toolCall` message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

/// Payload of a `toolCallCancellation` message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallCancellation {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Classifies one inbound frame.
///
/// Returns `Err` only when the frame is not JSON at all; a JSON frame whose
/// shape is unrecognized classifies as [`ServerMessage::Unknown`].
pub fn parse_server_message(text: &str) -> Result<ServerMessage> {
    let raw: serde_json::Value = serde_json::from_str(text)?;

    if raw.get("setupComplete").is_some() {
        return Ok(ServerMessage::SetupComplete);
    }
    if let Some(content) = raw.get("serverContent") {
        let content: ServerContent = serde_json::from_value(content.clone())?;
        return Ok(ServerMessage::Content(content));
    }
    if let Some(tool_call) = raw.get("toolCall") {
        let payload: ToolCallPayload = serde_json::from_value(tool_call.clone())?;
        return Ok(ServerMessage::ToolCall(payload));
    }
    if let Some(cancellation) = raw.get("toolCallCancellation") {
        let payload: ToolCallCancellation = serde_json::from_value(cancellation.clone())?;
        return Ok(ServerMessage::ToolCallCancellation(payload));
    }

    Ok(ServerMessage::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LiveConfig, Part};
    use serde_json::json;

    #[test]
    fn test_setup_message_shape() {
        let config = LiveConfig::new("models/gemini-2.0-flash-exp");
        let msg = ClientMessage::Setup(config);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["setup"]["model"], "models/gemini-2.0-flash-exp");
    }

    #[test]
    fn test_realtime_input_shape() {
        let msg = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: "audio/pcm;rate=16000".to_string(),
                data: "AAAA".to_string(),
            }],
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value["realtimeInput"]["mediaChunks"][0]["mimeType"],
            "audio/pcm;rate=16000"
        );
        assert_eq!(value["realtimeInput"]["mediaChunks"][0]["data"], "AAAA");
    }

    #[test]
    fn test_client_content_shape() {
        let msg = ClientMessage::ClientContent(ClientContent {
            turns: vec![Content::user(vec![Part::text("hello")])],
            turn_complete: true,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["clientContent"]["turnComplete"], true);
        assert_eq!(value["clientContent"]["turns"][0]["role"], "user");
        assert_eq!(
            value["clientContent"]["turns"][0]["parts"][0]["text"],
            "hello"
        );
    }

    #[test]
    fn test_tool_response_shape() {
        let msg = ClientMessage::ToolResponse(ToolResponsePayload {
            function_responses: vec![FunctionResponse::ok("abc", json!("done"))],
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["toolResponse"]["functionResponses"][0]["id"], "abc");
    }

    #[test]
    fn test_classify_setup_complete() {
        let msg = parse_server_message(r#"{"setupComplete":{}}"#).unwrap();
        assert!(matches!(msg, ServerMessage::SetupComplete));
    }

    #[test]
    fn test_classify_model_turn() {
        let frame = r#"{"serverContent":{"modelTurn":{"parts":[{"text":"hi there"}]}}}"#;
        let msg = parse_server_message(frame).unwrap();
        match msg {
            ServerMessage::Content(content) => {
                let turn = content.model_turn.unwrap();
                assert_eq!(turn.text(), "hi there");
                assert_eq!(content.turn_complete, None);
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_audio_part() {
        let frame = r#"{"serverContent":{"modelTurn":{"parts":[{"inlineData":{"mimeType":"audio/pcm;rate=24000","data":"AAAA"}}]}}}"#;
        let msg = parse_server_message(frame).unwrap();
        match msg {
            ServerMessage::Content(content) => {
                let turn = content.model_turn.unwrap();
                let blob = turn.parts[0].inline_data.as_ref().unwrap();
                assert_eq!(blob.mime_type, "audio/pcm;rate=24000");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_interrupted_and_turn_complete() {
        let msg = parse_server_message(r#"{"serverContent":{"interrupted":true}}"#).unwrap();
        match msg {
            ServerMessage::Content(content) => assert_eq!(content.interrupted, Some(true)),
            other => panic!("unexpected classification: {:?}", other),
        }

        let msg = parse_server_message(r#"{"serverContent":{"turnComplete":true}}"#).unwrap();
        match msg {
            ServerMessage::Content(content) => assert_eq!(content.turn_complete, Some(true)),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_tool_call() {
        let frame = r#"{"toolCall":{"functionCalls":[{"id":"abc","name":"lookup","args":{"q":"bass"}}]}}"#;
        let msg = parse_server_message(frame).unwrap();
        match msg {
            ServerMessage::ToolCall(payload) => {
                assert_eq!(payload.function_calls.len(), 1);
                assert_eq!(payload.function_calls[0].id, "abc");
                assert_eq!(payload.function_calls[0].name, "lookup");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_tool_call_cancellation() {
        let frame = r#"{"toolCallCancellation":{"ids":["abc","def"]}}"#;
        let msg = parse_server_message(frame).unwrap();
        match msg {
            ServerMessage::ToolCallCancellation(payload) => {
                assert_eq!(payload.ids, vec!["abc", "def"]);
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_shape_is_unknown_not_error() {
        let msg = parse_server_message(r#"{"usageMetadata":{"totalTokens":12}}"#).unwrap();
        assert!(matches!(msg, ServerMessage::Unknown));
    }

    #[test]
    fn test_non_json_is_an_error() {
        assert!(parse_server_message("not json").is_err());
    }
}
