//! Type definitions for the live service wire protocol.

use serde::{Deserialize, Serialize};
use serde_json::json;

// ============================================================================
// Models
// ============================================================================

/// Default realtime model.
pub const MODEL_GEMINI_20_FLASH_EXP: &str = "models/gemini-2.0-flash-exp";

// ============================================================================
// Voices
// ============================================================================

pub const VOICE_AOEDE: &str = "Aoede";
pub const VOICE_CHARON: &str = "Charon";
pub const VOICE_EOS: &str = "Eos";
pub const VOICE_FENRIR: &str = "Fenrir";
pub const VOICE_KORE: &str = "Kore";
pub const VOICE_PUCK: &str = "Puck";

// ============================================================================
// Modalities
// ============================================================================

pub const MODALITY_AUDIO: &str = "audio";
pub const MODALITY_TEXT: &str = "text";

// ============================================================================
// Session configuration
// ============================================================================

/// Configuration for one connect attempt. Immutable once connected; changing
/// anything requires a fresh connect.
///
/// The identity fields are first-class client-side state and never go on the
/// wire; downstream consumers (transcript, context fetch) read them from
/// here instead of parsing them back out of instruction prose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveConfig {
    /// Model identifier, e.g. `models/gemini-2.0-flash-exp`. Required.
    pub model: String,

    /// Generation parameters (modality, voice, sampling).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,

    /// System instruction content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    /// Declared tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,

    /// Stable user identifier. Client-side only.
    #[serde(skip)]
    pub user_id: String,

    /// Display name of the user. Client-side only.
    #[serde(skip)]
    pub username: String,
}

impl LiveConfig {
    /// Creates a config for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Sets the identity fields.
    pub fn with_identity(mut self, user_id: impl Into<String>, username: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self.username = username.into();
        self
    }

    /// Sets an audio response modality with the given prebuilt voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        let config = self.generation_config.get_or_insert_with(Default::default);
        config.response_modalities = Some(MODALITY_AUDIO.to_string());
        config.speech_config = Some(SpeechConfig::prebuilt_voice(voice));
        self
    }

    /// Sets the system instruction to a single text part.
    pub fn with_instruction_text(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(Content {
            role: None,
            parts: vec![Part::text(text)],
        });
        self
    }

    /// Adds a tool declaration.
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Returns the system instruction text, if a text part exists.
    pub fn instruction_text(&self) -> Option<&str> {
        self.system_instruction
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.as_deref())
    }

    /// Replaces the system instruction text in place, keeping other parts.
    pub fn set_instruction_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.system_instruction.as_mut() {
            Some(content) => {
                if let Some(part) = content.parts.iter_mut().find(|p| p.text.is_some()) {
                    part.text = Some(text);
                } else {
                    content.parts.push(Part::text(text));
                }
            }
            None => {
                self.system_instruction = Some(Content {
                    role: None,
                    parts: vec![Part::text(text)],
                });
            }
        }
    }
}

/// Generation parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Response modality, e.g. `audio` or `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<String>,

    /// Voice selection for audio responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Maximum output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_config: Option<VoiceConfig>,
}

impl SpeechConfig {
    /// Creates a speech config selecting a prebuilt voice by name.
    pub fn prebuilt_voice(name: impl Into<String>) -> Self {
        Self {
            voice_config: Some(VoiceConfig {
                prebuilt_voice_config: Some(PrebuiltVoiceConfig {
                    voice_name: name.into(),
                }),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prebuilt_voice_config: Option<PrebuiltVoiceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

// ============================================================================
// Content
// ============================================================================

/// One turn of content attributed to a role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Part>,
}

impl Content {
    /// Creates a user turn from parts.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// Creates a model turn from parts.
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts,
        }
    }

    /// Concatenates the text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// One part of a content turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Inline binary payload (base64), e.g. audio frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// Base64 binary payload with a mime type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

// ============================================================================
// Tools
// ============================================================================

/// A tool declaration offered to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Built-in web search, declared as an empty object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_search: Option<serde_json::Value>,

    /// Function declarations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_declarations: Vec<FunctionDeclaration>,
}

impl Tool {
    /// Declares the built-in search tool.
    pub fn google_search() -> Self {
        Self {
            google_search: Some(json!({})),
            ..Default::default()
        }
    }

    /// Declares a set of callable functions.
    pub fn functions(declarations: Vec<FunctionDeclaration>) -> Self {
        Self {
            function_declarations: declarations,
            ..Default::default()
        }
    }
}

/// Declaration of one callable function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// A function invocation requested by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// The client's reply to one function call. Every call must receive exactly
/// one matching response before its turn can resolve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub response: serde_json::Value,
}

impl FunctionResponse {
    /// Creates a successful response.
    pub fn ok(id: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: None,
            response: json!({ "output": output }),
        }
    }

    /// Creates an error-shaped response; failed tool calls are reported back
    /// to the service rather than dropped.
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            response: json!({ "error": message.into() }),
        }
    }
}
