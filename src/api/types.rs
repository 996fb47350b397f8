use crate::session::{Message, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    /// DashScope compatible-mode extensions; ignored by other providers
    pub result_format: &'static str,
    pub incremental_output: bool,
}

impl<'a> ChatRequest<'a> {
    pub fn streaming(model: &'a str, messages: &'a [ChatMessage]) -> Self {
        Self {
            model,
            messages,
            stream: true,
            result_format: "message",
            incremental_output: true,
        }
    }
}

// Streaming types
#[derive(Debug, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Set when the provider reports a failure mid-stream.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatChunk {
    /// The provider's error message, if this chunk reports one.
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        Some(message)
    }

    /// Text carried by the first choice, if any.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
    }
}
