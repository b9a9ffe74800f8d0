//! Request data models exchanged with the frontend

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

//
// ================= Content =================
//

/// One part of a message. Only `type == "text"` parts carry text the agent sees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    #[serde(default)]
    pub status: Map<String, Value>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
            status: Map::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }
}

//
// ================= Conversation =================
//

/// A prior turn of the conversation as the frontend recorded it.
///
/// `role` is kept as the raw string so that unexpected roles pass validation
/// and are simply skipped during memory reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: Vec<ContentPart>) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }

    /// Concatenate every text part, in order, with no separator.
    pub fn collapsed_text(&self) -> String {
        self.content
            .iter()
            .filter(|part| part.is_text())
            .map(|part| part.text.as_str())
            .collect()
    }
}

//
// ================= Chat Request =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: Vec<ContentPart>,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl ChatRequest {
    /// The user's prompt: all text parts of `message`, space-joined.
    pub fn prompt_text(&self) -> String {
        self.message
            .iter()
            .filter(|part| part.is_text())
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
