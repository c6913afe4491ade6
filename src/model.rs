//! Provider-agnostic chat types used by the [`Client`](crate::client::Client)
//! and [`StreamingClient`](crate::client::StreamingClient) traits.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    System,
    Assistant,
    Tool,
}

/// A piece of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Part {
    Text(String),
    /// Reference to non-text content. Text-only providers do not send
    /// messages that contain one.
    Media { mime_type: String, uri: String },
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,

    /// Provider-specific extras (e.g. log probabilities)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<HashMap<String, Value>>,
}

impl Message {
    /// A message with a single text part.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(content.into())],
            additional_properties: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Whether any part is non-text content.
    pub fn has_media(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, Part::Media { .. }))
    }

    /// Concatenation of all text parts.
    pub fn content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::Media { .. } => None,
            })
            .join("")
    }
}

/// Reason for finishing the response generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,

    /// Provider-specific counters keyed by name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub additional_counts: HashMap<String, u64>,
}

/// Provider-agnostic response structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub id: Option<String>,

    pub model: Option<String>,

    pub created_at: Option<DateTime<Utc>>,

    /// Generated messages (typically one assistant message)
    pub messages: Vec<Message>,

    pub finish: Option<FinishReason>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Response {
    /// Text of all generated messages.
    pub fn text(&self) -> String {
        self.messages.iter().map(Message::content).join("")
    }
}

/// One incremental update of a streamed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamChunk {
    /// Shared by every update of the same response
    pub response_id: String,

    pub role: Role,

    pub content: Option<String>,

    pub finish: Option<FinishReason>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<HashMap<String, Value>>,
}

/// Describes the provider behind a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientMetadata {
    pub provider_name: String,
    pub provider_uri: String,
    pub default_model_id: Option<String>,
}
