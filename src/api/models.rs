//! Model listing types.

use serde::{Deserialize, Serialize};

/// General purpose chat model.
pub const MODEL_CHAT: &str = "deepseek-chat";

/// Reasoning model; its messages carry `reasoning_content`.
pub const MODEL_REASONER: &str = "deepseek-reasoner";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub owned_by: String,
}

/// Response body of `/models`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelResponse {
    pub object: String,
    pub data: Vec<Model>,
}

impl ModelResponse {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.data.iter().map(|model| model.id.as_str())
    }
}
