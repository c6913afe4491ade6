//! DeepSeek wire types.
//!
//! Field names follow the API's snake_case JSON; unknown fields are ignored.

pub mod chat;
pub mod error;
pub mod models;

pub use chat::{ChatRequest, ChatResponse, Choice, Logprobs, Message, Role, Usage};
pub use models::{Model, ModelResponse, MODEL_CHAT, MODEL_REASONER};
