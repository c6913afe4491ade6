//! Chat completion request and response types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::api::models::MODEL_CHAT;
use crate::client::ClientError;

/// Default completion budget sent when the caller does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Role of the message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::System => "system",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "system" => Ok(Role::System),
            "assistant" => Ok(Role::Assistant),
            other => Err(ClientError::InvalidArgument(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

/// A single chat message.
///
/// Messages sent by the caller are built with [`Message::user`],
/// [`Message::system`] or [`Message::assistant`] and cannot be changed
/// afterwards. Messages received from the server may lack a role (streamed
/// deltas usually do) and may carry `reasoning_content` from reasoning models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "null_as_default")]
    content: String,
    #[serde(
        default,
        deserialize_with = "lenient_role",
        skip_serializing_if = "Option::is_none"
    )]
    role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reasoning_content: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Some(role),
            reasoning_content: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// `None` when the server omitted the role or sent one this crate does not know.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn reasoning_content(&self) -> Option<&str> {
        self.reasoning_content.as_deref()
    }
}

/// Parameters of a chat completion call.
///
/// Whether the call streams is decided by the method used to send it
/// (`chat` or `chat_stream`), never by the caller.
///
/// # Example
/// ```
/// use deepseek::api::{ChatRequest, Message, MODEL_REASONER};
///
/// let request = ChatRequest::new(vec![Message::user("Hello!")])
///     .with_model(MODEL_REASONER)
///     .with_max_tokens(512);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: String,
    /// Between -2.0 and 2.0.
    pub frequency_penalty: f64,
    pub max_tokens: u32,
    /// Between -2.0 and 2.0.
    pub presence_penalty: f64,
    /// Up to 4 sequences.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    pub(crate) stream: bool,
    /// Between 0 and 2.
    pub temperature: f64,
    pub top_p: f64,
    pub logprobs: bool,
    /// Between 0 and 20, only honoured when `logprobs` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            model: MODEL_CHAT.to_string(),
            frequency_penalty: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            presence_penalty: 0.0,
            stop: Vec::new(),
            stream: false,
            temperature: 1.0,
            top_p: 1.0,
            logprobs: false,
            top_logprobs: None,
        }
    }
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = penalty;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    /// Request log probabilities, optionally with the `top` alternatives per token.
    pub fn with_logprobs(mut self, top: Option<u32>) -> Self {
        self.logprobs = true;
        self.top_logprobs = top;
        self
    }

    /// Check the documented parameter ranges.
    ///
    /// Never called implicitly; the server stays the authority on what it
    /// accepts.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.messages.is_empty() {
            return Err(ClientError::InvalidArgument(
                "messages must not be empty".to_string(),
            ));
        }
        check_range("frequency_penalty", self.frequency_penalty, -2.0, 2.0)?;
        check_range("presence_penalty", self.presence_penalty, -2.0, 2.0)?;
        check_range("temperature", self.temperature, 0.0, 2.0)?;
        check_range("top_p", self.top_p, 0.0, 1.0)?;
        if self.stop.len() > 4 {
            return Err(ClientError::InvalidArgument(format!(
                "stop accepts at most 4 sequences, got {}",
                self.stop.len()
            )));
        }
        if let Some(top) = self.top_logprobs {
            if top > 20 {
                return Err(ClientError::InvalidArgument(format!(
                    "top_logprobs must be between 0 and 20, got {top}"
                )));
            }
            if !self.logprobs {
                return Err(ClientError::InvalidArgument(
                    "top_logprobs requires logprobs to be enabled".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), ClientError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ClientError::InvalidArgument(format!(
            "{name} must be between {min} and {max}, got {value}"
        )))
    }
}

/// One candidate output.
///
/// Non-streaming responses fill `message`, streamed frames fill `delta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Logprobs>,
}

impl Choice {
    /// The delta if present, otherwise the complete message.
    pub fn payload(&self) -> Option<&Message> {
        self.delta.as_ref().or(self.message.as_ref())
    }

    pub fn content(&self) -> Option<&str> {
        self.payload().map(Message::content)
    }
}

/// Log probability information of a choice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Logprobs {
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<TokenLogprob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub top_logprobs: Vec<TopLogprob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopLogprob {
    pub token: String,
    pub logprob: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
}

/// Response body of `/chat/completions`, and of every streamed frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub model: String,
    /// Unix seconds.
    pub created: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

impl ChatResponse {
    pub fn first_choice(&self) -> Option<&Choice> {
        self.choices.first()
    }
}

/// Token accounting. `total_tokens` is reported by the server, not recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub completion_tokens: u64,
    pub prompt_tokens: u64,
    pub total_tokens: u64,
    pub prompt_cache_hit_tokens: u64,
    pub prompt_cache_miss_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionTokensDetails {
    pub reasoning_tokens: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|role| role.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_factories_round_trip() {
        for (message, role) in [
            (Message::user("a"), "user"),
            (Message::system("b"), "system"),
            (Message::assistant("c"), "assistant"),
        ] {
            let value = serde_json::to_value(&message).unwrap();
            assert_eq!(value["role"], role);

            let back: Message = serde_json::from_value(value).unwrap();
            assert_eq!(back, message);
            assert_eq!(back.role().map(|r| r.as_str()), Some(role));
        }
    }

    #[test]
    fn test_request_serializes_snake_case_with_defaults() {
        let request = ChatRequest::new(vec![Message::user("Hi")]);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "messages": [{"content": "Hi", "role": "user"}],
                "model": "deepseek-chat",
                "frequency_penalty": 0.0,
                "max_tokens": 4096,
                "presence_penalty": 0.0,
                "stream": false,
                "temperature": 1.0,
                "top_p": 1.0,
                "logprobs": false
            })
        );
    }

    #[test]
    fn test_request_optional_fields() {
        let request = ChatRequest::new(vec![Message::system("Be terse"), Message::user("Hi")])
            .with_stop(vec!["\n\n".to_string()])
            .with_logprobs(Some(5));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["stop"], json!(["\n\n"]));
        assert_eq!(value["logprobs"], json!(true));
        assert_eq!(value["top_logprobs"], json!(5));
        assert_eq!(value["messages"][0]["role"], "system");
    }

    #[test]
    fn test_validate_ranges() {
        let base = ChatRequest::new(vec![Message::user("Hi")]);
        assert!(base.validate().is_ok());

        assert!(ChatRequest::default().validate().is_err());
        assert!(base.clone().with_frequency_penalty(2.5).validate().is_err());
        assert!(base.clone().with_presence_penalty(-2.0).validate().is_ok());
        assert!(base.clone().with_temperature(f64::NAN).validate().is_err());
        assert!(base.clone().with_top_p(1.5).validate().is_err());
        assert!(base
            .clone()
            .with_stop(vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()])
            .validate()
            .is_err());
        assert!(base.clone().with_logprobs(Some(21)).validate().is_err());
    }

    #[test]
    fn test_top_logprobs_requires_logprobs() {
        let mut request = ChatRequest::new(vec![Message::user("Hi")]).with_logprobs(Some(3));
        assert!(request.validate().is_ok());

        request.logprobs = false;
        let err = request.validate().unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert!(err.to_string().contains("requires logprobs"));
    }

    #[test]
    fn test_deserialize_completion() {
        let body = json!({
            "id": "930c60df-bf64-41c9-a88e-3ec75f81e00e",
            "object": "chat.completion",
            "created": 1705651092,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello! How can I help you today?"},
                "logprobs": null,
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 16,
                "completion_tokens": 10,
                "total_tokens": 26,
                "prompt_cache_hit_tokens": 0,
                "prompt_cache_miss_tokens": 16
            },
            "system_fingerprint": "fp_123"
        });

        let response: ChatResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.created, 1705651092);
        assert_eq!(response.choices.len(), 1);

        let choice = response.first_choice().unwrap();
        assert!(choice.delta.is_none());
        assert_eq!(choice.content(), Some("Hello! How can I help you today?"));
        assert_eq!(choice.finish_reason.as_deref(), Some("stop"));
        assert_eq!(choice.payload().unwrap().role(), Some(Role::Assistant));

        let usage = response.usage.unwrap();
        assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
        assert_eq!(usage.prompt_cache_miss_tokens, 16);
    }

    #[test]
    fn test_deserialize_stream_delta() {
        let frame = json!({
            "id": "1",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "deepseek-reasoner",
            "choices": [{"index": 0, "delta": {"content": null, "reasoning_content": "Hmm"}, "finish_reason": null}]
        });

        let response: ChatResponse = serde_json::from_value(frame).unwrap();
        let choice = &response.choices[0];
        let delta = choice.delta.as_ref().unwrap();
        assert_eq!(delta.content(), "");
        assert_eq!(delta.role(), None);
        assert_eq!(delta.reasoning_content(), Some("Hmm"));
        assert!(choice.message.is_none());
    }

    #[test]
    fn test_unknown_role_is_none() {
        let message: Message =
            serde_json::from_value(json!({"role": "tool", "content": "x"})).unwrap();
        assert_eq!(message.role(), None);
        assert_eq!(message.content(), "x");
    }

    #[test]
    fn test_deserialize_logprobs() {
        let choice: Choice = serde_json::from_value(json!({
            "index": 0,
            "delta": {"content": "Hi"},
            "logprobs": {"content": [{
                "token": "Hi",
                "logprob": -0.25,
                "bytes": [72, 105],
                "top_logprobs": [{"token": "Hello", "logprob": -1.5, "bytes": null}]
            }]}
        }))
        .unwrap();

        let logprobs = choice.logprobs.unwrap();
        assert_eq!(logprobs.content[0].bytes.as_deref(), Some(&[72u8, 105][..]));
        assert_eq!(logprobs.content[0].top_logprobs[0].token, "Hello");
        assert_eq!(logprobs.content[0].logprob, -0.25);
    }

    #[test]
    fn test_missing_choices_and_usage() {
        let response: ChatResponse = serde_json::from_str(r#"{"id":"x","choices":null}"#).unwrap();
        assert!(response.choices.is_empty());
        assert!(response.usage.is_none());
    }
}
