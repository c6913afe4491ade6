//! DeepSeek implementation of the generic [`Client`] and [`StreamingClient`]
//! traits.
//!
//! This is a pure translation layer over [`DeepSeekClient`]: it maps generic
//! messages and options onto a [`ChatRequest`] and maps choices back. Errors
//! from the underlying call are wrapped in [`ClientError::RequestFailed`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::chat::{ChatRequest, ChatResponse, Choice};
use crate::api::models::MODEL_CHAT;
use crate::api::{self, Usage as ApiUsage};
use crate::client::{Client, ClientError, StreamingClient};
use crate::deepseek::DeepSeekClient;
use crate::model::{ClientMetadata, FinishReason, Message, Response, Role, StreamChunk, Usage};
use crate::options::ChatOptions;

const PROVIDER_NAME: &str = "deepseek";

/// Key of the log probabilities in `additional_properties`, both in
/// [`ChatOptions`] (a bool) and on returned messages (the JSON detail).
pub const LOGPROBS_KEY: &str = "logprobs";

/// Key of the requested number of alternatives in [`ChatOptions`].
pub const TOP_LOGPROBS_KEY: &str = "top_logprobs";

/// DeepSeek behind the provider-agnostic client traits.
#[derive(Debug, Clone)]
pub struct DeepSeekChatClient {
    client: DeepSeekClient,
    metadata: ClientMetadata,
}

impl DeepSeekChatClient {
    pub fn new(client: DeepSeekClient) -> Self {
        let metadata = ClientMetadata {
            provider_name: PROVIDER_NAME.to_string(),
            provider_uri: client.base_url().to_string(),
            default_model_id: Some(MODEL_CHAT.to_string()),
        };
        Self { client, metadata }
    }

    /// The wrapped native client.
    pub fn inner(&self) -> &DeepSeekClient {
        &self.client
    }

    /// Mutable access to the wrapped client, e.g. to change its timeout.
    pub fn inner_mut(&mut self) -> &mut DeepSeekClient {
        &mut self.client
    }
}

impl From<DeepSeekClient> for DeepSeekChatClient {
    fn from(client: DeepSeekClient) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl Client for DeepSeekChatClient {
    async fn request(
        &self,
        messages: Vec<Message>,
        options: Option<&ChatOptions>,
    ) -> Result<Response, ClientError> {
        let request = chat_request(messages, options);
        let response = self
            .client
            .chat(request)
            .await
            .map_err(|e| ClientError::RequestFailed(Box::new(e)))?;

        Ok(response.into())
    }

    fn metadata(&self) -> &ClientMetadata {
        &self.metadata
    }
}

#[async_trait]
impl StreamingClient for DeepSeekChatClient {
    async fn request_stream(
        &self,
        messages: Vec<Message>,
        options: Option<&ChatOptions>,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<StreamChunk, ClientError>>, ClientError> {
        let request = chat_request(messages, options);
        let mut choices = self
            .client
            .chat_stream(request, cancel)
            .await
            .map_err(|e| ClientError::RequestFailed(Box::new(e)))?;

        let response_id = Uuid::new_v4().simple().to_string();
        let updates = async_stream::stream! {
            while let Some(choice) = choices.next().await {
                yield choice.map(|choice| stream_chunk(choice, &response_id));
            }
        };

        Ok(Box::pin(updates))
    }
}

/// Build the native request. Options only override the fields they set.
pub(crate) fn chat_request(messages: Vec<Message>, options: Option<&ChatOptions>) -> ChatRequest {
    let mut request = ChatRequest::new(messages.iter().filter_map(native_message).collect());

    let Some(options) = options else {
        return request;
    };

    if let Some(model) = &options.model_id {
        request.model = model.clone();
    }
    if let Some(penalty) = options.frequency_penalty {
        request.frequency_penalty = penalty;
    }
    if let Some(max_tokens) = options.max_output_tokens {
        request.max_tokens = max_tokens;
    }
    if let Some(penalty) = options.presence_penalty {
        request.presence_penalty = penalty;
    }
    if let Some(stop) = &options.stop_sequences {
        request.stop = stop.clone();
    }
    if let Some(temperature) = options.temperature {
        request.temperature = temperature;
    }
    if let Some(top_p) = options.top_p {
        request.top_p = top_p;
    }
    if let Some(logprobs) = options
        .additional_property(LOGPROBS_KEY)
        .and_then(|v| v.as_bool())
    {
        request.logprobs = logprobs;
    }
    if let Some(top) = options
        .additional_property(TOP_LOGPROBS_KEY)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
    {
        request.top_logprobs = Some(top);
    }

    request
}

/// Tool messages, messages carrying media and messages without text are not
/// sent: the chat endpoint only accepts text.
fn native_message(message: &Message) -> Option<api::Message> {
    if message.has_media() {
        return None;
    }

    let text = message.content();
    if text.trim().is_empty() {
        return None;
    }

    match message.role {
        Role::User => Some(api::Message::user(text)),
        Role::Assistant => Some(api::Message::assistant(text)),
        Role::System => Some(api::Message::system(text)),
        Role::Tool => None,
    }
}

/// Anything but `user` or `system`, including a missing role, is the assistant.
fn generic_role(role: Option<api::Role>) -> Role {
    match role {
        Some(api::Role::User) => Role::User,
        Some(api::Role::System) => Role::System,
        Some(api::Role::Assistant) | None => Role::Assistant,
    }
}

fn finish_reason(reason: Option<&str>) -> Option<FinishReason> {
    match reason? {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "content_filter" => Some(FinishReason::ContentFilter),
        "tool_calls" => Some(FinishReason::ToolCalls),
        _ => None,
    }
}

fn logprobs_properties(choice: &Choice) -> Option<HashMap<String, serde_json::Value>> {
    let logprobs = serde_json::to_value(choice.logprobs.as_ref()?).ok()?;
    Some(HashMap::from([(LOGPROBS_KEY.to_string(), logprobs)]))
}

fn generic_message(choice: &Choice) -> Message {
    let payload = choice.payload();
    let mut message = Message::text(
        generic_role(payload.and_then(api::Message::role)),
        payload.map(api::Message::content).unwrap_or_default(),
    );
    message.additional_properties = logprobs_properties(choice);
    message
}

fn stream_chunk(choice: Choice, response_id: &str) -> StreamChunk {
    let payload = choice.payload();
    StreamChunk {
        response_id: response_id.to_string(),
        role: generic_role(payload.and_then(api::Message::role)),
        content: payload.map(|m| m.content().to_string()),
        finish: finish_reason(choice.finish_reason.as_deref()),
        additional_properties: logprobs_properties(&choice),
    }
}

impl From<&ApiUsage> for Usage {
    fn from(usage: &ApiUsage) -> Self {
        Usage {
            input_tokens: Some(usage.prompt_tokens),
            output_tokens: Some(usage.completion_tokens),
            total_tokens: Some(usage.total_tokens),
            additional_counts: HashMap::from([
                (
                    "prompt_cache_hit_tokens".to_string(),
                    usage.prompt_cache_hit_tokens,
                ),
                (
                    "prompt_cache_miss_tokens".to_string(),
                    usage.prompt_cache_miss_tokens,
                ),
            ]),
        }
    }
}

impl From<ChatResponse> for Response {
    fn from(response: ChatResponse) -> Self {
        let first = response.choices.first();

        Response {
            id: Some(response.id.clone()),
            model: Some(response.model.clone()),
            created_at: DateTime::<Utc>::from_timestamp(response.created, 0),
            messages: first.map(generic_message).into_iter().collect(),
            finish: first.and_then(|c| finish_reason(c.finish_reason.as_deref())),
            usage: response.usage.as_ref().map(Usage::from),
        }
    }
}
