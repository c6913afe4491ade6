//! Core client traits and error types.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::api::error::{ApiError, ErrorResponse};
use crate::model::{ClientMetadata, Message, Response, StreamChunk};
use crate::options::ChatOptions;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A precondition on an argument was violated.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timed out after {0:?} waiting for response headers")]
    Timeout(Duration),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A server-sent event could not be decoded.
    #[error("Invalid stream frame: {0}")]
    InvalidFrame(String),

    #[error("Stream cancelled")]
    StreamCancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    /// Raised by the chat-client adapter when the underlying call failed.
    #[error("Failed to get response: {0}")]
    RequestFailed(#[source] Box<ClientError>),
}

impl ClientError {
    /// Whether this is a non-success HTTP status reported by the server.
    pub fn is_status(&self) -> bool {
        matches!(self, ClientError::Status { .. })
    }

    /// Whether this is a decode failure of a body or a stream frame.
    pub fn is_decode(&self) -> bool {
        matches!(self, ClientError::Parse(_) | ClientError::InvalidFrame(_))
    }

    /// HTTP status carried by this error, looking through adapter wrapping.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            ClientError::RequestFailed(inner) => inner.status(),
            _ => None,
        }
    }

    /// Best-effort structured view of the server's error body.
    ///
    /// The raw body is always kept in [`ClientError::Status`]; this only
    /// succeeds when it matches the `{"error": {...}}` envelope.
    pub fn api_error(&self) -> Option<ApiError> {
        match self {
            ClientError::Status { body, .. } => serde_json::from_str::<ErrorResponse>(body)
                .ok()
                .map(|resp| resp.error),
            ClientError::RequestFailed(inner) => inner.api_error(),
            _ => None,
        }
    }
}

/// Generic chat client capability.
///
/// Implement this trait to expose a provider through the provider-agnostic
/// [`Message`] / [`Response`] types.
///
/// # Example
/// ```rust,ignore
/// #[async_trait]
/// impl Client for MyClient {
///     async fn request(
///         &self,
///         messages: Vec<Message>,
///         options: Option<&ChatOptions>,
///     ) -> Result<Response, ClientError> {
///         // Implementation
///     }
///
///     fn metadata(&self) -> &ClientMetadata {
///         &self.metadata
///     }
/// }
/// ```
#[async_trait]
pub trait Client: Send + Sync {
    /// Send a conversation and wait for the complete response.
    ///
    /// # Arguments
    /// - `messages`: Conversation messages
    /// - `options`: Per-request options; `None` keeps the provider defaults
    async fn request(
        &self,
        messages: Vec<Message>,
        options: Option<&ChatOptions>,
    ) -> Result<Response, ClientError>;

    /// Describes the provider behind this client.
    fn metadata(&self) -> &ClientMetadata;

    /// Send a conversation with the provider defaults.
    async fn chat(&self, messages: Vec<Message>) -> Result<Response, ClientError> {
        self.request(messages, None).await
    }

    /// Send a conversation overriding some of the provider defaults.
    async fn chat_with_options(
        &self,
        messages: Vec<Message>,
        options: &ChatOptions,
    ) -> Result<Response, ClientError> {
        self.request(messages, Some(options)).await
    }
}

/// Extension trait for streaming support.
///
/// Providers that support streaming implement this trait in addition to `Client`.
#[async_trait]
pub trait StreamingClient: Client {
    /// Send a conversation and receive the response as incremental updates.
    ///
    /// The outer `Result` fails before any update exists (e.g. HTTP status);
    /// the stream itself ends after its first `Err` item.
    async fn request_stream(
        &self,
        messages: Vec<Message>,
        options: Option<&ChatOptions>,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<StreamChunk, ClientError>>, ClientError>;

    /// Stream a conversation with the provider defaults and no cancellation.
    async fn chat_stream(
        &self,
        messages: Vec<Message>,
    ) -> Result<BoxStream<'static, Result<StreamChunk, ClientError>>, ClientError> {
        self.request_stream(messages, None, CancellationToken::new())
            .await
    }

    /// Stream a conversation overriding some of the provider defaults.
    async fn chat_stream_with_options(
        &self,
        messages: Vec<Message>,
        options: &ChatOptions,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<StreamChunk, ClientError>>, ClientError> {
        self.request_stream(messages, Some(options), cancel).await
    }
}
