//! DeepSeek API client.
//!
//! Every call returns its own `Result`: a non-success status comes back as
//! [`ClientError::Status`] and nothing is retried.

use std::time::Duration;

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::chat::{ChatRequest, ChatResponse};
use crate::api::models::ModelResponse;
use crate::client::ClientError;
use crate::http::{build_http_client, check_status, endpoint};
use crate::options::{SecretString, TransportOptions};
use crate::sse::SSEResponseExt;
use crate::stream::ChoiceStream;

pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
pub const MODELS_PATH: &str = "/models";

/// Client for the DeepSeek HTTP API.
///
/// Cheap to clone; clones share one connection pool. All calls take `&self`
/// and may run concurrently.
///
/// # Example
/// ```no_run
/// use deepseek::api::{ChatRequest, Message};
/// use deepseek::DeepSeekClient;
///
/// # async fn run() -> Result<(), deepseek::ClientError> {
/// let client = DeepSeekClient::new("sk-...")?;
/// let response = client
///     .chat(ChatRequest::new(vec![Message::user("Hello!")]))
///     .await?;
/// println!("{:?}", response.first_choice().and_then(|c| c.content()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeepSeekClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    stream_buffer: usize,
}

impl DeepSeekClient {
    /// Create a client for the production API with default options.
    pub fn new(api_key: impl Into<SecretString>) -> Result<Self, ClientError> {
        Self::with_options(TransportOptions::new(api_key))
    }

    /// Create a client reading its configuration from the environment.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::with_options(TransportOptions::from_env()?)
    }

    pub fn with_options(options: TransportOptions) -> Result<Self, ClientError> {
        validate_timeout(options.timeout)?;
        let http = build_http_client(&options)?;

        Ok(Self {
            http,
            base_url: options.base_url,
            timeout: options.timeout,
            stream_buffer: options.stream_buffer,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the request timeout.
    ///
    /// A zero timeout is rejected and the current one is kept.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ClientError> {
        validate_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    /// List the models available to this API key.
    pub async fn list_models(&self) -> Result<ModelResponse, ClientError> {
        let url = endpoint(&self.base_url, MODELS_PATH);
        debug!(%url, "listing models");

        let response = self
            .http
            .request(Method::GET, &url)
            .timeout(self.timeout)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Create a chat completion and wait for the whole response.
    pub async fn chat(&self, mut request: ChatRequest) -> Result<ChatResponse, ClientError> {
        request.stream = false;
        let url = endpoint(&self.base_url, CHAT_COMPLETIONS_PATH);
        debug!(%url, model = %request.model, messages = request.messages.len(), "chat completion");

        let response = self
            .http
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;
        let response = check_status(response).await?;

        // Decode from text so malformed bodies surface as `Parse`, not `Http`.
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Create a streaming chat completion.
    ///
    /// Resolves once the response headers arrive. A non-success status is
    /// returned as an error here, before any stream exists. The timeout only
    /// covers this wait; once streaming, the stream runs until the server
    /// finishes, an error occurs, `cancel` fires or the stream is dropped.
    pub async fn chat_stream(
        &self,
        mut request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChoiceStream, ClientError> {
        request.stream = true;
        let url = endpoint(&self.base_url, CHAT_COMPLETIONS_PATH);
        debug!(%url, model = %request.model, messages = request.messages.len(), "streaming chat completion");

        let send = self.http.post(&url).json(&request).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::StreamCancelled),
            sent = tokio::time::timeout(self.timeout, send) => {
                sent.map_err(|_| ClientError::Timeout(self.timeout))??
            }
        };
        let response = check_status(response).await?;

        Ok(ChoiceStream::spawn(
            response.sse_lines(),
            cancel,
            self.stream_buffer,
        ))
    }
}

fn validate_timeout(timeout: Duration) -> Result<(), ClientError> {
    if timeout.is_zero() {
        return Err(ClientError::InvalidArgument(
            "timeout must be positive".to_string(),
        ));
    }
    Ok(())
}
