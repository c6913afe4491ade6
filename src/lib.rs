//! # deepseek - DeepSeek chat-completion client
//!
//! An async Rust client for the DeepSeek API (and compatible services).
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Typed request/response models in the API's own shape
//! - Streaming via Server-Sent Events, with backpressure and cancellation
//! - Model listing
//! - An adapter onto provider-agnostic `Client` / `StreamingClient` traits
//!
//! ## Architecture
//!
//! - **[`DeepSeekClient`]**: owns the HTTP client and exposes `list_models`,
//!   `chat` and `chat_stream`. Each call returns its own `Result`.
//! - **[`stream::ChoiceStream`]**: the streaming pipeline. A background task
//!   decodes SSE frames ahead of the consumer into a bounded channel.
//! - **[`providers::DeepSeekChatClient`]**: maps the generic
//!   [`model`] types onto the native [`api`] types and back.
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use deepseek::api::{ChatRequest, Message};
//! use deepseek::DeepSeekClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DeepSeekClient::new("your-api-key")?;
//!
//!     let request = ChatRequest::new(vec![
//!         Message::system("You are a helpful assistant."),
//!         Message::user("Hello!"),
//!     ]);
//!
//!     let mut stream = client.chat_stream(request, CancellationToken::new()).await?;
//!     while let Some(choice) = stream.next().await {
//!         print!("{}", choice?.content().unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod deepseek;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{Client, ClientError, StreamingClient};
pub use deepseek::DeepSeekClient;
pub use providers::DeepSeekChatClient;
pub use stream::ChoiceStream;
