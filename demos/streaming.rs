//! Streaming chat completion, cancelled on Ctrl-C.
//!
//! Run with:
//! ```bash
//! export DEEPSEEK_API_KEY="your-api-key"
//! cargo run --example streaming
//! ```

use std::io::Write;

use futures::StreamExt;
use deepseek::api::{ChatRequest, Message};
use deepseek::{ClientError, DeepSeekClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = DeepSeekClient::from_env()?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let request = ChatRequest::new(vec![Message::user("Write a haiku about Rust programming.")])
        .with_temperature(0.9);

    println!("Streaming response from DeepSeek...\n");

    let mut stream = client.chat_stream(request, cancel).await?;
    while let Some(choice) = stream.next().await {
        match choice {
            Ok(choice) => {
                if let Some(content) = choice.content() {
                    print!("{}", content);
                    std::io::stdout().flush()?;
                }
                if let Some(reason) = &choice.finish_reason {
                    println!("\n\n=== Stream Complete ===");
                    println!("Finish reason: {}", reason);
                }
            }
            Err(ClientError::StreamCancelled) => {
                println!("\n\nCancelled.");
                break;
            }
            Err(e) => {
                eprintln!("\nError in stream: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}
