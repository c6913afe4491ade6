//! Blocking chat completion against DeepSeek.
//!
//! Run with:
//! ```bash
//! export DEEPSEEK_API_KEY="your-api-key"
//! cargo run --example chat
//! ```

use deepseek::api::{ChatRequest, Message, MODEL_CHAT};
use deepseek::DeepSeekClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = DeepSeekClient::from_env()?;

    let request = ChatRequest::new(vec![
        Message::system("You are a helpful assistant."),
        Message::user("What is the capital of France? Answer in one word."),
    ])
    .with_model(MODEL_CHAT)
    .with_temperature(0.7)
    .with_max_tokens(100);
    request.validate()?;

    println!("Sending request to DeepSeek...");

    match client.chat(request).await {
        Ok(response) => {
            println!("\n=== Response ===");
            match response.first_choice().and_then(|c| c.content()) {
                Some(content) => println!("{}", content),
                None => println!("No content in response."),
            }

            if let Some(usage) = &response.usage {
                println!("\nPrompt tokens: {}", usage.prompt_tokens);
                println!("Completion tokens: {}", usage.completion_tokens);
                println!("Cache hits: {}", usage.prompt_cache_hit_tokens);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(api_error) = e.api_error() {
                eprintln!("API error type: {:?}", api_error.error_type);
            }
            return Err(e.into());
        }
    }

    Ok(())
}
