//! List the models available to an API key.
//!
//! Run with:
//! ```bash
//! export DEEPSEEK_API_KEY="your-api-key"
//! cargo run --example models
//! ```

use deepseek::DeepSeekClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = DeepSeekClient::from_env()?;
    let models = client.list_models().await?;

    println!("Models at {}:", client.base_url());
    for model in &models.data {
        println!("  {} (owned by {})", model.id, model.owned_by);
    }

    Ok(())
}
