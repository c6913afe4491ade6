//! Implementations of the generic client traits.

pub mod deepseek;

// Re-export for convenience
pub use deepseek::DeepSeekChatClient;
