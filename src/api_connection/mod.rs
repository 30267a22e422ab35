//! OpenRouter chat-completion client.

pub mod connection;
pub mod endpoints;

pub use connection::ApiConnectionError;
pub use endpoints::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Provider};
