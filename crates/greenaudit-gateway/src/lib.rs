mod anthropic;
pub mod retry;

pub use anthropic::AnthropicGateway;
pub use retry::with_retry;
