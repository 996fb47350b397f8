pub mod client;
pub mod sse;
pub mod types;

pub use client::CompletionClient;
pub use types::*;
