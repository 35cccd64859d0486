//! Completion provider implementations

pub mod openai;

use crate::{CancellationRegistry, Message, ModelInfo, Result};
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// Lazily produced content fragments of one completion, in arrival order
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A backend that can stream chat completions
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stream the assistant's reply to `history`.
    ///
    /// Nothing is sent until the stream is first polled. The stream ends
    /// cleanly when the provider's registry aborts it.
    fn stream_completion(&self, history: &[Message], model: &str) -> FragmentStream;

    /// List the models the server offers
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Registry tracking this provider's in-flight streams
    fn registry(&self) -> &CancellationRegistry;
}
