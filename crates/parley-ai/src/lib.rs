//! parley-ai: streaming chat completions against OpenAI-compatible servers
//!
//! The crate turns a conversation history into a lazy stream of text
//! fragments. Every in-flight stream is tracked by a [`CancellationRegistry`]
//! so a single "stop generating" action can end all of them at once.

pub mod config;
pub mod decoder;
pub mod error;
pub mod providers;
pub mod registry;
pub mod session;
pub mod types;

pub use config::ClientConfig;
pub use decoder::FrameDecoder;
pub use error::{Error, Result};
pub use providers::{ChatProvider, FragmentStream, openai::OpenAICompatProvider};
pub use registry::{CancellationRegistry, SessionKey};
pub use session::StreamSession;
pub use types::*;
