//! parley-chat: persisted conversations fed by streaming completions
//!
//! [`ConversationStore`] owns the ordered conversation collection and writes
//! it through a [`KeyValueStore`] after every change. [`Responder`] connects
//! a [`parley_ai::ChatProvider`] stream to the store, growing the last
//! assistant message as fragments arrive.

pub mod conversation;
pub mod error;
pub mod observable;
pub mod responder;
pub mod storage;
pub mod store;

pub use conversation::{Conversation, DEFAULT_TITLE};
pub use error::{Error, Result};
pub use observable::Observable;
pub use responder::Responder;
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use store::ConversationStore;
