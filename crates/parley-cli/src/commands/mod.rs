//! Subcommand implementations

pub mod chat;
pub mod conversation;
pub mod model;

use anyhow::bail;
use parley_ai::OpenAICompatProvider;
use parley_chat::{ConversationStore, Responder};
use std::future::Future;
use std::sync::Arc;

/// Everything a command needs
pub struct Context {
    pub store: Arc<ConversationStore>,
    pub provider: Arc<OpenAICompatProvider>,
    pub model: String,
}

impl Context {
    pub fn responder(&self) -> Responder {
        Responder::new(self.provider.clone(), self.store.clone())
    }

    /// Find a conversation by full id or unique id prefix
    pub fn resolve(&self, query: &str) -> anyhow::Result<String> {
        let matches: Vec<String> = self.store.conversations().with(|conversations| {
            conversations
                .iter()
                .filter(|c| c.id == query || c.id.starts_with(query))
                .map(|c| c.id.clone())
                .collect()
        });

        if let Some(exact) = matches.iter().find(|id| id.as_str() == query) {
            return Ok(exact.clone());
        }
        match matches.as_slice() {
            [id] => Ok(id.clone()),
            [] => bail!("No conversation matches '{}'", query),
            _ => bail!("'{}' matches {} conversations; use a longer id", query, matches.len()),
        }
    }
}

/// Run `fut`, stopping every stream on Ctrl-C and then letting it finish.
pub async fn with_interrupt<F: Future>(responder: &Responder, fut: F) -> F::Output {
    let mut fut = std::pin::pin!(fut);
    tokio::select! {
        out = &mut fut => out,
        _ = tokio::signal::ctrl_c() => {
            let stopped = responder.stop();
            tracing::debug!(stopped, "Interrupted");
            eprintln!("\n[stopped]");
            fut.await
        }
    }
}

/// First 8 characters of an id, for tables
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
