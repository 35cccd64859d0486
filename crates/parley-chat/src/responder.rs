//! Drives a completion stream into the conversation store.

use futures::StreamExt;
use parley_ai::{ChatProvider, Message};
use std::sync::Arc;

use crate::{error::Result, observable::Observable, store::ConversationStore};

/// Sends conversations to a provider and streams replies into the store.
///
/// Text already applied is kept when a stream fails or is stopped; nothing
/// is rolled back.
pub struct Responder {
    provider: Arc<dyn ChatProvider>,
    store: Arc<ConversationStore>,
}

impl Responder {
    pub fn new(provider: Arc<dyn ChatProvider>, store: Arc<ConversationStore>) -> Self {
        Self { provider, store }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    /// Append a user message and stream the assistant's reply.
    ///
    /// Returns `Ok(None)` if the conversation does not exist.
    pub async fn send(
        &self,
        conversation_id: &str,
        text: impl Into<String>,
        model: &str,
        on_fragment: impl FnMut(&str),
    ) -> Result<Option<String>> {
        let message = Message::user(text).stamped();
        if !self.store.add_message(conversation_id, message)? {
            return Ok(None);
        }
        self.respond(conversation_id, model, on_fragment).await
    }

    /// Rewrite the message at `index`, drop everything after it, and stream a
    /// fresh reply. The edited message keeps its original role.
    pub async fn edit_and_regenerate(
        &self,
        conversation_id: &str,
        index: usize,
        text: impl Into<String>,
        model: &str,
        on_fragment: impl FnMut(&str),
    ) -> Result<Option<String>> {
        let Some(role) = self
            .store
            .get(conversation_id)
            .and_then(|c| c.messages.get(index).map(|m| m.role))
        else {
            return Ok(None);
        };

        let message = Message::new(role, text).stamped().mark_edited();
        if !self.store.edit_message(conversation_id, index, message)? {
            return Ok(None);
        }
        self.respond(conversation_id, model, on_fragment).await
    }

    /// Stream a reply to the conversation's current history.
    ///
    /// An empty assistant message is appended first and grows as fragments
    /// arrive. Returns the full reply text, or `Ok(None)` when the
    /// conversation is unknown or has no messages. A stopped stream returns
    /// the text received so far.
    pub async fn respond(
        &self,
        conversation_id: &str,
        model: &str,
        mut on_fragment: impl FnMut(&str),
    ) -> Result<Option<String>> {
        let Some(history) = self
            .store
            .history(conversation_id)
            .filter(|history| !history.is_empty())
        else {
            return Ok(None);
        };

        let placeholder = Message::assistant("").stamped().with_model(model);
        if !self.store.add_message(conversation_id, placeholder)? {
            return Ok(None);
        }

        let _streaming = StreamingGuard::new(self.store.streaming());
        let mut fragments = self.provider.stream_completion(&history, model);
        let mut text = String::new();

        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            text.push_str(&fragment);
            self.store.update_last_message(conversation_id, text.as_str())?;
            on_fragment(&fragment);
        }

        tracing::debug!(conversation = conversation_id, chars = text.len(), "Reply finished");
        Ok(Some(text))
    }

    /// Stop every reply in flight ("stop generating").
    pub fn stop(&self) -> usize {
        self.provider.registry().abort_all()
    }
}

/// Counts a reply as streaming for as long as it is alive
struct StreamingGuard<'a> {
    count: &'a Observable<usize>,
}

impl<'a> StreamingGuard<'a> {
    fn new(count: &'a Observable<usize>) -> Self {
        count.update(|n| *n += 1);
        Self { count }
    }
}

impl Drop for StreamingGuard<'_> {
    fn drop(&mut self) {
        self.count.update(|n| *n = n.saturating_sub(1));
    }
}
