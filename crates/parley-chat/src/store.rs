//! The conversation collection and its write-through persistence.

use parley_ai::{Message, Role};
use std::sync::Arc;

use crate::{
    conversation::{Conversation, DEFAULT_TITLE, derive_title},
    error::Result,
    observable::Observable,
    storage::{KeyValueStore, MemoryStorage},
};

/// Storage key holding the JSON array of conversations
pub const STORAGE_KEY: &str = "conversations";

/// Ordered, persisted conversations (most recently created first).
///
/// Every mutation runs under the collection's write lock and, when it changed
/// anything, writes the whole collection to storage before the lock is
/// released. Persisted state therefore always matches memory after each
/// operation, in the order the operations happened.
///
/// Mutations naming an unknown conversation are no-ops and return
/// `Ok(false)`. A failed write is returned as an error; the in-memory change
/// has already been applied by then.
pub struct ConversationStore {
    conversations: Observable<Vec<Conversation>>,
    active: Observable<Option<String>>,
    streaming: Observable<usize>,
    storage: Arc<dyn KeyValueStore>,
}

impl ConversationStore {
    /// Load the persisted collection from `storage`.
    ///
    /// A missing entry starts an empty collection. An unreadable entry is an
    /// error rather than being overwritten by the next save.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let conversations: Vec<Conversation> = match storage.get(STORAGE_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        tracing::debug!(count = conversations.len(), "Loaded conversations");

        Ok(Self {
            conversations: Observable::new(conversations),
            active: Observable::new(None),
            streaming: Observable::new(0),
            storage,
        })
    }

    /// Empty store backed by [`MemoryStorage`]
    pub fn in_memory() -> Self {
        Self {
            conversations: Observable::new(Vec::new()),
            active: Observable::new(None),
            streaming: Observable::new(0),
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    /// Observable conversation collection
    pub fn conversations(&self) -> &Observable<Vec<Conversation>> {
        &self.conversations
    }

    /// Observable id of the conversation in focus (not persisted)
    pub fn active(&self) -> &Observable<Option<String>> {
        &self.active
    }

    /// Observable number of replies currently streaming
    pub fn streaming(&self) -> &Observable<usize> {
        &self.streaming
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.with(|count| *count > 0)
    }

    pub fn snapshot(&self) -> Vec<Conversation> {
        self.conversations.get()
    }

    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.conversations
            .with(|conversations| conversations.iter().find(|c| c.id == id).cloned())
    }

    /// Messages of a conversation, if it exists
    pub fn history(&self, id: &str) -> Option<Vec<Message>> {
        self.conversations.with(|conversations| {
            conversations
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.messages.clone())
        })
    }

    pub fn len(&self) -> usize {
        self.conversations.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_id(&self) -> Option<String> {
        self.active.get()
    }

    pub fn set_active(&self, id: Option<String>) {
        self.active.set(id);
    }

    /// Start a conversation titled `title`, make it active, and return its id.
    pub fn create_conversation(&self, title: impl Into<String>) -> Result<String> {
        let conversation = Conversation::new(title);
        let id = conversation.id.clone();

        let persisted = self.mutate(|conversations| {
            conversations.insert(0, conversation);
            true
        });
        self.active.set(Some(id.clone()));
        persisted?;

        tracing::debug!(conversation = %id, "Created conversation");
        Ok(id)
    }

    /// [`create_conversation`](Self::create_conversation) with the default title
    pub fn new_conversation(&self) -> Result<String> {
        self.create_conversation(DEFAULT_TITLE)
    }

    /// Append `message`. The first user message of an empty conversation
    /// also names it.
    pub fn add_message(&self, conversation_id: &str, message: Message) -> Result<bool> {
        self.mutate(|conversations| {
            let Some(conversation) = find_mut(conversations, conversation_id) else {
                return false;
            };
            if conversation.messages.is_empty() && message.role == Role::User {
                conversation.title = derive_title(&message.content);
            }
            conversation.messages.push(message);
            true
        })
    }

    /// Replace the content of the final message in place.
    ///
    /// Streaming callers pass the running total, not the latest fragment.
    pub fn update_last_message(&self, conversation_id: &str, content: impl Into<String>) -> Result<bool> {
        let content = content.into();
        self.mutate(|conversations| {
            match find_mut(conversations, conversation_id).and_then(|c| c.messages.last_mut()) {
                Some(last) => {
                    last.content = content;
                    true
                }
                None => false,
            }
        })
    }

    /// Replace the message at `index` and drop every message after it.
    pub fn edit_message(&self, conversation_id: &str, index: usize, message: Message) -> Result<bool> {
        self.mutate(|conversations| {
            let Some(conversation) = find_mut(conversations, conversation_id) else {
                return false;
            };
            if index >= conversation.messages.len() {
                return false;
            }
            conversation.messages.truncate(index + 1);
            conversation.messages[index] = message;
            true
        })
    }

    /// Rename a conversation that has at least one message
    pub fn change_title(&self, conversation_id: &str, title: impl Into<String>) -> Result<bool> {
        let title = title.into();
        self.mutate(|conversations| match find_mut(conversations, conversation_id) {
            Some(conversation) if !conversation.messages.is_empty() => {
                conversation.title = title;
                true
            }
            _ => false,
        })
    }

    pub fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        let removed = self.mutate(|conversations| {
            let before = conversations.len();
            conversations.retain(|c| c.id != conversation_id);
            conversations.len() != before
        });

        self.active.update_if(|active| {
            if active.as_deref() == Some(conversation_id) {
                *active = None;
                true
            } else {
                false
            }
        });

        removed
    }

    /// Apply `f` under the write lock and persist when it reports a change.
    fn mutate(&self, f: impl FnOnce(&mut Vec<Conversation>) -> bool) -> Result<bool> {
        let mut persisted = Ok(());
        let changed = self.conversations.update_if(|conversations| {
            if !f(conversations) {
                return false;
            }
            persisted = self.persist(conversations);
            true
        });

        if let Err(ref e) = persisted {
            tracing::warn!(error = %e, "Failed to persist conversations");
        }
        persisted.map(|_| changed)
    }

    fn persist(&self, conversations: &[Conversation]) -> Result<()> {
        let json = serde_json::to_string(conversations)?;
        self.storage.set(STORAGE_KEY, &json)
    }
}

fn find_mut<'a>(conversations: &'a mut [Conversation], id: &str) -> Option<&'a mut Conversation> {
    conversations.iter_mut().find(|c| c.id == id)
}
