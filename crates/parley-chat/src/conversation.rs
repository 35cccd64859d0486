//! Conversation record and title derivation

use chrono::{DateTime, Utc};
use parley_ai::Message;
use serde::{Deserialize, Serialize};

/// Title given to conversations before the first user message names them
pub const DEFAULT_TITLE: &str = "New conversation";

/// Longest derived title, in characters, before the ellipsis
pub const TITLE_MAX_CHARS: usize = 30;

/// A titled, ordered thread of messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation with a fresh id
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Title from the first line of a message, cut to [`TITLE_MAX_CHARS`]
/// characters with a trailing `...` when cut.
pub fn derive_title(content: &str) -> String {
    let first_line = content.split('\n').next().unwrap_or_default();
    let first_line = first_line.strip_suffix('\r').unwrap_or(first_line);

    let mut chars = first_line.chars();
    let title: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", title)
    } else {
        title
    }
}
