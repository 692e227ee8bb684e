use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod manager;
pub mod store;

pub const PREVIEW_CHARS: usize = 30;
pub const EMPTY_PREVIEW: &str = "New Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a chat. Content is opaque renderable text; a rendered table is
/// stored as markup in the same field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Chat identifier derived from the creation time in milliseconds.
///
/// Persisted as the decimal string key of the `chats` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub u64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All chats keyed by id. Iteration order is ascending id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatCollection {
    chats: BTreeMap<ChatId, Vec<Message>>,
}

impl ChatCollection {
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn contains(&self, id: ChatId) -> bool {
        self.chats.contains_key(&id)
    }

    pub fn messages(&self, id: ChatId) -> Option<&[Message]> {
        self.chats.get(&id).map(Vec::as_slice)
    }

    pub fn insert_empty(&mut self, id: ChatId) {
        self.chats.insert(id, Vec::new());
    }

    pub fn remove(&mut self, id: ChatId) -> Option<Vec<Message>> {
        self.chats.remove(&id)
    }

    /// Appends to an existing chat. Returns false when `id` is unknown.
    pub fn push(&mut self, id: ChatId, message: Message) -> bool {
        match self.chats.get_mut(&id) {
            Some(messages) => {
                messages.push(message);
                true
            }
            None => false,
        }
    }

    pub fn ids_newest_first(&self) -> impl Iterator<Item = ChatId> + '_ {
        self.chats.keys().rev().copied()
    }

    pub fn newest(&self) -> Option<ChatId> {
        self.chats.keys().next_back().copied()
    }

    /// A fresh id for a chat created at `now_ms`.
    ///
    /// `last_issued` is the highest id handed out so far, including chats that
    /// have since been deleted. A clock collision or a backwards clock bumps
    /// past both it and the newest chat. If that would overflow, the smallest
    /// id not in the collection is used instead.
    pub fn next_id(&self, now_ms: u64, last_issued: Option<ChatId>) -> ChatId {
        let high = self.newest().max(last_issued);
        match high {
            Some(ChatId(high)) if high >= now_ms => match high.checked_add(1) {
                Some(id) => ChatId(id),
                None => self.smallest_unused(),
            },
            _ => ChatId(now_ms),
        }
    }

    fn smallest_unused(&self) -> ChatId {
        let mut candidate = 0;
        for ChatId(id) in self.chats.keys().copied() {
            if id != candidate {
                break;
            }
            candidate += 1;
        }
        ChatId(candidate)
    }
}

/// The history label of a chat: its first message, cut to 30 characters.
pub fn preview_of(messages: &[Message]) -> String {
    let Some(first) = messages.first() else {
        return EMPTY_PREVIEW.to_string();
    };

    if first.content.chars().count() > PREVIEW_CHARS {
        let truncated: String = first.content.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        first.content.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: ChatId,
    pub preview: String,
}
