//! Chat lifecycle and the current-chat cursor.

use crate::error::{Error, Result};
use crate::session::store::ChatStore;
use crate::session::{preview_of, ChatCollection, ChatId, HistoryEntry, Message, Role};
use chrono::Utc;
use tracing::{debug, info};

/// Owns the chat collection and keeps the persisted copy and the view model in step.
///
/// After construction the collection always holds at least one chat and
/// `current` is one of its keys.
pub struct SessionManager {
    store: ChatStore,
    chats: ChatCollection,
    current: ChatId,
    history: Vec<HistoryEntry>,
    conversation: Vec<Message>,
    last_issued: Option<ChatId>,
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

impl SessionManager {
    /// Loads stored chats, or starts a fresh chat when there are none.
    ///
    /// With stored history the newest chat becomes current.
    pub fn initialize(mut store: ChatStore) -> Self {
        let mut chats = store.load_collection();
        let current = match chats.newest() {
            Some(id) => id,
            None => {
                let id = chats.next_id(now_ms(), None);
                chats.insert_empty(id);
                store.save_collection(&chats);
                info!(chat_id = %id, "no stored chats, started a new one");
                id
            }
        };

        let conversation = chats.messages(current).map(<[_]>::to_vec).unwrap_or_default();
        let mut manager = Self {
            store,
            chats,
            current,
            history: Vec::new(),
            conversation,
            last_issued: Some(current),
        };
        manager.refresh_history_view();
        debug!(chats = manager.chats.len(), chat_id = %current, "sessions initialized");
        manager
    }

    pub fn current(&self) -> ChatId {
        self.current
    }

    pub fn chats(&self) -> &ChatCollection {
        &self.chats
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Messages currently on screen.
    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChatStore {
        &mut self.store
    }

    pub fn new_chat(&mut self) -> ChatId {
        self.new_chat_at(now_ms())
    }

    fn new_chat_at(&mut self, now_ms: u64) -> ChatId {
        let id = self.chats.next_id(now_ms, self.last_issued);
        self.last_issued = self.last_issued.max(Some(id));
        self.chats.insert_empty(id);
        self.current = id;
        self.store.save_collection(&self.chats);
        self.refresh_history_view();
        self.conversation.clear();
        debug!(chat_id = %id, "new chat");
        id
    }

    /// Makes `id` current and replays its messages into the conversation.
    pub fn select_chat(&mut self, id: ChatId) -> Result<()> {
        let messages = self.chats.messages(id).ok_or(Error::UnknownChat(id))?;
        self.conversation = messages.to_vec();
        self.current = id;
        debug!(chat_id = %id, messages = self.conversation.len(), "selected chat");
        Ok(())
    }

    /// Removes `id`. The collection is never left empty: deleting the last chat
    /// starts a new one, deleting the current chat selects the newest survivor.
    pub fn delete_chat(&mut self, id: ChatId) -> Result<()> {
        if self.chats.remove(id).is_none() {
            return Err(Error::UnknownChat(id));
        }
        self.store.save_collection(&self.chats);
        self.refresh_history_view();
        info!(chat_id = %id, "deleted chat");

        match self.chats.newest() {
            None => {
                self.new_chat();
            }
            Some(newest) if id == self.current => self.select_chat(newest)?,
            Some(_) => {}
        }
        Ok(())
    }

    /// Appends to the current chat, persists, and shows the message.
    pub fn append_message(&mut self, role: Role, content: impl Into<String>) {
        let message = Message::new(role, content);
        if !self.chats.push(self.current, message.clone()) {
            // Unreachable while the invariant holds; recreate rather than drop the message.
            self.chats.insert_empty(self.current);
            self.chats.push(self.current, message.clone());
        }
        self.conversation.push(message);
        self.store.save_collection(&self.chats);
        self.refresh_history_view();
    }

    pub fn refresh_history_view(&mut self) {
        self.history = self
            .chats
            .ids_newest_first()
            .map(|id| HistoryEntry {
                id,
                preview: self.chats.messages(id).map(preview_of).unwrap_or_default(),
            })
            .collect();
    }
}
