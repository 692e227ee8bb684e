use crate::error::{Error, Result};
use crate::session::ChatCollection;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const CHATS_KEY: &str = "chats";
pub const DARK_MODE_KEY: &str = "darkMode";
pub const FLAG_ENABLED: &str = "enabled";
pub const FLAG_DISABLED: &str = "disabled";

/// Synchronous string key-value storage, the local analogue of `localStorage`.
pub trait Storage: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.item_path(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::Storage(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let final_path = self.item_path(key);
        let tmp_path = self.dir.join(format!("{key}.json.tmp"));

        fs::write(&tmp_path, value)?;
        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if final_path.exists() {
                    fs::remove_file(&final_path)?;
                    fs::rename(&tmp_path, &final_path)?;
                    Ok(())
                } else {
                    Err(rename_err.into())
                }
            }
        }
    }
}

/// Process-local storage. Clones share the same map, which lets a second
/// store observe what the first one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| Error::Storage("memory storage poisoned".to_string()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| Error::Storage("memory storage poisoned".to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persistence for the chat collection and the theme flag.
///
/// Every failure is logged and swallowed: the caller keeps working in memory.
pub struct ChatStore {
    storage: Box<dyn Storage>,
}

impl ChatStore {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    /// File-backed store under `dir`, or an in-memory one if the directory is unusable.
    pub fn open_or_memory(dir: &Path) -> Self {
        match FileStorage::open(dir) {
            Ok(storage) => {
                debug!(dir = %storage.dir().display(), "using file storage");
                Self::new(storage)
            }
            Err(err) => {
                warn!(
                    dir = %dir.display(),
                    error = %err,
                    "storage directory unavailable, chats will not survive a restart"
                );
                Self::new(MemoryStorage::default())
            }
        }
    }

    /// The stored collection, or an empty one when nothing is stored or it fails to parse.
    pub fn load_collection(&self) -> ChatCollection {
        let raw = match self.storage.get_item(CHATS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return ChatCollection::default(),
            Err(err) => {
                warn!(error = %err, "failed to read stored chats");
                return ChatCollection::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(chats) => chats,
            Err(err) => {
                warn!(error = %err, "stored chats are unreadable, starting with no history");
                ChatCollection::default()
            }
        }
    }

    /// Overwrites the stored collection with `chats`.
    pub fn save_collection(&mut self, chats: &ChatCollection) {
        let result = serde_json::to_string(chats)
            .map_err(Error::from)
            .and_then(|raw| self.storage.set_item(CHATS_KEY, &raw));
        if let Err(err) = result {
            warn!(error = %err, "failed to persist chats");
        }
    }

    pub fn load_flag(&self, key: &str) -> Option<String> {
        match self.storage.get_item(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "failed to read flag");
                None
            }
        }
    }

    pub fn save_flag(&mut self, key: &str, value: &str) {
        if let Err(err) = self.storage.set_item(key, value) {
            warn!(key, error = %err, "failed to persist flag");
        }
    }

    pub fn dark_mode(&self) -> bool {
        self.load_flag(DARK_MODE_KEY).as_deref() == Some(FLAG_ENABLED)
    }

    pub fn set_dark_mode(&mut self, enabled: bool) {
        let value = if enabled { FLAG_ENABLED } else { FLAG_DISABLED };
        self.save_flag(DARK_MODE_KEY, value);
    }
}
