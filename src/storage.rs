//! Durable storage port and its implementations

use crate::error::{ClientError, Result};
use papaya::HashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Client-persisted key/value slots surviving restarts.
///
/// Writes are synchronous: once `set` returns, a subsequent `get` from any
/// handle observes the value. Last writer wins.
pub trait DurableStorage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Thread-safe in-memory storage using Papaya HashMap
#[derive(Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.pin().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.pin().len() == 0
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.slots.pin().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.slots.pin().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots.pin().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object file.
///
/// The whole map is rewritten on every mutation; memory only changes once
/// the file write succeeded.
pub struct FileStorage {
    path: PathBuf,
    slots: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    ///
    /// A corrupt file starts empty; other read failures are returned.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let slots = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Discarding corrupt storage file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(ClientError::Io(e)),
        };
        Ok(Self {
            path,
            slots: Mutex::new(slots),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, slots: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(slots)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.slots.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.lock();
        let mut next = slots.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *slots = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.lock();
        if !slots.contains_key(key) {
            return Ok(());
        }
        let mut next = slots.clone();
        next.remove(key);
        self.flush(&next)?;
        *slots = next;
        Ok(())
    }
}
