pub mod file;
#[cfg(test)]
pub mod memory;

pub use file::JsonFileStore;
#[cfg(test)]
pub use memory::MemoryStore;

use crate::clip::{ClipHandle, ClipList};
use crate::error::{SessionError, describe};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Flat asynchronous string-keyed storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersistedClips {
    version: u32,
    clips: ClipList,
}

/// Owns the persisted clip list, serialized as one entry under one key.
///
/// `append` is a read-modify-write with no compare-and-set. Two writers
/// sharing a backend (two processes, or two managers over one store) can
/// lose an entry if their appends interleave. Within one `SessionManager`
/// intents are queued, so appends never overlap.
pub struct ClipStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> ClipStore<S> {
    pub fn new(backend: S, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Read the persisted list. An absent key is an empty list.
    pub async fn load(&self) -> Result<ClipList, SessionError> {
        let raw = self
            .backend
            .get(&self.key)
            .await
            .map_err(|e| SessionError::StorageIOError(describe(&e)))?;

        match raw {
            None => Ok(ClipList::new()),
            Some(raw) => decode(&raw),
        }
    }

    /// Append one handle and write the whole list back under the same key.
    /// An unreadable persisted list is replaced rather than blocking saves.
    pub async fn append(&self, handle: ClipHandle) -> Result<ClipList, SessionError> {
        let mut clips = match self.load().await {
            Ok(clips) => clips,
            Err(SessionError::CorruptPersistedState(reason)) => {
                tracing::warn!(key = %self.key, "Replacing unreadable clip list: {}", reason);
                ClipList::new()
            }
            Err(e) => return Err(e),
        };
        clips.push(handle);

        let encoded = encode(&clips)?;
        self.backend
            .set(&self.key, encoded)
            .await
            .map_err(|e| SessionError::StorageIOError(describe(&e)))?;

        tracing::debug!(key = %self.key, clips = clips.len(), "Persisted clip list");
        Ok(clips)
    }

    pub async fn clear(&self) -> Result<(), SessionError> {
        self.backend
            .remove(&self.key)
            .await
            .map_err(|e| SessionError::StorageIOError(describe(&e)))?;

        tracing::debug!(key = %self.key, "Removed persisted clip list");
        Ok(())
    }
}

fn decode(raw: &str) -> Result<ClipList, SessionError> {
    let persisted: PersistedClips = serde_json::from_str(raw)
        .map_err(|e| SessionError::CorruptPersistedState(e.to_string()))?;

    if persisted.version != SCHEMA_VERSION {
        return Err(SessionError::CorruptPersistedState(format!(
            "unsupported schema version {}",
            persisted.version
        )));
    }

    Ok(persisted.clips)
}

fn encode(clips: &ClipList) -> Result<String, SessionError> {
    serde_json::to_string(&PersistedClips {
        version: SCHEMA_VERSION,
        clips: clips.clone(),
    })
    .map_err(|e| SessionError::StorageIOError(e.to_string()))
}
