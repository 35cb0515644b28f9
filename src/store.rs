//! Player Persistence
//!
//! Get/add/update for player records and unique-block collections keyed by
//! player id. The loop only talks to the [`PlayerStore`] trait.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::error::GameError;
use crate::game::player::{PlayerId, PlayerRecord};
use crate::game::unique::UniqueKind;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("player {0} already exists")]
    Duplicate(String),

    #[error("player {0} not found")]
    NotFound(String),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        GameError::Storage(err.to_string())
    }
}

/// Persistence collaborator.
pub trait PlayerStore: Send {
    fn get_player(&self, id: &PlayerId) -> Option<PlayerRecord>;

    fn add_player(&mut self, record: PlayerRecord) -> Result<(), StoreError>;

    fn update_player(&mut self, record: PlayerRecord) -> Result<(), StoreError>;

    /// Unique-block collection of a player (empty when unknown).
    fn get_collection(&self, id: &PlayerId) -> Vec<UniqueKind>;

    /// Add a unique to a collection. Adding a name twice keeps one entry.
    fn add_to_collection(&mut self, id: &PlayerId, kind: UniqueKind) -> Result<(), StoreError>;
}

/// Serialized store contents.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreData {
    players: BTreeMap<String, PlayerRecord>,
    collections: BTreeMap<String, Vec<UniqueKind>>,
}

impl StoreData {
    fn get_player(&self, id: &PlayerId) -> Option<PlayerRecord> {
        self.players.get(&id.to_uuid_string()).cloned()
    }

    fn add_player(&mut self, record: PlayerRecord) -> Result<(), StoreError> {
        let key = record.id.to_uuid_string();
        if self.players.contains_key(&key) {
            return Err(StoreError::Duplicate(key));
        }
        self.players.insert(key, record);
        Ok(())
    }

    fn update_player(&mut self, record: PlayerRecord) -> Result<(), StoreError> {
        let key = record.id.to_uuid_string();
        match self.players.get_mut(&key) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn get_collection(&self, id: &PlayerId) -> Vec<UniqueKind> {
        self.collections.get(&id.to_uuid_string()).cloned().unwrap_or_default()
    }

    fn add_to_collection(&mut self, id: &PlayerId, kind: UniqueKind) -> Result<(), StoreError> {
        let key = id.to_uuid_string();
        if !self.players.contains_key(&key) {
            return Err(StoreError::NotFound(key));
        }
        let collection = self.collections.entry(key).or_default();
        if !collection.contains(&kind) {
            collection.push(kind);
        }
        Ok(())
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: StoreData,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerStore for InMemoryStore {
    fn get_player(&self, id: &PlayerId) -> Option<PlayerRecord> {
        self.data.get_player(id)
    }

    fn add_player(&mut self, record: PlayerRecord) -> Result<(), StoreError> {
        self.data.add_player(record)
    }

    fn update_player(&mut self, record: PlayerRecord) -> Result<(), StoreError> {
        self.data.update_player(record)
    }

    fn get_collection(&self, id: &PlayerId) -> Vec<UniqueKind> {
        self.data.get_collection(id)
    }

    fn add_to_collection(&mut self, id: &PlayerId, kind: UniqueKind) -> Result<(), StoreError> {
        self.data.add_to_collection(id, kind)
    }
}

// =============================================================================
// JSON FILE
// =============================================================================

/// Store backed by a JSON file, rewritten on every mutation.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: StoreData,
}

impl JsonFileStore {
    /// Open a store file. A missing file starts empty; an unreadable or
    /// corrupt one is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?
        } else {
            StoreData::default()
        };
        info!(players = data.players.len(), "Loaded player store from {}", path.display());
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&self.data).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, text).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("Flushed player store to {}", self.path.display());
        Ok(())
    }
}

impl PlayerStore for JsonFileStore {
    fn get_player(&self, id: &PlayerId) -> Option<PlayerRecord> {
        self.data.get_player(id)
    }

    fn add_player(&mut self, record: PlayerRecord) -> Result<(), StoreError> {
        self.data.add_player(record)?;
        self.flush()
    }

    fn update_player(&mut self, record: PlayerRecord) -> Result<(), StoreError> {
        self.data.update_player(record)?;
        self.flush()
    }

    fn get_collection(&self, id: &PlayerId) -> Vec<UniqueKind> {
        self.data.get_collection(id)
    }

    fn add_to_collection(&mut self, id: &PlayerId, kind: UniqueKind) -> Result<(), StoreError> {
        self.data.add_to_collection(id, kind)?;
        self.flush()
    }
}
