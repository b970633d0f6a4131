//! Persistence operations for the InMemory backend
//!
//! This module handles serialization and file I/O for saving/loading the
//! in-memory state to/from JSON files.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::InMemory;
use super::storage::State;
use crate::{Result, backend::errors::BackendError};

/// The current persistence file format version.
/// v0 indicates this is an unstable format subject to breaking changes.
const PERSISTENCE_VERSION: u8 = 0;

/// Helper to check if version is default (0) for serde skip_serializing_if
fn is_v0(v: &u8) -> bool {
    *v == 0
}

/// Validates the persistence version during deserialization.
fn validate_persistence_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version != PERSISTENCE_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported persistence version {version}; only version {PERSISTENCE_VERSION} is supported"
        )));
    }
    Ok(version)
}

/// On-disk layout of the in-memory backend.
#[derive(Serialize, Deserialize)]
struct PersistedState {
    /// File format version for compatibility checking
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "validate_persistence_version"
    )]
    version: u8,
    #[serde(flatten)]
    state: State,
}

pub(crate) async fn save_to_file<P: AsRef<Path>>(backend: &InMemory, path: P) -> Result<()> {
    let persisted = PersistedState {
        version: PERSISTENCE_VERSION,
        state: backend.state.read().await.clone(),
    };
    let json = serde_json::to_string_pretty(&persisted)
        .map_err(|e| BackendError::SerializationFailed { source: e })?;
    tokio::fs::write(path.as_ref(), json)
        .await
        .map_err(|e| BackendError::FileIo { source: e })?;

    tracing::debug!(
        path = %path.as_ref().display(),
        boards = persisted.state.boards.len(),
        lists = persisted.state.lists.len(),
        cards = persisted.state.cards.len(),
        "Saved in-memory state"
    );
    Ok(())
}

pub(crate) async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<State> {
    let json = tokio::fs::read_to_string(path.as_ref())
        .await
        .map_err(|e| BackendError::FileIo { source: e })?;
    let persisted: PersistedState = serde_json::from_str(&json)
        .map_err(|e| BackendError::DeserializationFailed { source: e })?;
    Ok(persisted.state)
}
