use quiz_core::model::Username;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::json_file::JsonFileRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Repository contract for raw per-user progress documents.
///
/// Documents are exchanged as JSON values so that legacy shapes reach the
/// migration step untouched. Writes replace the whole document.
pub trait DocumentRepository: Send + Sync {
    /// Fetch the stored document for `user`.
    ///
    /// Returns `Ok(None)` when the user has no document yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document exists but cannot be read or parsed.
    fn fetch(&self, user: &Username) -> Result<Option<Value>, StorageError>;

    /// Replace the stored document for `user`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be written.
    fn replace(&self, user: &Username, document: &Value) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    documents: Arc<Mutex<HashMap<Username, Value>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seed a raw document, bypassing migration. Useful for legacy fixtures.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_raw(&self, user: &Username, document: Value) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(user.clone(), document);
        Ok(())
    }
}

impl DocumentRepository for InMemoryRepository {
    fn fetch(&self, user: &Username) -> Result<Option<Value>, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(user).cloned())
    }

    fn replace(&self, user: &Username, document: &Value) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(user.clone(), document.clone());
        Ok(())
    }
}

/// Document repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub documents: Arc<dyn DocumentRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let documents: Arc<dyn DocumentRepository> = Arc::new(InMemoryRepository::new());
        Self { documents }
    }

    /// Build a `Storage` keeping one JSON file per user under `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn json_dir(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let repo = JsonFileRepository::open(dir)?;
        let documents: Arc<dyn DocumentRepository> = Arc::new(repo);
        Ok(Self { documents })
    }
}
