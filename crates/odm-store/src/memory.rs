use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use odm_document::DocumentNode;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::traits::DocumentFetcher;

/// In-memory, HashMap-based document store.
///
/// Intended for tests and embedding. Documents live behind a `RwLock` and are
/// cloned on insert and fetch. Every call to [`DocumentFetcher::fetch_by_id`]
/// is counted, hit or miss, so callers can assert exactly when a fetch
/// happened.
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, DocumentNode>>,
    fetches: AtomicUsize,
    offline: AtomicBool,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Store `document` under `id`, returning the document it replaced.
    pub fn insert(
        &self,
        id: impl Into<String>,
        document: DocumentNode,
    ) -> StoreResult<Option<DocumentNode>> {
        let mut map = self.documents.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.insert(id.into(), document))
    }

    /// Parse `json` and store it under `id`.
    ///
    /// Text that is not valid JSON is rejected with
    /// [`StoreError::CorruptDocument`] and nothing is stored.
    pub fn insert_json(
        &self,
        id: impl Into<String>,
        json: &str,
    ) -> StoreResult<Option<DocumentNode>> {
        let id = id.into();
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| StoreError::CorruptDocument {
                id: id.clone(),
                reason: e.to_string(),
            })?;
        self.insert(id, DocumentNode::from_json(value))
    }

    /// Remove the document stored under `id`. Returns `true` if it existed.
    pub fn remove(&self, id: &str) -> StoreResult<bool> {
        let mut map = self.documents.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.remove(id).is_some())
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of all stored identifiers.
    pub fn ids(&self) -> Vec<String> {
        let map = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Total number of fetches served since creation or the last reset.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn reset_fetch_count(&self) {
        self.fetches.store(0, Ordering::SeqCst);
    }

    /// Simulate an unreachable backend: while offline every fetch fails
    /// with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFetcher for InMemoryDocumentStore {
    fn fetch_by_id(&self, id: &str, target: &str) -> StoreResult<Option<DocumentNode>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        let map = self.documents.read().map_err(|_| StoreError::LockPoisoned)?;
        let found = map.get(id).cloned();
        trace!(id, target, hit = found.is_some(), "in-memory fetch");
        Ok(found)
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("document_count", &self.len())
            .field("fetch_count", &self.fetch_count())
            .finish()
    }
}
