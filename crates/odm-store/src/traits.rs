use odm_document::DocumentNode;

use crate::error::StoreResult;

/// Fetches stored documents by identifier.
///
/// All implementations must satisfy these invariants:
/// - A missing document is `Ok(None)`; errors are reserved for failures.
/// - Fetching has no side effects visible to other fetches.
/// - Implementations are thread-safe (`Send + Sync`).
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the document stored under `id`.
    ///
    /// `target` names what the caller expects to find: the stored collection
    /// of the referenced type when it is known, its type name otherwise.
    /// Backends that keep one keyspace may ignore it.
    fn fetch_by_id(&self, id: &str, target: &str) -> StoreResult<Option<DocumentNode>>;

    /// Fetch several documents in one call.
    ///
    /// Default implementation calls `fetch_by_id()` for each identifier.
    /// Backends may override for fewer round-trips.
    fn fetch_batch(&self, ids: &[String], target: &str) -> StoreResult<Vec<Option<DocumentNode>>> {
        ids.iter().map(|id| self.fetch_by_id(id, target)).collect()
    }
}
