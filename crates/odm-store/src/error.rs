/// Errors from document fetch operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backend failed while serving the request.
    #[error("backend error: {0}")]
    Backend(String),

    /// A stored document could not be decoded into a document tree.
    #[error("corrupt document {id}: {reason}")]
    CorruptDocument { id: String, reason: String },

    /// The store's internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// The store is not reachable.
    #[error("store is unavailable")]
    Unavailable,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
