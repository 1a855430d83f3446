//! Document-fetch collaborator for the object-document mapper.
//!
//! The mapping core never talks to a store directly. The only capability it
//! consumes is "fetch the document with this identifier", and only the
//! reference resolver calls it. This crate defines that seam.
//!
//! # Backends
//!
//! All backends implement the [`DocumentFetcher`] trait:
//!
//! - [`InMemoryDocumentStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. "Not found" is `Ok(None)`, never an error. The caller decides what a
//!    missing document means.
//! 2. Backend failures are propagated as [`StoreError`], never swallowed.
//! 3. Retry policy, if any, belongs to the backend, not to the mapper.
//! 4. Fetchers must be safe to share across threads.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDocumentStore;
pub use traits::DocumentFetcher;
