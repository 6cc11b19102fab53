//! qaboard-store: Document Store Client for qaboard
//!
//! This crate is the only place that talks to the remote document database.
//! Everything above it sees the narrow [`DocumentStore`] capability surface:
//! fetch by id, list a collection, resolve a reference, add, and patch.
//!
//! ## Key Components
//!
//! - `DocumentStore`: backend-agnostic async trait
//! - `SurrealDocumentStore`: SurrealDB backend (in-memory, local file, or remote)
//! - `fakes::MemoryDocumentStore`: in-memory fake with failure injection
//! - `StoreConfig`: connection settings, readable from the environment

mod config;
mod error;
pub mod fakes;
pub mod storage_traits;
pub mod surreal_store;

pub use config::{StoreConfig, DEFAULT_URL};
pub use error::StorageError;
pub use storage_traits::{
    Document, DocumentData, DocumentId, DocumentPatch, DocumentRef, DocumentStore, FieldUpdate,
    StorageResult,
};
pub use surreal_store::SurrealDocumentStore;
