//! In-memory fake for the `DocumentStore` trait (testing and local runs)
//!
//! `MemoryDocumentStore` satisfies the trait contract without any external
//! dependencies and adds the knobs tests need to exercise failure paths:
//! per-document read failures, per-collection write and list failures,
//! per-document read latency, and per-operation call counters.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

type Key = (String, DocumentId);

#[derive(Debug, Default)]
struct Faults {
    failing_reads: HashSet<Key>,
    failing_writes: HashSet<String>,
    failing_lists: HashSet<String>,
    read_delays: HashMap<Key, Duration>,
}

/// Number of calls made to each `DocumentStore` operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub list: usize,
    pub resolve: usize,
    pub add: usize,
    pub update: usize,
}

#[derive(Debug, Default)]
struct Counters {
    get: AtomicUsize,
    list: AtomicUsize,
    resolve: AtomicUsize,
    add: AtomicUsize,
    update: AtomicUsize,
}

/// In-memory document store backed by `HashMap<collection, BTreeMap<id, data>>`.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, BTreeMap<DocumentId, DocumentData>>>,
    faults: Mutex<Faults>,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document under a caller-chosen id, replacing any previous one.
    pub fn insert(
        &self,
        collection: &str,
        id: impl Into<DocumentId>,
        data: DocumentData,
    ) -> DocumentRef {
        let id = id.into();
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        DocumentRef::new(collection, id)
    }

    /// Peek at a document without going through the trait (not counted).
    pub fn document(&self, collection: &str, id: &DocumentId) -> Option<DocumentData> {
        lock(&self.collections)
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        lock(&self.collections)
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Make every read of `reference` fail with a backend error.
    pub fn fail_reads_of(&self, reference: &DocumentRef) {
        lock(&self.faults)
            .failing_reads
            .insert((reference.collection.clone(), reference.id.clone()));
    }

    /// Make `add_document` and `update_document` on `collection` fail.
    pub fn fail_writes_to(&self, collection: &str) {
        lock(&self.faults)
            .failing_writes
            .insert(collection.to_string());
    }

    /// Make `list_documents` on `collection` fail.
    pub fn fail_lists_of(&self, collection: &str) {
        lock(&self.faults)
            .failing_lists
            .insert(collection.to_string());
    }

    /// Delay every read of `reference` by `delay` (tokio timer).
    pub fn delay_reads_of(&self, reference: &DocumentRef, delay: Duration) {
        lock(&self.faults)
            .read_delays
            .insert((reference.collection.clone(), reference.id.clone()), delay);
    }

    /// Clear every injected fault and delay.
    pub fn heal(&self) {
        *lock(&self.faults) = Faults::default();
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get: self.counters.get.load(Ordering::SeqCst),
            list: self.counters.list.load(Ordering::SeqCst),
            resolve: self.counters.resolve.load(Ordering::SeqCst),
            add: self.counters.add.load(Ordering::SeqCst),
            update: self.counters.update.load(Ordering::SeqCst),
        }
    }

    async fn read(&self, collection: &str, id: &DocumentId) -> StorageResult<Option<Document>> {
        let key = (collection.to_string(), id.clone());
        let (delay, failing) = {
            let faults = lock(&self.faults);
            (
                faults.read_delays.get(&key).copied(),
                faults.failing_reads.contains(&key),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(StorageError::Injected(format!("read {collection}/{id}")));
        }
        Ok(self
            .document(collection, id)
            .map(|data| Document::new(DocumentRef::new(collection, id.clone()), data)))
    }

    fn check_writable(&self, collection: &str) -> StorageResult<()> {
        if lock(&self.faults).failing_writes.contains(collection) {
            return Err(StorageError::Injected(format!("write {collection}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<Option<Document>> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        self.read(collection, id).await
    }

    async fn list_documents(&self, collection: &str) -> StorageResult<Vec<Document>> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        if lock(&self.faults).failing_lists.contains(collection) {
            return Err(StorageError::Injected(format!("list {collection}")));
        }
        let collections = lock(&self.collections);
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| {
                        Document::new(DocumentRef::new(collection, id.clone()), data.clone())
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn resolve_reference(&self, reference: &DocumentRef) -> StorageResult<Option<Document>> {
        self.counters.resolve.fetch_add(1, Ordering::SeqCst);
        self.read(&reference.collection, &reference.id).await
    }

    async fn add_document(
        &self,
        collection: &str,
        data: DocumentData,
    ) -> StorageResult<DocumentRef> {
        self.counters.add.fetch_add(1, Ordering::SeqCst);
        self.check_writable(collection)?;
        Ok(self.insert(collection, DocumentId::generate(), data))
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: DocumentPatch,
    ) -> StorageResult<()> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        self.check_writable(collection)?;
        let mut collections = lock(&self.collections);
        let data = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StorageError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        patch.apply(data);
        Ok(())
    }
}
