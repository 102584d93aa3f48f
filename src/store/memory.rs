// In-memory document store backed by DashMap

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use super::{merge_patch, Collection, Document, DocumentId, DocumentStore, Query, StoreError};

/// Concurrent in-memory store.
///
/// Each collection is a vector in insertion order; DashMap shards the lock
/// per collection so writers to different collections never contend.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<Collection, Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .get(&collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    /// Snapshot of a collection in insertion order
    pub fn snapshot(&self, collection: Collection) -> Vec<Document> {
        self.collections
            .get(&collection)
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    /// Validate a body and assign it a fresh id, without storing it
    pub(crate) fn new_document(body: Value) -> Result<Document, StoreError> {
        if !body.is_object() {
            return Err(StoreError::NotAnObject);
        }
        Ok(Document {
            id: Uuid::new_v4().to_string(),
            body,
        })
    }

    pub(crate) fn insert_document(
        &self,
        collection: Collection,
        body: Value,
    ) -> Result<Document, StoreError> {
        let document = Self::new_document(body)?;
        self.restore(collection, document.clone());
        Ok(document)
    }

    /// Append an already identified document (loading from disk, committed writes)
    pub(crate) fn restore(&self, collection: Collection, document: Document) {
        self.collections
            .entry(collection)
            .or_default()
            .push(document);
    }

    /// Swap in a new version of an existing document
    pub(crate) fn replace(&self, collection: Collection, document: Document) {
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            if let Some(slot) = docs.iter_mut().find(|doc| doc.id == document.id) {
                *slot = document;
            }
        }
    }

    /// Merge `patch` into a document while holding the collection shard lock.
    ///
    /// With a condition, returns `Ok(None)` and leaves the document untouched
    /// when it does not match.
    pub(crate) fn apply_update(
        &self,
        collection: Collection,
        id: &str,
        condition: Option<&Query>,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        let not_found = || StoreError::NotFound {
            collection: collection.as_str(),
            id: id.to_string(),
        };

        let mut docs = self.collections.get_mut(&collection).ok_or_else(not_found)?;
        let doc = docs
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(not_found)?;
        if let Some(condition) = condition {
            if !condition.matches(&doc.body) {
                return Ok(None);
            }
        }
        merge_patch(&mut doc.body, patch)?;
        Ok(Some(doc.clone()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: Collection, body: Value) -> Result<DocumentId, StoreError> {
        self.insert_document(collection, body).map(|doc| doc.id)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }

    async fn find(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(query.apply(self.snapshot(collection)))
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<Document, StoreError> {
        self.apply_update(collection, id, None, patch)?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.as_str(),
                id: id.to_string(),
            })
    }

    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        condition: &Query,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        self.apply_update(collection, id, Some(condition), patch)
    }
}
