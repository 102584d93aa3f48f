// Document repository abstraction
//
// Conversation entries, crisis alerts, enrollment records, responders and the
// resource catalog all live behind `DocumentStore`. Implementations only need
// create, get, filtered find and shallow-merge update.

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Identifier assigned by the store on create
pub type DocumentId = String;

/// Named document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    ConversationEntries,
    CrisisAlerts,
    Enrollments,
    Resources,
    Responders,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::ConversationEntries,
        Collection::CrisisAlerts,
        Collection::Enrollments,
        Collection::Resources,
        Collection::Responders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::ConversationEntries => "conversation_entries",
            Collection::CrisisAlerts => "crisis_alerts",
            Collection::Enrollments => "enrollments",
            Collection::Resources => "resources",
            Collection::Responders => "responders",
        }
    }
}

/// Errors raised by document stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {id} not found in {collection}")]
    NotFound { collection: &'static str, id: String },

    #[error("document body must be a JSON object")]
    NotAnObject,

    #[error("failed to encode or decode document: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A stored document: store-assigned id plus the JSON body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub body: Value,
}

impl Document {
    /// Decode the body into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Stored<T>, StoreError> {
        let record = serde_json::from_value(self.body.clone())?;
        Ok(Stored {
            id: self.id.clone(),
            record,
        })
    }
}

/// Typed record together with its store id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<T> {
    pub id: DocumentId,
    #[serde(flatten)]
    pub record: T,
}

/// Field predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    fn matches(&self, body: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => body.get(field) == Some(expected),
            Filter::In(field, candidates) => body
                .get(field)
                .map(|actual| candidates.contains(actual))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

/// Filter + optional sort + optional limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
    sort: Option<Sort>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn any_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(field.into(), values));
        self
    }

    pub fn newest_first(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn oldest_first(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, body: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(body))
    }

    /// Filter, sort and cap documents given in insertion order.
    ///
    /// Ties keep insertion order for ascending sorts and reverse insertion
    /// order for descending sorts, so "newest first" holds even when two
    /// documents share a timestamp.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.matches(&doc.body))
            .collect();

        if let Some(sort) = &self.sort {
            if sort.descending {
                matched.reverse();
            }
            matched.sort_by(|a, b| {
                let ordering = compare_fields(a.body.get(&sort.field), b.body.get(&sort.field));
                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Compare two JSON field values: timestamps chronologically, numbers
/// numerically, everything else by its string form. Missing sorts first.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (parse_timestamp(x), parse_timestamp(y)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}

/// Trait for document repositories
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return its id
    async fn create(&self, collection: Collection, body: Value) -> Result<DocumentId, StoreError>;

    /// Fetch a single document by id
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Find documents matching a query
    async fn find(&self, collection: Collection, query: &Query)
        -> Result<Vec<Document>, StoreError>;

    /// Merge the top-level keys of `patch` into an existing document
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<Document, StoreError>;

    /// Apply `patch` only if the document still matches `condition`.
    ///
    /// Check and write are atomic per document. `Ok(None)` means the
    /// document exists but no longer matches.
    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        condition: &Query,
        patch: Value,
    ) -> Result<Option<Document>, StoreError>;
}

/// Serialize a record and insert it
pub async fn insert<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: Collection,
    record: &T,
) -> Result<DocumentId, StoreError> {
    let body = serde_json::to_value(record)?;
    store.create(collection, body).await
}

/// Find and decode records
pub async fn find_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    query: &Query,
) -> Result<Vec<Stored<T>>, StoreError> {
    store
        .find(collection, query)
        .await?
        .iter()
        .map(Document::decode)
        .collect()
}

/// Fetch and decode a single record
pub async fn get_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<Option<Stored<T>>, StoreError> {
    match store.get(collection, id).await? {
        Some(doc) => doc.decode().map(Some),
        None => Ok(None),
    }
}

/// Shallow merge used by every store implementation
pub(crate) fn merge_patch(target: &mut Value, patch: Value) -> Result<(), StoreError> {
    let Value::Object(patch) = patch else {
        return Err(StoreError::NotAnObject);
    };
    let Some(target) = target.as_object_mut() else {
        return Err(StoreError::NotAnObject);
    };
    for (key, value) in patch {
        target.insert(key, value);
    }
    Ok(())
}
