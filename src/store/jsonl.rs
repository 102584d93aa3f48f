// JSONL-backed document store
//
// One `<collection>.jsonl` file per collection inside a data directory.
// Documents are cached in memory. Every write reaches disk before the cache:
// creates append a line, updates rewrite the collection file through a temp
// file + rename.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::memory::MemoryStore;
use super::{merge_patch, Collection, Document, DocumentId, DocumentStore, Query, StoreError};

pub struct JsonlStore {
    dir: PathBuf,
    cache: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open (or create) a store rooted at `dir`, loading existing documents
    ///
    /// A torn final line (crash mid-append) is dropped and the file rewritten
    /// without it. Unreadable lines anywhere else fail the open.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let cache = MemoryStore::new();
        for collection in Collection::ALL {
            let path = collection_path(&dir, collection);
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let lines: Vec<&str> = contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .collect();
            let mut torn = false;
            for (index, line) in lines.iter().enumerate() {
                match serde_json::from_str::<Document>(line) {
                    Ok(document) => cache.restore(collection, document),
                    Err(e) if index + 1 == lines.len() => {
                        tracing::warn!(
                            file = %path.display(),
                            error = %e,
                            "Dropping torn final line"
                        );
                        torn = true;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if torn {
                write_collection(&dir, collection, &cache.snapshot(collection)).await?;
            }
        }

        tracing::info!(dir = %dir.display(), "Opened JSONL document store");

        Ok(Self {
            dir,
            cache,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn append_line(&self, collection: Collection, document: &Document) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(document)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(collection_path(&self.dir, collection))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Patch a copy, persist the whole collection with it, then commit to the cache
    async fn commit_update(
        &self,
        collection: Collection,
        id: &str,
        condition: Option<&Query>,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut updated = self
            .cache
            .get(collection, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.as_str(),
                id: id.to_string(),
            })?;
        if let Some(condition) = condition {
            if !condition.matches(&updated.body) {
                return Ok(None);
            }
        }
        merge_patch(&mut updated.body, patch)?;

        let documents: Vec<Document> = self
            .cache
            .snapshot(collection)
            .into_iter()
            .map(|doc| if doc.id == id { updated.clone() } else { doc })
            .collect();
        write_collection(&self.dir, collection, &documents).await?;

        self.cache.replace(collection, updated.clone());
        Ok(Some(updated))
    }
}

fn collection_path(dir: &Path, collection: Collection) -> PathBuf {
    dir.join(format!("{}.jsonl", collection.as_str()))
}

async fn write_collection(
    dir: &Path,
    collection: Collection,
    documents: &[Document],
) -> Result<(), StoreError> {
    let mut contents = String::new();
    for document in documents {
        contents.push_str(&serde_json::to_string(document)?);
        contents.push('\n');
    }

    let path = collection_path(dir, collection);
    let tmp = path.with_extension("jsonl.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for JsonlStore {
    async fn create(&self, collection: Collection, body: Value) -> Result<DocumentId, StoreError> {
        let _guard = self.write_lock.lock().await;

        let document = MemoryStore::new_document(body)?;
        self.append_line(collection, &document).await?;
        let id = document.id.clone();
        self.cache.restore(collection, document);
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.cache.get(collection, id).await
    }

    async fn find(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        self.cache.find(collection, query).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<Document, StoreError> {
        self.commit_update(collection, id, None, patch)
            .await?
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
        self.commit_update(collection, id, Some(condition), patch).await
    }
}
