use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::collection::Collection;
use crate::document::Document;
use crate::error::{DbError, DbResult};
use crate::schema::Schema;

const MEMORY_SCHEME: &str = "memory://";
const FILE_SCHEME: &str = "file://";

/// Documents of one collection keyed by id. UUID v7 ids keep insertion order.
pub(crate) type Documents = BTreeMap<Uuid, Document>;
pub(crate) type Collections = HashMap<String, Documents>;

/// Where the store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    File(PathBuf),
}

/// On-disk layout of a file-backed store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    collections: BTreeMap<String, Vec<Document>>,
}

/// Handle to an open store. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Backend,
    collections: RwLock<Collections>,
}

impl Database {
    /// Open a store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_state(Backend::Memory, Collections::new())
    }

    /// Open the store named by a connection string.
    ///
    /// `file://` stores are loaded eagerly; a missing file is created so that
    /// an unwritable location fails here rather than on the first write.
    pub async fn connect(url: &str) -> DbResult<Self> {
        if url == MEMORY_SCHEME {
            tracing::info!(target: "libris-db", "using in-memory store");
            return Ok(Self::in_memory());
        }

        let path = match url.strip_prefix(FILE_SCHEME) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => return Err(DbError::UnsupportedScheme(url.to_string())),
        };

        let collections = match tokio::fs::read(&path).await {
            Ok(bytes) => load_snapshot(&path, &bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|source| DbError::Io {
                            path: parent.to_path_buf(),
                            source,
                        })?;
                }
                let collections = Collections::new();
                write_snapshot(&path, &collections).await?;
                collections
            }
            Err(source) => return Err(DbError::Io { path, source }),
        };

        tracing::info!(
            target: "libris-db",
            path = %path.display(),
            collections = collections.len(),
            "opened file-backed store"
        );

        Ok(Self::with_state(Backend::File(path), collections))
    }

    fn with_state(backend: Backend, collections: Collections) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                collections: RwLock::new(collections),
            }),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Handle to a named collection whose writes are checked by `schema`.
    pub fn collection(&self, name: impl Into<String>, schema: Arc<dyn Schema>) -> Collection {
        Collection::new(self.clone(), name.into(), schema)
    }

    /// Names of collections holding at least one document.
    pub async fn collection_names(&self) -> Vec<String> {
        let collections = self.inner.collections.read().await;
        let mut names: Vec<String> = collections
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn state(&self) -> &RwLock<Collections> {
        &self.inner.collections
    }

    /// Write the current state through to the backend.
    pub(crate) async fn persist(&self, collections: &Collections) -> DbResult<()> {
        match &self.inner.backend {
            Backend::Memory => Ok(()),
            Backend::File(path) => write_snapshot(path, collections).await,
        }
    }
}

fn load_snapshot(path: &Path, bytes: &[u8]) -> DbResult<Collections> {
    let snapshot: Snapshot = serde_json::from_slice(bytes).map_err(|source| DbError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(snapshot
        .collections
        .into_iter()
        .map(|(name, documents)| {
            let documents = documents.into_iter().map(|doc| (doc.id, doc)).collect();
            (name, documents)
        })
        .collect())
}

async fn write_snapshot(path: &Path, collections: &Collections) -> DbResult<()> {
    let snapshot = Snapshot {
        collections: collections
            .iter()
            .map(|(name, documents)| (name.clone(), documents.values().cloned().collect()))
            .collect(),
    };
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, bytes)
        .await
        .map_err(|source| DbError::Io {
            path: staging.clone(),
            source,
        })?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|source| DbError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DeclaredSchema, FieldKind};
    use serde_json::json;

    fn schema() -> Arc<dyn Schema> {
        Arc::new(DeclaredSchema::new("Book").required("title", FieldKind::Text))
    }

    #[tokio::test]
    async fn rejects_unknown_scheme() {
        let err = Database::connect("mongodb://localhost:27017/books")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::UnsupportedScheme(_)));

        let err = Database::connect("file://").await.err().unwrap();
        assert!(matches!(err, DbError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn memory_scheme_opens_empty_store() {
        let db = Database::connect("memory://").await.unwrap();
        assert_eq!(db.backend(), &Backend::Memory);
        assert!(db.collection_names().await.is_empty());
    }

    #[tokio::test]
    async fn file_store_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("books.json");
        let url = format!("file://{}", path.display());

        let db = Database::connect(&url).await.unwrap();
        assert!(path.exists());
        let books = db.collection("books", schema());
        let created = books
            .insert_one(json!({"title": "Dune"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        drop(db);

        let reopened = Database::connect(&url).await.unwrap();
        assert_eq!(reopened.collection_names().await, vec!["books".to_string()]);
        let found = reopened
            .collection("books", schema())
            .find_by_id(&created.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn corrupt_snapshot_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = Database::connect(&format!("file://{}", path.display()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::Corrupt { .. }));
    }
}
