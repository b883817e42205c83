//! Durable key-value store.
//!
//! The store follows NVS semantics: values are grouped into namespaces,
//! writes are staged with [`KeyValueStore::put`] and only become visible to
//! [`KeyValueStore::get`] once [`KeyValueStore::commit`] returns. A crash
//! between the two leaves the previously committed value in place.
//!
//! Two implementations are provided:
//! - [`MemoryStore`] for tests and volatile setups
//! - [`FileStore`] which keeps one JSON document per namespace on disk

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::warn;

/// Longest namespace or key name accepted (NVS limit).
pub const MAX_KEY_LEN: usize = 15;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has never been committed (or was erased).
    #[error("key not found: {namespace}/{key}")]
    NotFound { namespace: String, key: String },

    /// Namespace or key name is empty, too long or has odd characters.
    #[error("invalid namespace or key name: {0:?}")]
    InvalidName(String),

    /// Backing storage could not be opened.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the backing storage failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The committed document for a namespace could not be decoded.
    #[error("corrupt data in namespace {namespace}: {source}")]
    Corrupt {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Namespaced key-value persistence with explicit commit.
///
/// All methods are synchronous: `commit` blocks until the data is durable.
pub trait KeyValueStore: Send + Sync {
    /// Read the committed value of a key.
    ///
    /// Returns [`StoreError::NotFound`] for missing keys; an empty string is
    /// a present value.
    fn get(&self, namespace: &str, key: &str) -> Result<String, StoreError>;

    /// Stage a value. Not visible until [`commit`](Self::commit).
    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError>;

    /// Stage the removal of a key.
    fn erase(&self, namespace: &str, key: &str) -> Result<(), StoreError>;

    /// Atomically publish every staged change of a namespace.
    fn commit(&self, namespace: &str) -> Result<(), StoreError>;
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_KEY_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Committed values plus pending changes for one namespace.
#[derive(Debug, Default)]
struct Namespace {
    committed: BTreeMap<String, String>,
    /// `None` marks a staged erase.
    staged: BTreeMap<String, Option<String>>,
}

impl Namespace {
    fn get(&self, namespace: &str, key: &str) -> Result<String, StoreError> {
        self.committed
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }

    /// Committed values with the staged changes applied.
    fn merged(&self) -> BTreeMap<String, String> {
        let mut next = self.committed.clone();
        for (key, value) in &self.staged {
            match value {
                Some(value) => {
                    next.insert(key.clone(), value.clone());
                }
                None => {
                    next.remove(key);
                }
            }
        }
        next
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store, used by tests and when no storage directory is usable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, Namespace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<String, StoreError> {
        validate_name(namespace)?;
        validate_name(key)?;
        let namespaces = lock(&self.namespaces);
        match namespaces.get(namespace) {
            Some(ns) => ns.get(namespace, key),
            None => Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            }),
        }
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        validate_name(namespace)?;
        validate_name(key)?;
        lock(&self.namespaces)
            .entry(namespace.to_string())
            .or_default()
            .staged
            .insert(key.to_string(), Some(value.to_string()));
        Ok(())
    }

    fn erase(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        validate_name(namespace)?;
        validate_name(key)?;
        lock(&self.namespaces)
            .entry(namespace.to_string())
            .or_default()
            .staged
            .insert(key.to_string(), None);
        Ok(())
    }

    fn commit(&self, namespace: &str) -> Result<(), StoreError> {
        validate_name(namespace)?;
        let mut namespaces = lock(&self.namespaces);
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.committed = ns.merged();
            ns.staged.clear();
        }
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// Store that persists each namespace as `<dir>/<namespace>.json`.
///
/// Commit writes the full document to a temporary file, syncs it and renames
/// it over the previous document, so readers after a power loss see either
/// the old or the new document, never a mix.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    /// Namespaces loaded from disk so far.
    namespaces: Mutex<HashMap<String, Namespace>>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            namespaces: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    fn load_document(&self, namespace: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let path = self.document_path(namespace);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                namespace: namespace.to_string(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Run `f` on the cached namespace, loading it from disk on first use.
    ///
    /// Writers start from an empty document when the committed one is
    /// corrupt, so the next commit replaces it.
    fn with_namespace<R>(
        &self,
        namespace: &str,
        for_write: bool,
        f: impl FnOnce(&mut Namespace) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut namespaces = lock(&self.namespaces);
        if !namespaces.contains_key(namespace) {
            let committed = match self.load_document(namespace) {
                Ok(document) => document,
                Err(StoreError::Corrupt { source, .. }) if for_write => {
                    warn!("Discarding corrupt namespace {}: {}", namespace, source);
                    BTreeMap::new()
                }
                Err(e) => return Err(e),
            };
            namespaces.insert(
                namespace.to_string(),
                Namespace {
                    committed,
                    staged: BTreeMap::new(),
                },
            );
        }
        match namespaces.get_mut(namespace) {
            Some(ns) => f(ns),
            None => Err(StoreError::Unavailable(format!(
                "namespace {namespace} vanished from cache"
            ))),
        }
    }

    fn write_document(
        &self,
        namespace: &str,
        document: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Corrupt {
            namespace: namespace.to_string(),
            source,
        })?;

        let path = self.document_path(namespace);
        let tmp = self.dir.join(format!("{namespace}.json.tmp"));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        // Persist the rename itself. Not every platform can open a directory.
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<String, StoreError> {
        validate_name(namespace)?;
        validate_name(key)?;
        self.with_namespace(namespace, false, |ns| ns.get(namespace, key))
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        validate_name(namespace)?;
        validate_name(key)?;
        self.with_namespace(namespace, true, |ns| {
            ns.staged.insert(key.to_string(), Some(value.to_string()));
            Ok(())
        })
    }

    fn erase(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        validate_name(namespace)?;
        validate_name(key)?;
        self.with_namespace(namespace, true, |ns| {
            ns.staged.insert(key.to_string(), None);
            Ok(())
        })
    }

    fn commit(&self, namespace: &str) -> Result<(), StoreError> {
        validate_name(namespace)?;
        self.with_namespace(namespace, true, |ns| {
            if ns.staged.is_empty() {
                return Ok(());
            }
            let next = ns.merged();
            // Keep the old committed view if the write fails.
            self.write_document(namespace, &next)?;
            ns.committed = next;
            ns.staged.clear();
            Ok(())
        })
    }
}
