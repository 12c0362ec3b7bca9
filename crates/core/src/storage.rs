//! Durable key-value storage for session tokens
//!
//! The values are opaque strings; this layer does no validation, expiry
//! tracking or encryption. Native builds keep them in a JSON file inside the
//! state directory, browser builds in `window.localStorage`.

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// Keys owned by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
    SelectedOtherlinkId,
}

impl StorageKey {
    /// Name of the key in durable storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "accessToken",
            Self::RefreshToken => "refreshToken",
            Self::SelectedOtherlinkId => "selectedOtherlinkId",
        }
    }
}

/// Durable string storage shared by the session manager and the API client
pub trait TokenStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Option<String>;

    fn set(&self, key: StorageKey, value: &str) -> CoreResult<()>;

    fn remove(&self, key: StorageKey) -> CoreResult<()>;
}

/// Process-local storage, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> CoreResult<()> {
        self.values
            .write()
            .map_err(|_| CoreError::storage("memory store lock poisoned"))?
            .insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> CoreResult<()> {
        self.values
            .write()
            .map_err(|_| CoreError::storage("memory store lock poisoned"))?
            .remove(&key);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use super::{StorageKey, TokenStore};
    use crate::error::{CoreError, CoreResult};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tracing::{debug, warn};

    /// JSON file holding `{ "accessToken": "...", ... }`
    ///
    /// Every write rewrites the whole file through a temporary sibling and a
    /// rename, so a crash never leaves a half-written session behind.
    #[derive(Debug)]
    pub struct FileStore {
        path: PathBuf,
        cache: Mutex<BTreeMap<String, String>>,
    }

    impl FileStore {
        /// Open (or lazily create) the store at `path`
        pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
            let path = path.into();
            let cache = if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                if content.trim().is_empty() {
                    BTreeMap::new()
                } else {
                    match serde_json::from_str(&content) {
                        Ok(values) => values,
                        Err(e) => {
                            warn!(path = %path.display(), "Discarding unreadable session file: {e}");
                            BTreeMap::new()
                        }
                    }
                }
            } else {
                BTreeMap::new()
            };

            debug!(path = %path.display(), entries = cache.len(), "Opened session store");
            Ok(Self {
                path,
                cache: Mutex::new(cache),
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn persist(&self, values: &BTreeMap<String, String>) -> CoreResult<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = self.path.with_extension("json.tmp");
            std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
            std::fs::rename(&tmp, &self.path)?;
            Ok(())
        }

        /// The cache only changes once the new contents are on disk
        fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> CoreResult<()> {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| CoreError::storage("file store lock poisoned"))?;
            let mut next = cache.clone();
            f(&mut next);
            self.persist(&next)?;
            *cache = next;
            Ok(())
        }
    }

    impl TokenStore for FileStore {
        fn get(&self, key: StorageKey) -> Option<String> {
            self.cache
                .lock()
                .ok()
                .and_then(|cache| cache.get(key.as_str()).cloned())
        }

        fn set(&self, key: StorageKey, value: &str) -> CoreResult<()> {
            self.update(|cache| {
                cache.insert(key.as_str().to_string(), value.to_string());
            })
        }

        fn remove(&self, key: StorageKey) -> CoreResult<()> {
            self.update(|cache| {
                cache.remove(key.as_str());
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserStore;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{StorageKey, TokenStore};
    use crate::error::{CoreError, CoreResult};
    use gloo::storage::{LocalStorage, Storage};

    /// `window.localStorage`, storing raw strings (not JSON-encoded values)
    #[derive(Debug, Default, Clone, Copy)]
    pub struct BrowserStore;

    impl TokenStore for BrowserStore {
        fn get(&self, key: StorageKey) -> Option<String> {
            LocalStorage::raw().get_item(key.as_str()).ok().flatten()
        }

        fn set(&self, key: StorageKey, value: &str) -> CoreResult<()> {
            LocalStorage::raw()
                .set_item(key.as_str(), value)
                .map_err(|e| CoreError::storage(format!("localStorage.setItem failed: {e:?}")))
        }

        fn remove(&self, key: StorageKey) -> CoreResult<()> {
            LocalStorage::raw()
                .remove_item(key.as_str())
                .map_err(|e| CoreError::storage(format!("localStorage.removeItem failed: {e:?}")))
        }
    }
}
