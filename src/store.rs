//! The external option store and the bridge that reads it through the
//! catalogue.
//!
//! The store is a live key-value surface owned by a collaborator: values are
//! raw strings keyed by option name, absence means "not configured". The
//! bridge turns that surface into typed (option, raw value) snapshots for the
//! engine provider, without inventing defaults of its own.

use crate::options::Opt;
use log::warn;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

/// Callback fired with the key of every changed value.
pub type ChangeListener = Box<dyn Fn(&str) + Send + Sync>;

/// Store-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The external store could not be read at all.
    #[error("option store unavailable: {0}")]
    Unavailable(String),
}

/// A live, externally-persisted key-value configuration.
///
/// Reads are cheap and may happen concurrently; change notifications drive
/// engine invalidation (see [`crate::provider::EngineProvider`]).
pub trait OptionStore: Send + Sync {
    /// Raw value for `key`; `None` when unset.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Register a listener fired with the key of every changed value.
    fn subscribe(&self, listener: ChangeListener);
}

/// In-memory store for programmatic embedding and tests.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one value and notify subscribers.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values
            .write()
            .unwrap()
            .insert(key.to_string(), value.into());
        self.notify(key);
    }

    /// Remove one value; notifies subscribers only if it was present.
    pub fn remove(&self, key: &str) {
        let removed = self.values.write().unwrap().remove(key).is_some();
        if removed {
            self.notify(key);
        }
    }

    fn notify(&self, key: &str) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(key);
        }
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("values", &self.values.read().unwrap().len())
            .finish()
    }
}

impl OptionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().unwrap().get(key).cloned())
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.listeners.lock().unwrap().push(listener);
    }
}

/// Store backed by a flat JSON object file.
///
/// Values may be JSON strings, booleans, or numbers; everything is exposed as
/// a raw string, the way the catalogue's conversion layer expects it. A
/// missing file is an empty store (nothing configured); a present but
/// unparsable file is [`StoreError::Unavailable`].
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl JsonFileStore {
    /// Open the store at `path`, reading the current contents.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = Self::read_values(&path)?;
        Ok(Self {
            path,
            values: RwLock::new(values),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Override one value in memory (not written back to the file) and
    /// notify subscribers. Used for command-line overrides.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values
            .write()
            .unwrap()
            .insert(key.to_string(), value.into());
        self.notify(key);
    }

    /// Re-read the file and notify subscribers of every changed key.
    pub fn reload(&self) -> Result<(), StoreError> {
        let fresh = Self::read_values(&self.path)?;
        let changed: Vec<String> = {
            let current = self.values.read().unwrap();
            let mut keys: Vec<String> = Vec::new();
            for (key, value) in &fresh {
                if current.get(key) != Some(value) {
                    keys.push(key.clone());
                }
            }
            for key in current.keys() {
                if !fresh.contains_key(key) {
                    keys.push(key.clone());
                }
            }
            keys
        };
        *self.values.write().unwrap() = fresh;
        for key in &changed {
            self.notify(key);
        }
        Ok(())
    }

    fn notify(&self, key: &str) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(key);
        }
    }

    fn read_values(path: &Path) -> Result<HashMap<String, String>, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => {
                return Err(StoreError::Unavailable(format!(
                    "{}: {}",
                    path.display(),
                    err
                )))
            }
        };

        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|err| StoreError::Unavailable(format!("{}: {}", path.display(), err)))?;

        let mut values = HashMap::new();
        for (key, value) in object {
            match value {
                serde_json::Value::String(s) => {
                    values.insert(key, s);
                }
                serde_json::Value::Bool(b) => {
                    values.insert(key, b.to_string());
                }
                serde_json::Value::Number(n) => {
                    values.insert(key, n.to_string());
                }
                other => {
                    warn!(
                        "ignoring setting `{}` in {}: unsupported value {}",
                        key,
                        path.display(),
                        other
                    );
                }
            }
        }
        Ok(values)
    }
}

impl OptionStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().unwrap().get(key).cloned())
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.listeners.lock().unwrap().push(listener);
    }
}

/// Read-only view of the store through the option catalogue.
#[derive(Clone)]
pub struct OptionsBridge {
    store: Arc<dyn OptionStore>,
}

impl OptionsBridge {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn OptionStore> {
        &self.store
    }

    /// Snapshot of every configured option, in catalogue order.
    ///
    /// Absent options are omitted: "not configured" means the ruleset's own
    /// default applies, and that default is not this layer's to invent.
    pub fn current_values(&self) -> Result<Vec<(Opt, String)>, StoreError> {
        let mut values = Vec::new();
        for &opt in Opt::all() {
            if let Some(raw) = self.store.get(opt.name())? {
                values.push((opt, raw));
            }
        }
        Ok(values)
    }
}
