use std::collections::HashMap;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::error::Error;

/// Key under which the bearer token is persisted.
pub const AUTHORIZATION_STORAGE_KEY: &str = "authorization";

const PROBE_KEY: &str = "__storage_probe__";
const PROBE_VALUE: &str = "probe";

/// A small string key/value store holding session state.
pub trait SessionStore: Send + Sync + Debug {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error>;

    fn remove_item(&self, key: &str) -> Result<(), Error>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), Error> {
        (**self).remove_item(key)
    }
}

/// Lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        let items = self
            .items
            .lock()
            .map_err(|_| Error::Storage("memory store poisoned".into()))?;

        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.items
            .lock()
            .map_err(|_| Error::Storage("memory store poisoned".into()))?
            .insert(key.to_owned(), value.to_owned());

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.items
            .lock()
            .map_err(|_| Error::Storage("memory store poisoned".into()))?
            .remove(key);

        Ok(())
    }
}

/// One file per key inside `dir`. Survives restarts.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, Error> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if !valid {
            return Err(Error::Storage(format!("invalid storage key {:?}", key)));
        }

        Ok(self.dir.join(key))
    }
}

impl SessionStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        match std::fs::read_to_string(self.path(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::IO(e)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        let path = self.path(key)?;

        std::fs::create_dir_all(&self.dir)?;

        // the token file is replaced whole, never partially written
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), Error> {
        match std::fs::remove_file(self.path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::IO(e)),
        }
    }
}

/// Durable storage when it works, session storage when it does not.
#[derive(Debug)]
pub enum FallbackStore {
    Durable(FileStore),
    Session(MemoryStore),
}

impl FallbackStore {
    /// Probes `dir` with a write/read/delete cycle and falls back to memory if
    /// any step fails.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let durable = FileStore::new(dir);

        match probe(&durable) {
            Ok(()) => {
                tracing::debug!("using durable session store at {}", durable.dir().display());
                FallbackStore::Durable(durable)
            }
            Err(e) => {
                tracing::warn!(
                    "durable session store at {} unavailable ({}), falling back to session storage",
                    durable.dir().display(),
                    e
                );
                FallbackStore::Session(MemoryStore::new())
            }
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, FallbackStore::Durable(_))
    }

    fn inner(&self) -> &dyn SessionStore {
        match self {
            FallbackStore::Durable(store) => store,
            FallbackStore::Session(store) => store,
        }
    }
}

fn probe(store: &dyn SessionStore) -> Result<(), Error> {
    store.set_item(PROBE_KEY, PROBE_VALUE)?;

    let read = store.get_item(PROBE_KEY)?;

    store.remove_item(PROBE_KEY)?;

    if read.as_deref() != Some(PROBE_VALUE) {
        return Err(Error::Storage("probe value did not round trip".into()));
    }

    Ok(())
}

impl SessionStore for FallbackStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        self.inner().get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.inner().set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.inner().remove_item(key)
    }
}
