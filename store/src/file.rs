//! JSON-file backed store that survives restarts.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::backend::KeyValueStore;
use crate::error::{StoreError, StoreResult};

/// Store persisted as a single JSON object on disk.
///
/// Reads go to the file every time, so several processes sharing one file
/// see each other's writes. `set_all` merges its batch into the current
/// file contents under an exclusive lock on a sibling `.lock` file, then
/// replaces the file through a uniquely named temporary and a rename.
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    /// Open a store file, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = load(&path)?;
        if !path.exists() {
            info!(path = %path.display(), "Store file not found, starting with defaults");
        }

        debug!(path = %path.display(), keys = entries.len(), "Opened store file");
        Ok(Self {
            lock_path: path.with_extension("lock"),
            path,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exclusive writer lock, released when the returned file is dropped.
    fn lock(&self) -> StoreResult<File> {
        let io_err = |source| StoreError::Io {
            path: self.lock_path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(io_err)?;
        file.lock_exclusive().map_err(io_err)?;
        Ok(file)
    }

    fn write(&self, entries: &BTreeMap<String, Value>) -> StoreResult<()> {
        let contents = serde_json::to_string_pretty(entries)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let io_err = |source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(contents.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_many(&self, keys: &[&str]) -> StoreResult<Vec<Option<Value>>> {
        let entries = load(&self.path)?;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_all(&self, batch: Vec<(String, Value)>) -> StoreResult<()> {
        let _lock = self.lock()?;

        // Merge into what is on disk now, not what this handle saw last.
        let mut entries = load(&self.path)?;
        entries.extend(batch);
        self.write(&entries)
    }
}

/// Read the store file. Missing or blank files read as empty.
fn load(path: &Path) -> StoreResult<BTreeMap<String, Value>> {
    match fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
        Ok(contents) => parse(path, &contents),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse(path: &Path, contents: &str) -> StoreResult<BTreeMap<String, Value>> {
    match serde_json::from_str::<Value>(contents) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
        Err(e) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
