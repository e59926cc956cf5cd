//! Key/value slots backing persisted console state.
//!
//! A slot holds either a string or an explicit `null` marker. Reading a slot
//! that was never written and reading a `null` slot both yield `None`.

use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read storage file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write storage file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode storage file: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes `value` to `key`; `None` stores the `null` marker.
    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

/// A JSON object on disk mapping each key to a string or `null`.
///
/// The whole file is rewritten on every `set`. An unreadable or non-object
/// file is treated as empty and replaced on the next write.
pub struct FileStore {
    path: PathBuf,
    slots: Map<String, Value>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let slots = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(slots)) => slots,
                Ok(_) | Err(_) => {
                    tracing::warn!(
                        "storage file {} is not a JSON object, starting empty",
                        path.display()
                    );
                    Map::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(StorageError::Read { path, source }),
        };

        Ok(Self { path, slots })
    }

    fn persist(&self) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let contents = serde_json::to_string_pretty(&self.slots)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .slots
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::to_string))
    }

    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        let value = value.map_or(Value::Null, |v| Value::String(v.to_string()));
        self.slots.insert(key.to_string(), value);
        tracing::debug!("storage slot {key} updated");
        self.persist()
    }
}

/// In-process store that keeps every write it receives.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slots: std::collections::BTreeMap<String, Option<String>>,
    writes: Vec<(String, Option<String>)>,
    fail_reads: bool,
    fail_writes: bool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let mut slots = std::collections::BTreeMap::new();
        slots.insert(key.to_string(), Some(value.to_string()));
        Self {
            slots,
            ..Self::default()
        }
    }

    /// Makes every `get` fail with a read error.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Makes every `set` fail with a write error; failed writes are not kept.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    fn unavailable() -> io::Error {
        io::Error::other("memory store unavailable")
    }

    /// Every `set` call so far, oldest first.
    pub fn writes(&self) -> &[(String, Option<String>)] {
        &self.writes
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads {
            return Err(StorageError::Read {
                path: PathBuf::from(key),
                source: Self::unavailable(),
            });
        }
        Ok(self.slots.get(key).cloned().flatten())
    }

    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Write {
                path: PathBuf::from(key),
                source: Self::unavailable(),
            });
        }
        let value = value.map(str::to_string);
        self.slots.insert(key.to_string(), value.clone());
        self.writes.push((key.to_string(), value));
        Ok(())
    }
}
