//! String-keyed record storage.
//!
//! The engine only needs get/set/remove over opaque serialized records.
//! `FileStore` keeps one JSON file per key with file locking so that
//! concurrent processes never observe a torn record; `MemoryStore` backs
//! tests.
//!
//! Read-modify-write cycles go through `update`, which `FileStore` guards
//! with an exclusive lock on a `<key>.lock` sidecar file.

use crate::{Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Key-value persistence capability
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    /// Removing an absent key is not an error
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Read, transform and write back a record as one step
    ///
    /// `apply` receives the current value and returns the value to store,
    /// or `None` to leave the record untouched.
    fn update(&mut self, key: &str, apply: &mut Updater<'_>) -> Result<()> {
        read_modify_write(self, key, apply)
    }
}

/// Transformation passed to `KvStore::update`
pub type Updater<'a> = dyn FnMut(Option<String>) -> Result<Option<String>> + 'a;

fn read_modify_write<S: KvStore + ?Sized>(
    store: &mut S,
    key: &str,
    apply: &mut Updater<'_>,
) -> Result<()> {
    let current = store.get(key)?;
    if let Some(next) = apply(current)? {
        store.set(key, &next)?;
    }
    Ok(())
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn update(&mut self, key: &str, apply: &mut Updater<'_>) -> Result<()> {
        (**self).update(key, apply)
    }
}

/// In-memory store
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }
}

/// Directory of `<key>.json` files
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        self.path_with_extension(key, "json")
    }

    fn lock_path_for(&self, key: &str) -> Result<PathBuf> {
        self.path_with_extension(key, "lock")
    }

    fn path_with_extension(&self, key: &str, extension: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", key, extension)))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            return Err(e.into());
        }

        file.unlock()?;
        tracing::trace!("Read record {} from {:?}", key, path);
        Ok(Some(contents))
    }

    /// Atomically writes the record by:
    /// 1. Writing to a locked temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        let temp = NamedTempFile::new_in(&self.dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::trace!("Wrote record {} to {:?}", key, path);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::trace!("Removed record {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Holds an exclusive lock on `<key>.lock` across the whole cycle so
    /// concurrent processes cannot lose each other's writes
    fn update(&mut self, key: &str, apply: &mut Updater<'_>) -> Result<()> {
        let lock_path = self.lock_path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock.lock_exclusive()?;

        let result = read_modify_write(self, key, apply);

        lock.unlock()?;
        tracing::trace!("Updated record {} under {:?}", key, lock_path);
        result
    }
}
