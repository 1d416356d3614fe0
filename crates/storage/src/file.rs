use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json},
};
use snafu::ResultExt;

use crate::KeyValueStore;
use crate::error::{
    CreateDirSnafu, RenameTempFileSnafu, SerializeEntriesSnafu, StorageResult, WriteFileSnafu,
};

pub const STORAGE_DIRECTORY_NAME: &str = "geomentor";
pub const STORAGE_FILE_NAME: &str = "local_storage.json";

type Entries = BTreeMap<String, String>;

/// Durable string key-value area backed by one JSON object file.
///
/// Reads are served from an in-memory copy; every write replaces the file atomically
/// before the copy is swapped.
pub struct JsonFileStore {
    entries: ArcSwap<Entries>,
    path: PathBuf,
}

impl JsonFileStore {
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(STORAGE_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".geomentor"))
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join(STORAGE_FILE_NAME)
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_from_disk(&path);
        Self {
            entries: ArcSwap::from_pointee(entries),
            path,
        }
    }

    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Entries {
        if !path.exists() {
            tracing::info!("storage file not found at {:?}, starting empty", path);
            return Entries::new();
        }

        match Figment::new().merge(Json::file(path)).extract::<Entries>() {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(
                    "failed to parse storage file {:?}: {}. starting empty",
                    path,
                    error
                );
                Entries::new()
            }
        }
    }

    fn replace(&self, entries: Entries) -> StorageResult<()> {
        self.persist(&entries)?;
        self.entries.store(Arc::new(entries));
        Ok(())
    }

    fn persist(&self, entries: &Entries) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-storage-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(entries).context(SerializeEntriesSnafu {
            stage: "serialize-storage-json",
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-storage-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.path).context(RenameTempFileSnafu {
            stage: "rename-temporary-storage-file",
            from: temp_path,
            to: self.path.clone(),
        })?;

        tracing::debug!("saved storage entries to {:?}", self.path);
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.load().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut next = Entries::clone(&self.entries.load());
        next.insert(key.to_string(), value.to_string());
        self.replace(next)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let current = self.entries.load();
        if !current.contains_key(key) {
            return Ok(());
        }

        let mut next = Entries::clone(&current);
        next.remove(key);
        self.replace(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(STORAGE_FILE_NAME);

        let store = JsonFileStore::open(&path);
        store.set("gemini_api_key", "secret-key").unwrap();
        store.set("other", "value").unwrap();

        let reopened = JsonFileStore::open(&path);
        assert_eq!(
            reopened.get("gemini_api_key").unwrap().as_deref(),
            Some("secret-key")
        );
        assert_eq!(reopened.get("other").unwrap().as_deref(), Some("value"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn remove_is_durable_and_tolerates_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STORAGE_FILE_NAME);

        let store = JsonFileStore::open(&path);
        store.remove("gemini_api_key").unwrap();
        assert!(!path.exists());

        store.set("gemini_api_key", "secret-key").unwrap();
        store.remove("gemini_api_key").unwrap();

        assert!(store.get("gemini_api_key").unwrap().is_none());
        assert!(
            JsonFileStore::open(&path)
                .get("gemini_api_key")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn malformed_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STORAGE_FILE_NAME);
        std::fs::write(&path, "not json at all").unwrap();

        let store = JsonFileStore::open(&path);

        assert!(store.get("gemini_api_key").unwrap().is_none());
    }
}
