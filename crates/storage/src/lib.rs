use std::sync::Arc;

pub mod credential;
pub mod error;
pub mod file;
pub mod memory;

pub use credential::{CREDENTIAL_KEY, CredentialStore};
pub use error::{StorageError, StorageResult};
pub use file::{JsonFileStore, STORAGE_DIRECTORY_NAME, STORAGE_FILE_NAME};
pub use memory::MemoryStore;

/// Synchronous string key-value capability.
///
/// Implementations own their durability; callers never reach a global store directly.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl<T> KeyValueStore for Arc<T>
where
    T: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}
