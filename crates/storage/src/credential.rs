use crate::KeyValueStore;
use crate::error::StorageResult;

/// Fixed key the provider credential lives under.
pub const CREDENTIAL_KEY: &str = "gemini_api_key";

/// Present/absent lifecycle for the single API credential.
///
/// Blank stored values read back as absent. No expiry and no encryption.
pub struct CredentialStore<K> {
    store: K,
}

impl<K> CredentialStore<K>
where
    K: KeyValueStore,
{
    pub fn new(store: K) -> Self {
        Self { store }
    }

    pub fn get(&self) -> StorageResult<Option<String>> {
        Ok(self
            .store
            .get(CREDENTIAL_KEY)?
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }

    pub fn set(&self, credential: &str) -> StorageResult<()> {
        self.store.set(CREDENTIAL_KEY, credential.trim())
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.store.remove(CREDENTIAL_KEY)
    }
}
