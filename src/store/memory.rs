use std::collections::HashMap;
use std::sync::RwLock;

use crate::algorithm::Algorithm;
use crate::error::{KeyError, KeyResult};
use crate::keys::KeyPair;
use crate::store::{AccountRecord, KeyStore};

/// Process-local store backed by a locked map
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    accounts: RwLock<HashMap<String, AccountRecord>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts holding any state
    pub fn account_count(&self) -> KeyResult<usize> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| KeyError::poisoned("account_count"))?;
        Ok(accounts.len())
    }

    fn update<F>(&self, operation: &str, account: &str, f: F) -> KeyResult<()>
    where
        F: FnOnce(&mut AccountRecord),
    {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| KeyError::poisoned(operation))?;
        let record = accounts.entry(account.to_string()).or_default();
        f(record);
        if record.is_empty() {
            accounts.remove(account);
        }
        Ok(())
    }

    fn read<T, F>(&self, operation: &str, account: &str, f: F) -> KeyResult<Option<T>>
    where
        F: FnOnce(&AccountRecord) -> Option<T>,
    {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| KeyError::poisoned(operation))?;
        Ok(accounts.get(account).and_then(f))
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, account: &str) -> KeyResult<Option<KeyPair>> {
        self.read("get", account, |record| record.key_pair.clone())
    }

    fn put(&self, account: &str, key_pair: KeyPair) -> KeyResult<()> {
        self.update("put", account, |record| record.key_pair = Some(key_pair))
    }

    fn selected_algorithm(&self, account: &str) -> KeyResult<Option<Algorithm>> {
        self.read("selected_algorithm", account, |record| record.selected_algorithm)
    }

    fn set_selected_algorithm(&self, account: &str, algorithm: Algorithm) -> KeyResult<()> {
        self.update("set_selected_algorithm", account, |record| {
            record.selected_algorithm = Some(algorithm)
        })
    }

    fn clear_selected_algorithm(&self, account: &str) -> KeyResult<()> {
        self.update("clear_selected_algorithm", account, |record| {
            record.selected_algorithm = None
        })
    }
}
