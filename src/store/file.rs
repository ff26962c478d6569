use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use zeroize::Zeroize;

use crate::algorithm::{Algorithm, CATALOGUE_VERSION};
use crate::error::{error_codes, KeyError, KeyResult};
use crate::keys::{KeyPair, PrivateKey, PublicKey};
use crate::store::{AccountRecord, KeyStore};

/// Version of the on-disk document layout
pub const STORE_FORMAT_VERSION: u8 = 1;

/// Key store file format
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    /// Version of the key store format
    version: u8,
    /// Algorithm catalogue the records were written against
    catalogue_version: u32,
    accounts: HashMap<String, StoredAccount>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected_algorithm: Option<Algorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_pair: Option<StoredKeyPair>,
}

/// Key pair with base64 encoded halves
#[derive(Serialize, Deserialize)]
struct StoredKeyPair {
    algorithm: Algorithm,
    public_key: String,
    private_key: String,
    created_at: DateTime<Utc>,
}

impl Drop for StoredKeyPair {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl std::fmt::Debug for StoredKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredKeyPair")
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl StoredKeyPair {
    fn encode(pair: &KeyPair) -> Self {
        Self {
            algorithm: pair.algorithm,
            public_key: base64::encode(pair.public_key.as_bytes()),
            private_key: base64::encode(pair.private_key.as_bytes()),
            created_at: pair.created_at,
        }
    }

    fn decode(&self, account: &str) -> KeyResult<KeyPair> {
        let corrupted = |half: &str, e: base64::DecodeError| {
            KeyError::store_error(
                "load",
                &format!("{} of account '{}' is not valid base64: {}", half, account, e),
                error_codes::STORE_CORRUPTED,
            )
        };

        let public_key = base64::decode(&self.public_key).map_err(|e| corrupted("public key", e))?;
        let private_key =
            base64::decode(&self.private_key).map_err(|e| corrupted("private key", e))?;

        Ok(KeyPair {
            algorithm: self.algorithm,
            public_key: PublicKey::from(public_key),
            private_key: PrivateKey::from(private_key),
            created_at: self.created_at,
        })
    }
}

/// JSON file store
///
/// The whole document is cached in memory and rewritten on every change
/// through a temporary file that is renamed over the old one, so a crash
/// mid-write leaves either the old or the new document on disk.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    accounts: RwLock<HashMap<String, AccountRecord>>,
}

impl FileKeyStore {
    /// Open the store at `path`, creating an empty document if none exists
    pub fn open<P: AsRef<Path>>(path: P) -> KeyResult<Self> {
        let path = path.as_ref().to_path_buf();

        let accounts = if path.exists() {
            load_document(&path)?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let empty = HashMap::new();
            save_document(&path, &empty)?;
            empty
        };

        log::debug!(
            "Opened key store at {} with {} account(s)",
            path.display(),
            accounts.len()
        );

        Ok(Self {
            path,
            accounts: RwLock::new(accounts),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, operation: &str, account: &str, f: F) -> KeyResult<()>
    where
        F: FnOnce(&mut AccountRecord),
    {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| KeyError::poisoned(operation))?;

        let mut next = accounts.clone();
        let record = next.entry(account.to_string()).or_default();
        f(record);
        if record.is_empty() {
            next.remove(account);
        }

        // Cache only changes once the document is safely on disk
        save_document(&self.path, &next)?;
        *accounts = next;
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

impl KeyStore for FileKeyStore {
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

fn load_document(path: &Path) -> KeyResult<HashMap<String, AccountRecord>> {
    let contents = fs::read_to_string(path).map_err(|e| {
        KeyError::store_error(
            "load",
            &format!("{}: {}", path.display(), e),
            error_codes::STORE_READ_FAILED,
        )
    })?;

    let document: StoreDocument = serde_json::from_str(&contents)?;

    if document.version != STORE_FORMAT_VERSION {
        return Err(KeyError::store_error(
            "load",
            &format!("unsupported key store version {}", document.version),
            error_codes::STORE_CORRUPTED,
        ));
    }
    if document.catalogue_version != CATALOGUE_VERSION {
        log::warn!(
            "Key store {} was written against algorithm catalogue v{}, current is v{}",
            path.display(),
            document.catalogue_version,
            CATALOGUE_VERSION
        );
    }

    let mut accounts = HashMap::with_capacity(document.accounts.len());
    for (account, stored) in &document.accounts {
        let key_pair = match &stored.key_pair {
            Some(pair) => Some(pair.decode(account)?),
            None => None,
        };
        accounts.insert(
            account.clone(),
            AccountRecord {
                key_pair,
                selected_algorithm: stored.selected_algorithm,
            },
        );
    }

    Ok(accounts)
}

fn save_document(path: &Path, accounts: &HashMap<String, AccountRecord>) -> KeyResult<()> {
    let document = StoreDocument {
        version: STORE_FORMAT_VERSION,
        catalogue_version: CATALOGUE_VERSION,
        accounts: accounts
            .iter()
            .map(|(account, record)| {
                (
                    account.clone(),
                    StoredAccount {
                        selected_algorithm: record.selected_algorithm,
                        key_pair: record.key_pair.as_ref().map(StoredKeyPair::encode),
                    },
                )
            })
            .collect(),
    };

    let mut serialized = serde_json::to_vec_pretty(&document)?;
    let written = write_atomically(path, &serialized);
    serialized.zeroize();

    written.map_err(|e| {
        KeyError::store_error(
            "save",
            &format!("{}: {}", path.display(), e),
            error_codes::STORE_WRITE_FAILED,
        )
    })
}

/// Write `contents` to a sibling temp file, then rename it over `path`
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
