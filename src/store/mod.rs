/*!
 * Account-scoped key storage
 *
 * A store holds, per account, at most one key pair and the currently
 * selected algorithm. Writes replace a whole record at once so readers never
 * observe half of a pair.
 */

mod file;
mod memory;

pub use self::file::FileKeyStore;
pub use self::memory::MemoryKeyStore;

pub(crate) use self::file::write_atomically;

use crate::algorithm::Algorithm;
use crate::error::KeyResult;
use crate::keys::KeyPair;

/// Persistence backend consumed by the controller and registry
pub trait KeyStore: Send + Sync {
    /// Current key pair of the account, if any
    fn get(&self, account: &str) -> KeyResult<Option<KeyPair>>;

    /// Replace the account's key pair in a single step
    fn put(&self, account: &str, key_pair: KeyPair) -> KeyResult<()>;

    /// Algorithm the account has chosen for future generation
    fn selected_algorithm(&self, account: &str) -> KeyResult<Option<Algorithm>>;

    fn set_selected_algorithm(&self, account: &str, algorithm: Algorithm) -> KeyResult<()>;

    fn clear_selected_algorithm(&self, account: &str) -> KeyResult<()>;
}

/// Everything a store keeps for one account
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct AccountRecord {
    pub key_pair: Option<KeyPair>,
    pub selected_algorithm: Option<Algorithm>,
}

impl AccountRecord {
    pub fn is_empty(&self) -> bool {
        self.key_pair.is_none() && self.selected_algorithm.is_none()
    }
}
