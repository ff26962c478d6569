/*!
 * Key material and derived key state
 */

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithm::Algorithm;

/// Public half of an account key pair
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    bytes: Vec<u8>,
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hex SHA-256 of the key bytes, for display
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Compare against another public key without early exit
    pub fn ct_eq(&self, other: &PublicKey) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl From<Vec<u8>> for PublicKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Private half of an account key pair
///
/// The bytes are wiped when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: Vec<u8>,
}

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for PrivateKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The single live key pair of an account
///
/// Both halves always travel together; the store never holds one without
/// the other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPair {
    pub algorithm: Algorithm,
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
    pub created_at: DateTime<Utc>,
}

impl KeyPair {
    /// Assemble a freshly generated pair stamped with the current time
    pub fn new(algorithm: Algorithm, public_key: PublicKey, private_key: PrivateKey) -> Self {
        Self {
            algorithm,
            public_key,
            private_key,
            created_at: Utc::now(),
        }
    }
}

/// Public view of a key pair, as handed out after generation
///
/// The private half only leaves the controller through an explicit export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    pub algorithm: Algorithm,
    pub public_key: PublicKey,
    pub created_at: DateTime<Utc>,
}

impl From<&KeyPair> for KeyInfo {
    fn from(pair: &KeyPair) -> Self {
        Self {
            algorithm: pair.algorithm,
            public_key: pair.public_key.clone(),
            created_at: pair.created_at,
        }
    }
}

/// Whether an account currently holds a key pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyState {
    NoKeys,
    KeysPresent,
}

impl KeyState {
    pub fn from_presence(present: bool) -> Self {
        if present {
            KeyState::KeysPresent
        } else {
            KeyState::NoKeys
        }
    }
}
