//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use qasa_keys::error::error_codes;
use qasa_keys::prelude::*;
use qasa_keys::PrivateKey;
use qasa_keys::PublicKey;

/// Deterministic provider with a per-algorithm delay and a failure switch
///
/// Both halves of a generated pair carry the same bytes; a "signature" is the
/// private key followed by the message, checked against the public key.
#[derive(Default)]
pub struct FakeProvider {
    attempts: AtomicU32,
    counter: AtomicU32,
    fail: AtomicBool,
    slow_algorithm: Option<Algorithm>,
    slow_delay: Duration,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation for `algorithm` sleeps `delay` before returning
    pub fn slow_for(algorithm: Algorithm, delay: Duration) -> Self {
        Self {
            slow_algorithm: Some(algorithm),
            slow_delay: delay,
            ..Self::default()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn generated(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Calls into `generate_keypair`, failed ones included
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl CryptoProvider for FakeProvider {
    fn generate_keypair(&self, algorithm: Algorithm) -> KeyResult<(PublicKey, PrivateKey)> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.slow_algorithm == Some(algorithm) {
            thread::sleep(self.slow_delay);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(KeyError::provider_error(
                "Key generation failed",
                "injected failure",
                error_codes::KEY_GENERATION_FAILED,
            ));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let bytes: Vec<u8> = n.to_be_bytes().iter().cycle().take(32).copied().collect();
        Ok((PublicKey::from_bytes(&bytes), PrivateKey::from_bytes(&bytes)))
    }

    fn sign(&self, _: Algorithm, private_key: &PrivateKey, message: &[u8]) -> KeyResult<Vec<u8>> {
        let mut signature = private_key.as_bytes().to_vec();
        signature.extend_from_slice(message);
        Ok(signature)
    }

    fn verify(
        &self,
        _: Algorithm,
        public_key: &PublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> KeyResult<bool> {
        let mut expected = public_key.as_bytes().to_vec();
        expected.extend_from_slice(message);
        Ok(expected == signature)
    }
}

/// Memory store whose writes can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryKeyStore,
    fail_puts: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

impl KeyStore for FlakyStore {
    fn get(&self, account: &str) -> KeyResult<Option<KeyPair>> {
        self.inner.get(account)
    }

    fn put(&self, account: &str, key_pair: KeyPair) -> KeyResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(KeyError::store_error(
                "put",
                "injected failure",
                error_codes::STORE_WRITE_FAILED,
            ));
        }
        self.inner.put(account, key_pair)
    }

    fn selected_algorithm(&self, account: &str) -> KeyResult<Option<Algorithm>> {
        self.inner.selected_algorithm(account)
    }

    fn set_selected_algorithm(&self, account: &str, algorithm: Algorithm) -> KeyResult<()> {
        self.inner.set_selected_algorithm(account, algorithm)
    }

    fn clear_selected_algorithm(&self, account: &str) -> KeyResult<()> {
        self.inner.clear_selected_algorithm(account)
    }
}

/// Controller over `store` and `provider` supporting Dilithium2 and Falcon-1024
pub fn controller_with<S: KeyStore, P: CryptoProvider + 'static>(
    store: Arc<S>,
    provider: Arc<P>,
    config: ControllerConfig,
) -> KeyController<S, P> {
    let registry = AlgorithmRegistry::with_supported(
        store.clone(),
        vec![Algorithm::Dilithium2, Algorithm::Falcon1024],
    )
    .expect("Failed to build registry");
    KeyController::new(store, provider, registry, config).expect("Failed to build controller")
}

/// True when both halves carry the same bytes, as `FakeProvider` produces them
pub fn is_fake_consistent(pair: &KeyPair) -> bool {
    pair.public_key.as_bytes() == pair.private_key.as_bytes()
}

/// Public view of whatever `store` currently holds for `account`
pub fn stored_info<S: KeyStore>(store: &S, account: &str) -> Option<KeyInfo> {
    store
        .get(account)
        .expect("Failed to read store")
        .map(|pair| KeyInfo::from(&pair))
}
