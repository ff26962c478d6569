/*!
 * Post-quantum key lifecycle controller
 *
 * Orchestrates generation, verification, export and signing for account key
 * pairs. The controller is the only component that combines the registry,
 * the store and the crypto provider; it keeps no presentation state.
 *
 * Generation runs on a worker thread so callers can bound it with a timeout
 * or abandon it through a `CancellationToken`. Nothing is written to the
 * store unless the worker delivers a result in time, and the write itself
 * happens under a per-account lock.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::algorithm::Algorithm;
use crate::config::ControllerConfig;
use crate::error::{error_codes, KeyError, KeyResult};
use crate::export::armor::{self, ArmorKind};
use crate::export::KeyExport;
use crate::keys::{KeyInfo, KeyPair, KeyState, PrivateKey, PublicKey};
use crate::provider::CryptoProvider;
use crate::registry::AlgorithmRegistry;
use crate::store::KeyStore;

/// How often a waiting caller checks its cancellation token
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared flag used to abandon an in-flight generation
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why a stored key pair failed verification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationFailure {
    /// The pair was generated for a different algorithm than the one selected now
    AlgorithmMismatch {
        stored: Algorithm,
        selected: Algorithm,
    },
    /// The account's algorithm selection was removed
    NoAlgorithmSelected,
    /// The public key does not belong to the private key
    KeyPairInconsistent,
}

impl VerificationFailure {
    /// Stable identifier callers map to their own messages
    pub fn code(&self) -> &'static str {
        match self {
            VerificationFailure::AlgorithmMismatch { .. } => "algorithm_mismatch",
            VerificationFailure::NoAlgorithmSelected => "no_algorithm_selected",
            VerificationFailure::KeyPairInconsistent => "keypair_inconsistent",
        }
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationFailure::AlgorithmMismatch { stored, selected } => write!(
                f,
                "keys not valid after algorithm change ({} -> {})",
                stored, selected
            ),
            VerificationFailure::NoAlgorithmSelected => {
                write!(f, "keys not valid: no algorithm selected")
            }
            VerificationFailure::KeyPairInconsistent => {
                write!(f, "public key does not match private key")
            }
        }
    }
}

/// Outcome of `KeyController::verify_keys`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,
    pub reason: Option<VerificationFailure>,
}

impl VerificationResult {
    pub fn passed() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn failed(reason: VerificationFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

/// Key lifecycle controller for post-quantum account keys
pub struct KeyController<S: KeyStore, P: CryptoProvider + 'static> {
    store: Arc<S>,
    provider: Arc<P>,
    registry: AlgorithmRegistry<S>,
    config: ControllerConfig,
    account_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: KeyStore, P: CryptoProvider + 'static> KeyController<S, P> {
    /// Create a controller
    ///
    /// # Arguments
    ///
    /// * `store` - Store holding key pairs and selections; should be the one
    ///   the registry was built on
    /// * `provider` - Post-quantum primitives
    /// * `registry` - Supported algorithms and per-account selection
    /// * `config` - Validated before use
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        registry: AlgorithmRegistry<S>,
        config: ControllerConfig,
    ) -> KeyResult<Self> {
        config.validate()?;

        Ok(Self {
            store,
            provider,
            registry,
            config,
            account_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &AlgorithmRegistry<S> {
        &self.registry
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn has_keys(&self, account: &str) -> KeyResult<bool> {
        Ok(self.store.get(account)?.is_some())
    }

    pub fn key_state(&self, account: &str) -> KeyResult<KeyState> {
        self.has_keys(account).map(KeyState::from_presence)
    }

    pub fn has_algorithm_selected(&self, account: &str) -> KeyResult<bool> {
        Ok(self.registry.get_selected_algorithm(account)?.is_some())
    }

    /// Generate a key pair with the selected algorithm, replacing any prior pair
    ///
    /// Bounded by the configured generation timeout. Returns the public view
    /// of the pair the store holds once the write is done; the private half
    /// stays behind `export_private_key`.
    pub fn generate_keys(&self, account: &str) -> KeyResult<KeyInfo> {
        self.generate(account, None)
    }

    /// Like `generate_keys`, but abandons the generation once `token` fires
    pub fn generate_keys_cancellable(
        &self,
        account: &str,
        token: &CancellationToken,
    ) -> KeyResult<KeyInfo> {
        self.generate(account, Some(token))
    }

    fn generate(&self, account: &str, token: Option<&CancellationToken>) -> KeyResult<KeyInfo> {
        let algorithm = self
            .registry
            .get_selected_algorithm(account)?
            .ok_or_else(|| KeyError::NoAlgorithmSelected {
                account: account.to_string(),
            })?;

        if !self.registry.is_supported(algorithm) {
            return Err(KeyError::invalid_algorithm(algorithm.name()));
        }

        log::info!(
            "Generating {} key pair for account '{}'",
            algorithm,
            account
        );
        let started = Instant::now();

        let (public_key, private_key) = self.run_generation(algorithm, token)?;
        let key_pair = KeyPair::new(algorithm, public_key, private_key);

        let lock = self.account_lock(account)?;
        let written = match lock.lock() {
            Ok(_guard) => self.replace_pair(account, key_pair, token),
            Err(_) => Err(KeyError::poisoned("generate_keys")),
        };
        self.release_account_lock(account, lock);
        let (persisted, replaced) = written?;

        log::info!(
            "{} {} key pair for account '{}' in {:?} (fingerprint {})",
            if replaced { "Replaced" } else { "Stored" },
            algorithm,
            account,
            started.elapsed(),
            persisted.public_key.fingerprint()
        );

        Ok(KeyInfo::from(&persisted))
    }

    /// Write `key_pair` and read it back; caller holds the account lock
    fn replace_pair(
        &self,
        account: &str,
        key_pair: KeyPair,
        token: Option<&CancellationToken>,
    ) -> KeyResult<(KeyPair, bool)> {
        if token.map_or(false, CancellationToken::is_cancelled) {
            log::warn!("Key generation for account '{}' cancelled before write", account);
            return Err(KeyError::GenerationCancelled);
        }

        let replaced = self.store.get(account)?.is_some();
        self.store.put(account, key_pair)?;
        let persisted = self.store.get(account)?.ok_or_else(|| {
            KeyError::store_error(
                "generate_keys",
                "key pair missing after write",
                error_codes::STORE_READ_FAILED,
            )
        })?;

        Ok((persisted, replaced))
    }

    /// Run the provider on a worker thread and wait for it
    ///
    /// A result arriving after timeout or cancellation is dropped by the
    /// worker, which wipes the private half.
    fn run_generation(
        &self,
        algorithm: Algorithm,
        token: Option<&CancellationToken>,
    ) -> KeyResult<(PublicKey, PrivateKey)> {
        let timeout = self.config.generation_timeout();
        let deadline = Instant::now() + timeout;

        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);

        thread::Builder::new()
            .name(format!("keygen-{}", algorithm.name()))
            .spawn(move || {
                let result = provider.generate_keypair(algorithm);
                // The receiver is gone if the caller gave up
                let _ = tx.send(result);
            })
            .map_err(|e| {
                KeyError::provider_error(
                    "Key generation failed",
                    &format!("could not start worker thread: {}", e),
                    error_codes::KEY_GENERATION_FAILED,
                )
            })?;

        loop {
            if token.map_or(false, CancellationToken::is_cancelled) {
                log::warn!("Key generation for {} cancelled", algorithm);
                return Err(KeyError::GenerationCancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "Key generation for {} timed out after {} ms",
                    algorithm,
                    self.config.generation_timeout_ms
                );
                return Err(KeyError::GenerationTimedOut {
                    timeout_ms: self.config.generation_timeout_ms,
                });
            }

            match rx.recv_timeout((deadline - now).min(CANCEL_POLL_INTERVAL)) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(KeyError::provider_error(
                        "Key generation failed",
                        "worker thread exited without a result",
                        error_codes::KEY_GENERATION_FAILED,
                    ))
                }
            }
        }
    }

    fn account_lock(&self, account: &str) -> KeyResult<Arc<Mutex<()>>> {
        let mut locks = self
            .account_locks
            .lock()
            .map_err(|_| KeyError::poisoned("account_lock"))?;
        Ok(Arc::clone(
            locks
                .entry(account.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }

    /// Drop the account's lock entry once no other caller holds it
    fn release_account_lock(&self, account: &str, lock: Arc<Mutex<()>>) {
        let mut locks = match self.account_locks.lock() {
            Ok(locks) => locks,
            Err(_) => return,
        };
        // Clones are only taken under the map lock, so the count cannot grow here
        let idle = locks
            .get(account)
            .map_or(false, |entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(account);
        }
    }

    fn require_pair(&self, account: &str) -> KeyResult<KeyPair> {
        self.store
            .get(account)?
            .ok_or_else(|| KeyError::NoKeysPresent {
                account: account.to_string(),
            })
    }

    pub fn current_public_key(&self, account: &str) -> KeyResult<Option<PublicKey>> {
        Ok(self.store.get(account)?.map(|pair| pair.public_key.clone()))
    }

    /// Armored public key block
    pub fn export_public_key(&self, account: &str) -> KeyResult<Vec<u8>> {
        let pair = self.require_pair(account)?;
        let block = armor::encode(
            ArmorKind::PublicKey,
            pair.algorithm,
            pair.public_key.as_bytes(),
        );

        log::info!(
            "Exported {} public key for account '{}'",
            pair.algorithm,
            account
        );
        Ok(block.into_bytes())
    }

    /// Armored private key block
    ///
    /// The caller is responsible for confirming with the user before the
    /// bytes go anywhere.
    pub fn export_private_key(&self, account: &str) -> KeyResult<Vec<u8>> {
        let pair = self.require_pair(account)?;
        let block = armor::encode(
            ArmorKind::PrivateKey,
            pair.algorithm,
            pair.private_key.as_bytes(),
        );

        log::warn!(
            "Exported {} private key for account '{}'",
            pair.algorithm,
            account
        );
        Ok(block.into_bytes())
    }

    pub fn public_key_export(&self, account: &str) -> KeyResult<KeyExport> {
        let content = self.export_public_key(account)?;
        Ok(KeyExport::public_key(&self.config.export_file_prefix, content))
    }

    pub fn private_key_export(&self, account: &str) -> KeyResult<KeyExport> {
        let content = self.export_private_key(account)?;
        Ok(KeyExport::private_key(&self.config.export_file_prefix, content))
    }

    /// Check the stored pair against the current selection and itself
    ///
    /// A failed check is a result, not an error; `NoKeysPresent` is an error.
    pub fn verify_keys(&self, account: &str) -> KeyResult<VerificationResult> {
        let pair = self.require_pair(account)?;

        let result = match self.registry.get_selected_algorithm(account)? {
            None => VerificationResult::failed(VerificationFailure::NoAlgorithmSelected),
            Some(selected) if selected != pair.algorithm => {
                VerificationResult::failed(VerificationFailure::AlgorithmMismatch {
                    stored: pair.algorithm,
                    selected,
                })
            }
            Some(_) => {
                let consistent = self.provider.verify_keypair(
                    pair.algorithm,
                    &pair.public_key,
                    &pair.private_key,
                )?;
                if consistent {
                    VerificationResult::passed()
                } else {
                    VerificationResult::failed(VerificationFailure::KeyPairInconsistent)
                }
            }
        };

        match result.reason {
            None => log::info!("Keys for account '{}' verified", account),
            Some(reason) => log::warn!(
                "Keys for account '{}' failed verification: {}",
                account,
                reason.code()
            ),
        }

        Ok(result)
    }

    /// Sign `message` with the account's private key, returning an armored block
    pub fn sign_message(&self, account: &str, message: &[u8]) -> KeyResult<Vec<u8>> {
        let pair = self.require_pair(account)?;
        let signature = self
            .provider
            .sign(pair.algorithm, &pair.private_key, message)?;

        log::debug!(
            "Signed {} byte message for account '{}' with {}",
            message.len(),
            account,
            pair.algorithm
        );
        Ok(armor::encode(ArmorKind::Signature, pair.algorithm, &signature).into_bytes())
    }

    /// Verify an armored signature against an armored public key
    ///
    /// # Arguments
    ///
    /// * `public_key_block` - Output of `export_public_key`
    /// * `signature_block` - Output of `sign_message`
    /// * `message` - The signed bytes
    ///
    /// # Returns
    ///
    /// `Ok(false)` for a well-formed signature that does not verify;
    /// `AlgorithmMismatch` when the two blocks name different algorithms
    pub fn verify_signature(
        &self,
        public_key_block: &[u8],
        signature_block: &[u8],
        message: &[u8],
    ) -> KeyResult<bool> {
        let public_key = armor::decode_kind(as_armor_text(public_key_block)?, ArmorKind::PublicKey)?;
        let signature = armor::decode_kind(as_armor_text(signature_block)?, ArmorKind::Signature)?;

        if public_key.algorithm != signature.algorithm {
            return Err(KeyError::AlgorithmMismatch {
                expected: public_key.algorithm.name().to_string(),
                actual: signature.algorithm.name().to_string(),
            });
        }

        let algorithm = public_key.algorithm;
        if !self.registry.is_supported(algorithm) {
            return Err(KeyError::invalid_algorithm(algorithm.name()));
        }

        let valid = self.provider.verify(
            algorithm,
            &PublicKey::from(public_key.data),
            message,
            &signature.data,
        )?;

        log::debug!("{} signature verification: {}", algorithm, valid);
        Ok(valid)
    }
}

fn as_armor_text(block: &[u8]) -> KeyResult<&str> {
    std::str::from_utf8(block).map_err(|_| KeyError::malformed_armor("block is not UTF-8 text"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKeyStore;
    use std::sync::atomic::AtomicUsize;

    /// Instant provider; pairs are consistent when both halves carry the same bytes
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl CryptoProvider for CountingProvider {
        fn generate_keypair(&self, _algorithm: Algorithm) -> KeyResult<(PublicKey, PrivateKey)> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u8 + 1;
            Ok((PublicKey::from_bytes(&[n; 8]), PrivateKey::from_bytes(&[n; 8])))
        }

        fn sign(&self, _: Algorithm, private_key: &PrivateKey, message: &[u8]) -> KeyResult<Vec<u8>> {
            let mut out = private_key.as_bytes().to_vec();
            out.extend_from_slice(message);
            Ok(out)
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

    fn controller() -> (
        Arc<MemoryKeyStore>,
        KeyController<MemoryKeyStore, CountingProvider>,
    ) {
        let store = Arc::new(MemoryKeyStore::new());
        let registry = AlgorithmRegistry::with_supported(
            store.clone(),
            vec![Algorithm::Dilithium2, Algorithm::Falcon512],
        )
        .unwrap();
        let controller = KeyController::new(
            store.clone(),
            Arc::new(CountingProvider::default()),
            registry,
            ControllerConfig::default(),
        )
        .unwrap();
        (store, controller)
    }

    #[test]
    fn test_generate_requires_selection() {
        let (_, controller) = controller();
        let err = controller.generate_keys("alice").unwrap_err();
        assert!(matches!(err, KeyError::NoAlgorithmSelected { .. }));
        assert!(!controller.has_keys("alice").unwrap());
    }

    #[test]
    fn test_generate_stores_and_replaces() {
        let (store, controller) = controller();
        controller
            .registry()
            .set_selected_algorithm("alice", Algorithm::Dilithium2)
            .unwrap();

        let first = controller.generate_keys("alice").unwrap();
        assert_eq!(controller.key_state("alice").unwrap(), KeyState::KeysPresent);
        let stored = store.get("alice").unwrap().unwrap();
        assert_eq!(KeyInfo::from(&stored), first);

        let second = controller.generate_keys("alice").unwrap();
        assert_ne!(first.public_key, second.public_key);
        assert_eq!(
            controller.current_public_key("alice").unwrap(),
            Some(second.public_key)
        );
    }

    #[test]
    fn test_account_lock_released_after_generation() {
        let (_, controller) = controller();
        controller
            .registry()
            .set_selected_algorithm("alice", Algorithm::Dilithium2)
            .unwrap();

        controller.generate_keys("alice").unwrap();
        controller.generate_keys("alice").unwrap();
        assert!(controller.account_locks.lock().unwrap().is_empty());

        let token = CancellationToken::new();
        token.cancel();
        assert!(controller.generate_keys_cancellable("alice", &token).is_err());
        assert!(controller.account_locks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_exports_require_keys() {
        let (_, controller) = controller();
        assert!(matches!(
            controller.export_public_key("alice"),
            Err(KeyError::NoKeysPresent { .. })
        ));
        assert!(matches!(
            controller.private_key_export("alice"),
            Err(KeyError::NoKeysPresent { .. })
        ));
        assert!(matches!(
            controller.verify_keys("alice"),
            Err(KeyError::NoKeysPresent { .. })
        ));
    }

    #[test]
    fn test_verify_reports_algorithm_change() {
        let (_, controller) = controller();
        let registry = controller.registry();
        registry
            .set_selected_algorithm("alice", Algorithm::Dilithium2)
            .unwrap();
        controller.generate_keys("alice").unwrap();
        assert_eq!(
            controller.verify_keys("alice").unwrap(),
            VerificationResult::passed()
        );

        registry
            .set_selected_algorithm("alice", Algorithm::Falcon512)
            .unwrap();
        let result = controller.verify_keys("alice").unwrap();
        assert!(!result.valid);
        assert_eq!(
            result.reason,
            Some(VerificationFailure::AlgorithmMismatch {
                stored: Algorithm::Dilithium2,
                selected: Algorithm::Falcon512,
            })
        );
        assert_eq!(result.reason.unwrap().code(), "algorithm_mismatch");
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let (_, controller) = controller();
        controller
            .registry()
            .set_selected_algorithm("alice", Algorithm::Falcon512)
            .unwrap();
        controller.generate_keys("alice").unwrap();

        let public_key = controller.export_public_key("alice").unwrap();
        let signature = controller.sign_message("alice", b"hello").unwrap();

        assert!(controller
            .verify_signature(&public_key, &signature, b"hello")
            .unwrap());
        assert!(!controller
            .verify_signature(&public_key, &signature, b"goodbye")
            .unwrap());
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = Arc::new(MemoryKeyStore::new());
        let registry = AlgorithmRegistry::with_supported(store.clone(), vec![Algorithm::Dilithium2])
            .unwrap();
        let config = ControllerConfig {
            generation_timeout_ms: 0,
            ..Default::default()
        };
        let result = KeyController::new(
            store,
            Arc::new(CountingProvider::default()),
            registry,
            config,
        );
        assert!(matches!(result, Err(KeyError::ConfigError { .. })));
    }
}
