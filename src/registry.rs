/*!
 * Algorithm registry
 *
 * Knows which algorithms this build supports and records each account's
 * choice. Selecting an algorithm never touches an existing key pair.
 */

use std::sync::Arc;

use crate::algorithm::Algorithm;
use crate::error::{KeyError, KeyResult};
use crate::store::KeyStore;

/// Supported algorithms plus per-account selection
pub struct AlgorithmRegistry<S: KeyStore> {
    store: Arc<S>,
    supported: Vec<Algorithm>,
}

impl<S: KeyStore> AlgorithmRegistry<S> {
    /// Registry offering every catalogue algorithm the linked liboqs enables
    pub fn new(store: Arc<S>) -> KeyResult<Self> {
        let enabled: Vec<Algorithm> = Algorithm::ALL
            .iter()
            .copied()
            .filter(Algorithm::is_enabled)
            .collect();
        Self::with_supported(store, enabled)
    }

    /// Registry restricted to `supported`, kept in catalogue order
    pub fn with_supported(store: Arc<S>, supported: Vec<Algorithm>) -> KeyResult<Self> {
        let supported: Vec<Algorithm> = Algorithm::ALL
            .iter()
            .copied()
            .filter(|alg| supported.contains(alg))
            .collect();

        if supported.is_empty() {
            return Err(KeyError::invalid_algorithm("<empty supported set>"));
        }

        Ok(Self { store, supported })
    }

    pub fn list_supported_algorithms(&self) -> &[Algorithm] {
        &self.supported
    }

    pub fn is_supported(&self, algorithm: Algorithm) -> bool {
        self.supported.contains(&algorithm)
    }

    pub fn get_selected_algorithm(&self, account: &str) -> KeyResult<Option<Algorithm>> {
        self.store.selected_algorithm(account)
    }

    pub fn set_selected_algorithm(&self, account: &str, algorithm: Algorithm) -> KeyResult<()> {
        if !self.is_supported(algorithm) {
            return Err(KeyError::invalid_algorithm(algorithm.name()));
        }

        self.store.set_selected_algorithm(account, algorithm)?;
        log::info!(
            "Account '{}' selected algorithm {} (NIST level {})",
            account,
            algorithm,
            algorithm.security_level()
        );
        Ok(())
    }

    /// Select by canonical name or armor tag
    pub fn set_selected_algorithm_by_name(&self, account: &str, name: &str) -> KeyResult<Algorithm> {
        let algorithm: Algorithm = name.parse()?;
        self.set_selected_algorithm(account, algorithm)?;
        Ok(algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyPair, PrivateKey, PublicKey};
    use crate::store::MemoryKeyStore;

    fn registry() -> AlgorithmRegistry<MemoryKeyStore> {
        AlgorithmRegistry::with_supported(
            Arc::new(MemoryKeyStore::new()),
            vec![Algorithm::Falcon1024, Algorithm::Dilithium2],
        )
        .unwrap()
    }

    #[test]
    fn test_supported_list_keeps_catalogue_order() {
        let registry = registry();
        assert_eq!(
            registry.list_supported_algorithms(),
            &[Algorithm::Dilithium2, Algorithm::Falcon1024]
        );
    }

    #[test]
    fn test_empty_supported_set_is_rejected() {
        let result = AlgorithmRegistry::with_supported(Arc::new(MemoryKeyStore::new()), vec![]);
        assert!(matches!(result, Err(KeyError::InvalidAlgorithm { .. })));
    }

    #[test]
    fn test_default_registry_is_not_empty() {
        let registry = AlgorithmRegistry::new(Arc::new(MemoryKeyStore::new())).unwrap();
        assert!(!registry.list_supported_algorithms().is_empty());
    }

    #[test]
    fn test_select_and_read_back() {
        let registry = registry();
        assert_eq!(registry.get_selected_algorithm("alice").unwrap(), None);

        registry
            .set_selected_algorithm("alice", Algorithm::Falcon1024)
            .unwrap();
        assert_eq!(
            registry.get_selected_algorithm("alice").unwrap(),
            Some(Algorithm::Falcon1024)
        );
    }

    #[test]
    fn test_unsupported_selection_is_rejected() {
        let registry = registry();
        let err = registry
            .set_selected_algorithm("alice", Algorithm::Dilithium5)
            .unwrap_err();
        assert_eq!(err.error_type(), "InvalidAlgorithm");
        assert_eq!(registry.get_selected_algorithm("alice").unwrap(), None);
    }

    #[test]
    fn test_select_by_name() {
        let registry = registry();
        let alg = registry
            .set_selected_algorithm_by_name("alice", "falcon-1024")
            .unwrap();
        assert_eq!(alg, Algorithm::Falcon1024);

        let err = registry
            .set_selected_algorithm_by_name("alice", "RSA-2048")
            .unwrap_err();
        assert_eq!(err.error_type(), "InvalidAlgorithm");
    }

    #[test]
    fn test_selection_leaves_key_pair_alone() {
        let store = Arc::new(MemoryKeyStore::new());
        let registry =
            AlgorithmRegistry::with_supported(store.clone(), Algorithm::ALL.to_vec()).unwrap();
        let pair = KeyPair::new(
            Algorithm::Dilithium2,
            PublicKey::from_bytes(&[1; 4]),
            PrivateKey::from_bytes(&[2; 4]),
        );
        store.put("alice", pair.clone()).unwrap();

        registry
            .set_selected_algorithm("alice", Algorithm::Falcon512)
            .unwrap();
        assert_eq!(store.get("alice").unwrap(), Some(pair));
    }
}
