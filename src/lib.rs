/*!
 * QaSa Post-Quantum Key Lifecycle
 *
 * Manages the generation, persistence, validation and export of one
 * post-quantum signature key pair per account.
 *
 * The pieces are:
 *
 * - `AlgorithmRegistry` for the supported algorithms and each account's choice
 * - `CryptoProvider` for the primitives (liboqs via `OqsProvider`)
 * - `KeyStore` for persistence (`MemoryKeyStore`, `FileKeyStore`)
 * - `KeyController` tying them together
 * - `ExportSink` for writing exported keys somewhere
 *
 * Generating a key pair always replaces the previous one; exporting a
 * private key cannot be undone, so callers confirm with the user first.
 */

/// Post-quantum signature algorithm catalogue
pub mod algorithm;

/// Controller configuration
pub mod config;

/// Key lifecycle controller
pub mod controller;

/// Common error types for the key lifecycle
pub mod error;

/// Key export formatting and sinks
pub mod export;

/// Key material types
pub mod keys;

/// Crypto primitive providers
pub mod provider;

/// Supported algorithms and per-account selection
pub mod registry;

/// Account-scoped key storage
pub mod store;

pub use algorithm::Algorithm;
pub use config::ControllerConfig;
pub use controller::{CancellationToken, KeyController, VerificationFailure, VerificationResult};
pub use error::{KeyError, KeyResult};
pub use export::{ExportSink, FileExportSink, KeyExport};
pub use keys::{KeyInfo, KeyPair, KeyState, PrivateKey, PublicKey};
pub use provider::{CryptoProvider, OqsProvider};
pub use registry::AlgorithmRegistry;
pub use store::{FileKeyStore, KeyStore, MemoryKeyStore};

/// Initialize the underlying post-quantum library.
///
/// Safe to call more than once. `OqsProvider::new` calls it as well.
///
/// # Example
///
/// ```no_run
/// use qasa_keys::prelude::*;
/// use std::sync::Arc;
///
/// fn main() -> KeyResult<()> {
///     init()?;
///
///     let config = ControllerConfig::default();
///     let store = Arc::new(config.open_store()?);
///     let registry = config.build_registry(store.clone())?;
///     let controller = KeyController::new(store, Arc::new(OqsProvider::new()), registry, config)?;
///
///     controller.registry().set_selected_algorithm("me@example.org", Algorithm::Dilithium5)?;
///     controller.generate_keys("me@example.org")?;
///     let export = controller.public_key_export("me@example.org")?;
///     FileExportSink::new("exports")?.write(&export)?;
///     Ok(())
/// }
/// ```
pub fn init() -> KeyResult<()> {
    oqs::init();
    log::debug!("liboqs initialized");
    Ok(())
}

/// The types most callers need
pub mod prelude {
    pub use crate::init;
    pub use crate::Algorithm;
    pub use crate::AlgorithmRegistry;
    pub use crate::CancellationToken;
    pub use crate::ControllerConfig;
    pub use crate::CryptoProvider;
    pub use crate::ExportSink;
    pub use crate::FileExportSink;
    pub use crate::FileKeyStore;
    pub use crate::KeyController;
    pub use crate::KeyError;
    pub use crate::KeyExport;
    pub use crate::KeyInfo;
    pub use crate::KeyPair;
    pub use crate::KeyResult;
    pub use crate::KeyState;
    pub use crate::KeyStore;
    pub use crate::MemoryKeyStore;
    pub use crate::OqsProvider;
    pub use crate::VerificationFailure;
    pub use crate::VerificationResult;
}
