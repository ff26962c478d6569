//! liboqs-backed provider

use oqs::sig::Sig;

use crate::algorithm::Algorithm;
use crate::error::{error_codes, KeyError, KeyResult};
use crate::keys::{PrivateKey, PublicKey};
use crate::provider::CryptoProvider;

/// `CryptoProvider` backed by the Open Quantum Safe library
///
/// A `Sig` instance is created per call, so the provider itself holds no
/// state and is freely shareable across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct OqsProvider;

impl OqsProvider {
    pub fn new() -> Self {
        oqs::init();
        Self
    }

    fn sig(&self, algorithm: Algorithm) -> KeyResult<Sig> {
        Sig::new(algorithm.oqs_algorithm()).map_err(|e| {
            KeyError::provider_error(
                &format!("initialize {}", algorithm),
                &e.to_string(),
                error_codes::PROVIDER_INITIALIZATION_FAILED,
            )
        })
    }
}

impl CryptoProvider for OqsProvider {
    fn generate_keypair(&self, algorithm: Algorithm) -> KeyResult<(PublicKey, PrivateKey)> {
        let sig = self.sig(algorithm)?;

        let (public_key, secret_key) = sig.keypair().map_err(|e| {
            KeyError::provider_error(
                "Key generation failed",
                &e.to_string(),
                error_codes::KEY_GENERATION_FAILED,
            )
        })?;

        let public_key = PublicKey::from(public_key.into_vec());
        let private_key = PrivateKey::from(secret_key.into_vec());

        log::debug!(
            "Generated {} key pair: pk={} bytes, sk={} bytes",
            algorithm,
            public_key.len(),
            private_key.len()
        );

        Ok((public_key, private_key))
    }

    fn sign(
        &self,
        algorithm: Algorithm,
        private_key: &PrivateKey,
        message: &[u8],
    ) -> KeyResult<Vec<u8>> {
        let sig = self.sig(algorithm)?;

        let sk = sig
            .secret_key_from_bytes(private_key.as_bytes())
            .ok_or_else(|| {
                KeyError::provider_error(
                    "Signature generation failed",
                    "Failed to create secret key from bytes",
                    error_codes::INVALID_KEY_MATERIAL,
                )
            })?;

        let signature = sig.sign(message, sk).map_err(|e| {
            KeyError::provider_error(
                "Signature generation failed",
                &e.to_string(),
                error_codes::SIGNING_FAILED,
            )
        })?;

        Ok(signature.into_vec())
    }

    fn verify(
        &self,
        algorithm: Algorithm,
        public_key: &PublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> KeyResult<bool> {
        let sig = self.sig(algorithm)?;

        let pk = sig.public_key_from_bytes(public_key.as_bytes()).ok_or_else(|| {
            KeyError::provider_error(
                "Signature verification failed",
                "Failed to create public key from bytes",
                error_codes::INVALID_KEY_MATERIAL,
            )
        })?;

        // An oversized or truncated signature is simply not valid
        let signature = match sig.signature_from_bytes(signature) {
            Some(signature) => signature,
            None => return Ok(false),
        };

        match sig.verify(message, signature, pk) {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    fn derive_public(&self, private_key: &PrivateKey, algorithm: Algorithm) -> KeyResult<PublicKey> {
        if !algorithm.private_key_embeds_public() {
            return Err(KeyError::unsupported("derive_public", algorithm.name()));
        }

        let sk = private_key.as_bytes();
        if sk.len() != algorithm.private_key_size() {
            return Err(KeyError::provider_error(
                "derive_public",
                &format!(
                    "expected {} byte private key, got {}",
                    algorithm.private_key_size(),
                    sk.len()
                ),
                error_codes::INVALID_KEY_MATERIAL,
            ));
        }

        // SK.seed || SK.prf || PK.seed || PK.root
        let offset = sk.len() - algorithm.public_key_size();
        Ok(PublicKey::from_bytes(&sk[offset..]))
    }
}
