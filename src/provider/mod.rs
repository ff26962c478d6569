/*!
 * Crypto primitive provider
 *
 * The controller never touches post-quantum math directly; it asks a
 * `CryptoProvider` to generate, sign, verify and check key pairs. The
 * production implementation wraps liboqs, tests substitute their own.
 */

mod oqs;

pub use self::oqs::OqsProvider;

use rand::RngCore;

use crate::algorithm::Algorithm;
use crate::error::{error_codes, KeyError, KeyResult};
use crate::keys::{PrivateKey, PublicKey};

/// Length of the random message signed when checking a key pair
pub const CHALLENGE_LEN: usize = 32;

/// Operations the controller needs from a post-quantum signature library
pub trait CryptoProvider: Send + Sync {
    /// Generate a fresh key pair for the algorithm
    fn generate_keypair(&self, algorithm: Algorithm) -> KeyResult<(PublicKey, PrivateKey)>;

    /// Sign a message with a private key
    fn sign(
        &self,
        algorithm: Algorithm,
        private_key: &PrivateKey,
        message: &[u8],
    ) -> KeyResult<Vec<u8>>;

    /// Verify a detached signature
    ///
    /// Returns `Ok(false)` for a well-formed but invalid signature.
    fn verify(
        &self,
        algorithm: Algorithm,
        public_key: &PublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> KeyResult<bool>;

    /// Recover the public key embedded in a private key
    ///
    /// Only some schemes embed it; the rest report `UnsupportedOperation`.
    fn derive_public(&self, _private_key: &PrivateKey, algorithm: Algorithm) -> KeyResult<PublicKey> {
        Err(KeyError::unsupported("derive_public", algorithm.name()))
    }

    /// Check that the two halves belong together
    ///
    /// Compares the derived public key where the scheme allows it, then signs
    /// a random challenge with the private key and verifies it with the public
    /// key. Malformed key material counts as inconsistent, not as an error.
    fn verify_keypair(
        &self,
        algorithm: Algorithm,
        public_key: &PublicKey,
        private_key: &PrivateKey,
    ) -> KeyResult<bool> {
        match self.derive_public(private_key, algorithm) {
            Ok(derived) => {
                if !derived.ct_eq(public_key) {
                    return Ok(false);
                }
            }
            Err(KeyError::UnsupportedOperation { .. }) => {}
            Err(e) if is_invalid_key_material(&e) => return Ok(false),
            Err(e) => return Err(e),
        }

        let mut challenge = [0u8; CHALLENGE_LEN];
        rand::thread_rng().fill_bytes(&mut challenge);

        let signature = match self.sign(algorithm, private_key, &challenge) {
            Ok(signature) => signature,
            Err(e) if is_invalid_key_material(&e) => return Ok(false),
            Err(e) => return Err(e),
        };

        match self.verify(algorithm, public_key, &challenge, &signature) {
            Ok(valid) => Ok(valid),
            Err(e) if is_invalid_key_material(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn is_invalid_key_material(err: &KeyError) -> bool {
    err.error_code() == error_codes::INVALID_KEY_MATERIAL
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Provider whose "signature" is the private key xor'd over the message;
    /// a pair is consistent when both halves are identical.
    struct MirrorProvider;

    impl CryptoProvider for MirrorProvider {
        fn generate_keypair(&self, _algorithm: Algorithm) -> KeyResult<(PublicKey, PrivateKey)> {
            Ok((PublicKey::from_bytes(&[7; 8]), PrivateKey::from_bytes(&[7; 8])))
        }

        fn sign(&self, _: Algorithm, private_key: &PrivateKey, message: &[u8]) -> KeyResult<Vec<u8>> {
            if private_key.is_empty() {
                return Err(KeyError::provider_error(
                    "sign",
                    "empty key",
                    error_codes::INVALID_KEY_MATERIAL,
                ));
            }
            Ok(message
                .iter()
                .zip(private_key.as_bytes().iter().cycle())
                .map(|(m, k)| m ^ k)
                .collect())
        }

        fn verify(
            &self,
            _: Algorithm,
            public_key: &PublicKey,
            message: &[u8],
            signature: &[u8],
        ) -> KeyResult<bool> {
            let expected: Vec<u8> = message
                .iter()
                .zip(public_key.as_bytes().iter().cycle())
                .map(|(m, k)| m ^ k)
                .collect();
            Ok(expected == signature)
        }
    }

    #[test]
    fn test_default_verify_keypair_accepts_matching_pair() {
        let provider = MirrorProvider;
        let (pk, sk) = provider.generate_keypair(Algorithm::Dilithium2).unwrap();
        assert!(provider.verify_keypair(Algorithm::Dilithium2, &pk, &sk).unwrap());
    }

    #[test]
    fn test_default_verify_keypair_rejects_foreign_public_key() {
        let provider = MirrorProvider;
        let (_, sk) = provider.generate_keypair(Algorithm::Dilithium2).unwrap();
        let other = PublicKey::from_bytes(&[8; 8]);
        assert!(!provider.verify_keypair(Algorithm::Dilithium2, &other, &sk).unwrap());
    }

    #[test]
    fn test_default_verify_keypair_treats_bad_material_as_inconsistent() {
        let provider = MirrorProvider;
        let pk = PublicKey::from_bytes(&[7; 8]);
        let empty = PrivateKey::from_bytes(&[]);
        assert!(!provider.verify_keypair(Algorithm::Dilithium2, &pk, &empty).unwrap());
    }

    #[test]
    fn test_default_derive_public_is_unsupported() {
        let provider = MirrorProvider;
        let err = provider
            .derive_public(&PrivateKey::from_bytes(&[1]), Algorithm::Falcon512)
            .unwrap_err();
        assert_eq!(err.error_type(), "UnsupportedOperation");
    }
}
