/*!
 * Post-quantum signature algorithm catalogue
 *
 * The closed set of schemes a key pair may be generated against. The set is
 * versioned with `CATALOGUE_VERSION`; adding or removing a variant bumps it.
 */

use std::fmt;
use std::str::FromStr;

use oqs::sig;
use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// Version of the algorithm catalogue
pub const CATALOGUE_VERSION: u32 = 1;

/// Post-quantum signature algorithms supported for account key pairs
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// CRYSTALS-Dilithium2 (NIST security level 2)
    Dilithium2,
    /// CRYSTALS-Dilithium3 (NIST security level 3)
    Dilithium3,
    /// CRYSTALS-Dilithium5 (NIST security level 5)
    Dilithium5,
    /// Falcon-512 (NIST security level 1)
    Falcon512,
    /// Falcon-1024 (NIST security level 5)
    Falcon1024,
    /// SPHINCS+-SHA2-128f-simple (fast variant, NIST security level 1)
    SphincsSha2128fSimple,
    /// SPHINCS+-SHA2-256s-simple (small variant, NIST security level 5)
    SphincsSha2256sSimple,
    /// SPHINCS+-SHAKE-128f-simple (fast variant, NIST security level 1)
    SphincsShake128fSimple,
    /// SPHINCS+-SHAKE-256s-simple (small variant, NIST security level 5)
    SphincsShake256sSimple,
}

impl Algorithm {
    /// Every catalogue entry, in presentation order
    pub const ALL: [Algorithm; 9] = [
        Algorithm::Dilithium2,
        Algorithm::Dilithium3,
        Algorithm::Dilithium5,
        Algorithm::Falcon512,
        Algorithm::Falcon1024,
        Algorithm::SphincsSha2128fSimple,
        Algorithm::SphincsSha2256sSimple,
        Algorithm::SphincsShake128fSimple,
        Algorithm::SphincsShake256sSimple,
    ];

    /// Canonical name, as spelled by liboqs
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Dilithium2 => "Dilithium2",
            Algorithm::Dilithium3 => "Dilithium3",
            Algorithm::Dilithium5 => "Dilithium5",
            Algorithm::Falcon512 => "Falcon-512",
            Algorithm::Falcon1024 => "Falcon-1024",
            Algorithm::SphincsSha2128fSimple => "SPHINCS+-SHA2-128f-simple",
            Algorithm::SphincsSha2256sSimple => "SPHINCS+-SHA2-256s-simple",
            Algorithm::SphincsShake128fSimple => "SPHINCS+-SHAKE-128f-simple",
            Algorithm::SphincsShake256sSimple => "SPHINCS+-SHAKE-256s-simple",
        }
    }

    /// Tag written into armored blocks
    pub fn armor_tag(&self) -> String {
        self.name().to_uppercase()
    }

    /// Get the OQS algorithm for this variant
    pub(crate) fn oqs_algorithm(&self) -> sig::Algorithm {
        match self {
            Algorithm::Dilithium2 => sig::Algorithm::Dilithium2,
            Algorithm::Dilithium3 => sig::Algorithm::Dilithium3,
            Algorithm::Dilithium5 => sig::Algorithm::Dilithium5,
            Algorithm::Falcon512 => sig::Algorithm::Falcon512,
            Algorithm::Falcon1024 => sig::Algorithm::Falcon1024,
            Algorithm::SphincsSha2128fSimple => sig::Algorithm::SphincsSha2128fSimple,
            Algorithm::SphincsSha2256sSimple => sig::Algorithm::SphincsSha2256sSimple,
            Algorithm::SphincsShake128fSimple => sig::Algorithm::SphincsShake128fSimple,
            Algorithm::SphincsShake256sSimple => sig::Algorithm::SphincsShake256sSimple,
        }
    }

    /// Whether the linked liboqs build provides this algorithm
    pub fn is_enabled(&self) -> bool {
        self.oqs_algorithm().is_enabled()
    }

    /// Get the NIST security level of this variant
    pub fn security_level(&self) -> u8 {
        match self {
            Algorithm::Dilithium2 => 2,
            Algorithm::Dilithium3 => 3,
            Algorithm::Dilithium5 => 5,
            Algorithm::Falcon512 => 1,
            Algorithm::Falcon1024 => 5,
            Algorithm::SphincsSha2128fSimple | Algorithm::SphincsShake128fSimple => 1,
            Algorithm::SphincsSha2256sSimple | Algorithm::SphincsShake256sSimple => 5,
        }
    }

    /// Get the public key size in bytes
    pub fn public_key_size(&self) -> usize {
        match self {
            Algorithm::Dilithium2 => 1312,
            Algorithm::Dilithium3 => 1952,
            Algorithm::Dilithium5 => 2592,
            Algorithm::Falcon512 => 897,
            Algorithm::Falcon1024 => 1793,
            Algorithm::SphincsSha2128fSimple | Algorithm::SphincsShake128fSimple => 32,
            Algorithm::SphincsSha2256sSimple | Algorithm::SphincsShake256sSimple => 64,
        }
    }

    /// Get the private key size in bytes
    pub fn private_key_size(&self) -> usize {
        match self {
            Algorithm::Dilithium2 => 2528,
            Algorithm::Dilithium3 => 4000,
            Algorithm::Dilithium5 => 4864,
            Algorithm::Falcon512 => 1281,
            Algorithm::Falcon1024 => 2305,
            Algorithm::SphincsSha2128fSimple | Algorithm::SphincsShake128fSimple => 64,
            Algorithm::SphincsSha2256sSimple | Algorithm::SphincsShake256sSimple => 128,
        }
    }

    /// Hash-based schemes embed the public key at the tail of the private key
    pub fn private_key_embeds_public(&self) -> bool {
        matches!(
            self,
            Algorithm::SphincsSha2128fSimple
                | Algorithm::SphincsSha2256sSimple
                | Algorithm::SphincsShake128fSimple
                | Algorithm::SphincsShake256sSimple
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Algorithm {
    type Err = KeyError;

    /// Parse a canonical name or armor tag, ignoring case
    ///
    /// Older clients spelled the SPHINCS+ hash families `SHA256` and
    /// `SHAKE256`; those spellings map onto the current names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let legacy = wanted
            .replace("sphincs+-sha256-", "sphincs+-sha2-")
            .replace("sphincs+-shake256-", "sphincs+-shake-");

        Algorithm::ALL
            .iter()
            .copied()
            .find(|alg| {
                let name = alg.name().to_lowercase();
                name == wanted || name == legacy
            })
            .ok_or_else(|| KeyError::invalid_algorithm(s))
    }
}
