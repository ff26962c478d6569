/*!
 * Error handling for the post-quantum key lifecycle controller
 *
 * Every fallible operation returns a `KeyResult`. Errors carry a numeric code
 * and structured diagnostics; turning them into user-facing text is left to
 * the caller, keyed by `error_type()`.
 */

use std::collections::HashMap;
use thiserror::Error;

/// Error type for all key lifecycle operations
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("No algorithm selected for account '{account}'")]
    NoAlgorithmSelected { account: String },

    #[error("Invalid algorithm: {name}")]
    InvalidAlgorithm { name: String },

    #[error("No keys present for account '{account}'")]
    NoKeysPresent { account: String },

    #[error("Crypto provider error: {operation} - {cause}")]
    CryptoProviderError {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Key store error: {operation} - {cause}")]
    StoreError {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Algorithm mismatch: expected {expected}, got {actual}")]
    AlgorithmMismatch { expected: String, actual: String },

    #[error("Key generation timed out after {timeout_ms} ms")]
    GenerationTimedOut { timeout_ms: u64 },

    #[error("Key generation was cancelled")]
    GenerationCancelled,

    #[error("Malformed armor: {reason}")]
    MalformedArmor { reason: String },

    #[error("Operation not supported: {operation} for {algorithm}")]
    UnsupportedOperation { operation: String, algorithm: String },

    #[error("Export failed: {target} - {cause}")]
    ExportError { target: String, cause: String },

    #[error("Configuration error: {cause}")]
    ConfigError { cause: String },
}

/// Error code constants for different error categories
pub mod error_codes {
    // Registry errors: 1000-1999
    pub const NO_ALGORITHM_SELECTED: u32 = 1001;
    pub const INVALID_ALGORITHM: u32 = 1002;

    // Key state errors: 2000-2999
    pub const NO_KEYS_PRESENT: u32 = 2001;
    pub const ALGORITHM_MISMATCH: u32 = 2002;

    // Provider errors: 3000-3999
    pub const PROVIDER_INITIALIZATION_FAILED: u32 = 3001;
    pub const KEY_GENERATION_FAILED: u32 = 3002;
    pub const SIGNING_FAILED: u32 = 3003;
    pub const INVALID_KEY_MATERIAL: u32 = 3004;
    pub const UNSUPPORTED_OPERATION: u32 = 3005;

    // Store errors: 4000-4999
    pub const STORE_READ_FAILED: u32 = 4001;
    pub const STORE_WRITE_FAILED: u32 = 4002;
    pub const STORE_CORRUPTED: u32 = 4003;
    pub const STORE_LOCK_POISONED: u32 = 4004;

    // Export errors: 5000-5999
    pub const EXPORT_FAILED: u32 = 5001;
    pub const MALFORMED_ARMOR: u32 = 5002;

    // Generation control errors: 6000-6999
    pub const GENERATION_TIMED_OUT: u32 = 6001;
    pub const GENERATION_CANCELLED: u32 = 6002;

    // Miscellaneous: 9000-9999
    pub const CONFIGURATION_INVALID: u32 = 9001;
}

impl KeyError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            KeyError::NoAlgorithmSelected { .. } => error_codes::NO_ALGORITHM_SELECTED,
            KeyError::InvalidAlgorithm { .. } => error_codes::INVALID_ALGORITHM,
            KeyError::NoKeysPresent { .. } => error_codes::NO_KEYS_PRESENT,
            KeyError::CryptoProviderError { error_code, .. } => *error_code,
            KeyError::StoreError { error_code, .. } => *error_code,
            KeyError::AlgorithmMismatch { .. } => error_codes::ALGORITHM_MISMATCH,
            KeyError::GenerationTimedOut { .. } => error_codes::GENERATION_TIMED_OUT,
            KeyError::GenerationCancelled => error_codes::GENERATION_CANCELLED,
            KeyError::MalformedArmor { .. } => error_codes::MALFORMED_ARMOR,
            KeyError::UnsupportedOperation { .. } => error_codes::UNSUPPORTED_OPERATION,
            KeyError::ExportError { .. } => error_codes::EXPORT_FAILED,
            KeyError::ConfigError { .. } => error_codes::CONFIGURATION_INVALID,
        }
    }

    /// Get the error category as a string
    ///
    /// This is the stable key callers use to look up their own localized
    /// message tables.
    pub fn error_type(&self) -> &'static str {
        match self {
            KeyError::NoAlgorithmSelected { .. } => "NoAlgorithmSelected",
            KeyError::InvalidAlgorithm { .. } => "InvalidAlgorithm",
            KeyError::NoKeysPresent { .. } => "NoKeysPresent",
            KeyError::CryptoProviderError { .. } => "CryptoProviderError",
            KeyError::StoreError { .. } => "StoreError",
            KeyError::AlgorithmMismatch { .. } => "AlgorithmMismatch",
            KeyError::GenerationTimedOut { .. } => "GenerationTimedOut",
            KeyError::GenerationCancelled => "GenerationCancelled",
            KeyError::MalformedArmor { .. } => "MalformedArmor",
            KeyError::UnsupportedOperation { .. } => "UnsupportedOperation",
            KeyError::ExportError { .. } => "ExportError",
            KeyError::ConfigError { .. } => "ConfigError",
        }
    }

    /// Get technical details for debugging and logging
    pub fn technical_details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();

        details.insert("error_code".to_string(), self.error_code().to_string());
        details.insert("error_type".to_string(), self.error_type().to_string());
        details.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());

        match self {
            KeyError::NoAlgorithmSelected { account } | KeyError::NoKeysPresent { account } => {
                details.insert("account".to_string(), account.clone());
            }
            KeyError::InvalidAlgorithm { name } => {
                details.insert("algorithm".to_string(), name.clone());
            }
            KeyError::CryptoProviderError {
                operation, cause, ..
            }
            | KeyError::StoreError {
                operation, cause, ..
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("cause".to_string(), cause.clone());
            }
            KeyError::AlgorithmMismatch { expected, actual } => {
                details.insert("expected".to_string(), expected.clone());
                details.insert("actual".to_string(), actual.clone());
            }
            KeyError::GenerationTimedOut { timeout_ms } => {
                details.insert("timeout_ms".to_string(), timeout_ms.to_string());
            }
            KeyError::UnsupportedOperation {
                operation,
                algorithm,
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("algorithm".to_string(), algorithm.clone());
            }
            KeyError::ExportError { target, cause } => {
                details.insert("target".to_string(), target.clone());
                details.insert("cause".to_string(), cause.clone());
            }
            _ => {
                details.insert("details".to_string(), format!("{:?}", self));
            }
        }

        details
    }

    /// True when repeating the same call unchanged may succeed
    ///
    /// Covers provider, store, timeout and cancellation failures, after which
    /// the previous key pair is untouched. Selection and key-state errors
    /// (no algorithm selected, unsupported algorithm, no keys) need the caller
    /// to change something first and are not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeyError::CryptoProviderError { .. }
                | KeyError::StoreError { .. }
                | KeyError::GenerationTimedOut { .. }
                | KeyError::GenerationCancelled
        )
    }
}

/// Convenience constructors for common error types
impl KeyError {
    pub fn provider_error(operation: &str, cause: &str, error_code: u32) -> Self {
        KeyError::CryptoProviderError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn store_error(operation: &str, cause: &str, error_code: u32) -> Self {
        KeyError::StoreError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn invalid_algorithm(name: &str) -> Self {
        KeyError::InvalidAlgorithm {
            name: name.to_string(),
        }
    }

    pub fn malformed_armor(reason: &str) -> Self {
        KeyError::MalformedArmor {
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(operation: &str, algorithm: &str) -> Self {
        KeyError::UnsupportedOperation {
            operation: operation.to_string(),
            algorithm: algorithm.to_string(),
        }
    }

    /// Error for a lock whose holder panicked
    pub fn poisoned(operation: &str) -> Self {
        KeyError::store_error(
            operation,
            "lock poisoned by a panicked writer",
            error_codes::STORE_LOCK_POISONED,
        )
    }
}

// From implementations for automatic error conversion
impl From<std::io::Error> for KeyError {
    fn from(err: std::io::Error) -> Self {
        KeyError::store_error(
            "io",
            &format!("IO operation failed: {}", err),
            error_codes::STORE_WRITE_FAILED,
        )
    }
}

impl From<serde_json::Error> for KeyError {
    fn from(err: serde_json::Error) -> Self {
        KeyError::store_error("serialization", &err.to_string(), error_codes::STORE_CORRUPTED)
    }
}

/// Result type alias for key lifecycle operations
pub type KeyResult<T> = Result<T, KeyError>;
