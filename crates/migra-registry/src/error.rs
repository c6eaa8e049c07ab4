//! Error types for the registry layer

use crate::types::Address;
use std::path::PathBuf;

/// Errors raised by registries and their backing stores
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Address string is not a 20-byte hex address
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// Network identifier is empty or not usable as a storage key
    #[error("invalid network identifier '{0}'")]
    InvalidNetwork(String),

    /// Alias already bound to another address
    #[error("alias '{alias}' is bound to {existing}, refusing to rebind to {attempted}")]
    AliasConflict {
        alias: String,
        existing: Address,
        attempted: Address,
    },

    /// IO error while reading or writing a table
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored table could not be decoded
    #[error("corrupt table {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Store refused the write
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create corrupt-table error for path
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the error came from the durable backend rather than the caller
    #[inline]
    #[must_use]
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Corrupt { .. } | Self::Unavailable(_)
        )
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display_names_both_addresses() {
        let err = RegistryError::AliasConflict {
            alias: "USDC".to_string(),
            existing: Address::from_bytes([0xaa; 20]),
            attempted: Address::from_bytes([0xbb; 20]),
        };
        let text = err.to_string();
        assert!(text.contains("USDC"));
        assert!(text.contains("0xaaaa"));
        assert!(text.contains("0xbbbb"));
        assert!(!err.is_storage_failure());
    }

    #[test]
    fn io_error_is_storage_failure() {
        let err = RegistryError::io_error(
            "/tmp/roots.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_storage_failure());
        assert!(err.to_string().contains("roots.json"));
    }
}
