//! Core registry types
//!
//! Defines:
//! - [`Address`]: normalized 20-byte hex address
//! - [`NetworkId`]: network scope for every table
//! - [`PersistMode`]: whether a write reaches durable storage
//! - [`RegistryValue`]: string codec for stored values

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// On-chain contract address
///
/// Always stored lowercase with a `0x` prefix so that equality is textual.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Length of an address in bytes
    pub const LEN: usize = 20;

    /// Build from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// The zero address
    #[inline]
    #[must_use]
    pub fn zero() -> Self {
        Self::from_bytes([0u8; Self::LEN])
    }

    /// Normalized string form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| RegistryError::InvalidAddress(s.to_string()))?;

        let bytes = hex::decode(digits).map_err(|_| RegistryError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|_| RegistryError::InvalidAddress(s.to_string()))?;

        Ok(Self::from_bytes(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network identifier (e.g. `fuji`, `avalanche`)
///
/// Used as a storage key, so path separators and dots-only names are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkId(String);

impl NetworkId {
    /// Create a network id
    ///
    /// # Errors
    /// Returns [`RegistryError::InvalidNetwork`] for empty names or names
    /// containing path separators.
    pub fn new(name: impl Into<String>) -> Result<Self, RegistryError> {
        let name = name.into();
        let usable = !name.is_empty()
            && !name.chars().all(|c| c == '.')
            && !name.contains(['/', '\\'])
            && !name.chars().any(char::is_whitespace);
        if usable {
            Ok(Self(name))
        } else {
            Err(RegistryError::InvalidNetwork(name))
        }
    }

    /// Network name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NetworkId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NetworkId {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NetworkId> for String {
    fn from(value: NetworkId) -> Self {
        value.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a registry write reaches durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Write through to the backing store
    Durable,

    /// Keep in memory only; lost when the registry is dropped
    #[default]
    Ephemeral,
}

impl PersistMode {
    /// Check if writes reach the store
    #[inline]
    #[must_use]
    pub fn is_durable(self) -> bool {
        matches!(self, Self::Durable)
    }
}

impl fmt::Display for PersistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable => f.write_str("durable"),
            Self::Ephemeral => f.write_str("ephemeral"),
        }
    }
}

/// String codec for values kept in a registry table
pub trait RegistryValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Encode into the stored string form
    fn encode(&self) -> String;

    /// Decode from the stored string form
    ///
    /// # Errors
    /// Returns a human-readable reason when the string is malformed.
    fn decode(raw: &str) -> Result<Self, String>;
}

impl RegistryValue for Address {
    fn encode(&self) -> String {
        self.0.clone()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        raw.parse().map_err(|e: RegistryError| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_normalizes_case() {
        let a: Address = "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E".parse().unwrap();
        assert_eq!(a.as_str(), "0xb97ef9ef8734c71904d8002f8b6bc66dd9c48a6e");

        let b: Address = "0Xb97ef9ef8734c71904d8002f8b6bc66dd9c48a6e".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!("b97ef9ef8734c71904d8002f8b6bc66dd9c48a6e".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz7ef9ef8734c71904d8002f8b6bc66dd9c48a6e".parse::<Address>().is_err());
    }

    #[test]
    fn address_serde_as_string() {
        let a = Address::from_bytes([0xaa; 20]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{a}\""));

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<Address>("\"0x12\"").is_err());
    }

    #[test]
    fn network_rejects_path_like_names() {
        assert!(NetworkId::new("fuji").is_ok());
        assert!(NetworkId::new("").is_err());
        assert!(NetworkId::new("..").is_err());
        assert!(NetworkId::new("a/b").is_err());
        assert!(NetworkId::new("main net").is_err());
    }

    #[test]
    fn persist_mode_defaults_ephemeral() {
        assert_eq!(PersistMode::default(), PersistMode::Ephemeral);
        assert!(PersistMode::Durable.is_durable());
        assert!(!PersistMode::Ephemeral.is_durable());
    }
}
