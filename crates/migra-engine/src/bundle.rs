//! Contracts bundle produced by `prepare`

use crate::chain::DeployedContract;
use crate::error::MigrationError;
use indexmap::IndexMap;
use migra_registry::Address;
use serde::{Deserialize, Serialize};

/// Role -> contract handle, in deployment order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractsBundle {
    contracts: IndexMap<String, DeployedContract>,
}

impl ContractsBundle {
    /// Create empty bundle
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert contract under role, returning the previous one
    pub fn insert(&mut self, role: impl Into<String>, contract: DeployedContract) -> Option<DeployedContract> {
        self.contracts.insert(role.into(), contract)
    }

    /// Contract for role
    #[inline]
    #[must_use]
    pub fn get(&self, role: &str) -> Option<&DeployedContract> {
        self.contracts.get(role)
    }

    /// Contract for role, or [`MigrationError::MissingContract`]
    ///
    /// # Errors
    /// Returns an error if no contract is bound to `role`.
    pub fn require(&self, role: &str) -> Result<&DeployedContract, MigrationError> {
        self.get(role)
            .ok_or_else(|| MigrationError::MissingContract(role.to_string()))
    }

    /// Address for role
    ///
    /// # Errors
    /// Returns an error if no contract is bound to `role`.
    pub fn address(&self, role: &str) -> Result<Address, MigrationError> {
        self.require(role).map(|c| c.address.clone())
    }

    /// Check if role is present
    #[inline]
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.contracts.contains_key(role)
    }

    /// Number of contracts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Check if bundle is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Roles in insertion order
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(String::as_str)
    }

    /// Iterate over role/contract pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeployedContract)> {
        self.contracts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keep only the listed roles, in the listed order
    ///
    /// # Errors
    /// Returns an error if any role is missing.
    pub fn select(&self, roles: &[&str]) -> Result<Self, MigrationError> {
        let mut selected = Self::new();
        for role in roles {
            selected.insert(*role, self.require(role)?.clone());
        }
        Ok(selected)
    }
}

impl Extend<(String, DeployedContract)> for ContractsBundle {
    fn extend<T: IntoIterator<Item = (String, DeployedContract)>>(&mut self, iter: T) {
        self.contracts.extend(iter);
    }
}

impl FromIterator<(String, DeployedContract)> for ContractsBundle {
    fn from_iter<T: IntoIterator<Item = (String, DeployedContract)>>(iter: T) -> Self {
        Self {
            contracts: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(byte: u8) -> DeployedContract {
        DeployedContract::new(format!("C{byte}"), Address::from_bytes([byte; 20]))
    }

    #[test]
    fn keeps_insertion_order() {
        let mut bundle = ContractsBundle::new();
        bundle.insert("WAVAX", contract(3));
        bundle.insert("USDC", contract(1));
        bundle.insert("WBTC.e", contract(2));

        assert_eq!(bundle.roles().collect::<Vec<_>>(), vec!["WAVAX", "USDC", "WBTC.e"]);
    }

    #[test]
    fn require_missing_role() {
        let bundle = ContractsBundle::new();
        let err = bundle.require("proxy").unwrap_err();
        assert!(matches!(err, MigrationError::MissingContract(role) if role == "proxy"));
    }

    #[test]
    fn select_subset() {
        let mut bundle = ContractsBundle::new();
        bundle.insert("USDC", contract(1));
        bundle.insert("WBTC.e", contract(2));
        bundle.insert("WAVAX", contract(3));

        let selected = bundle.select(&["WAVAX", "USDC"]).unwrap();
        assert_eq!(selected.roles().collect::<Vec<_>>(), vec!["WAVAX", "USDC"]);
        assert!(bundle.select(&["comet"]).is_err());
    }

    #[test]
    fn serializes_as_map() {
        let mut bundle = ContractsBundle::new();
        bundle.insert("USDC", contract(1));

        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["USDC"]["name"], "C1");
        assert_eq!(json["USDC"]["reused"], false);
    }
}
