//! Alias registry
//!
//! Maps stable names (e.g. `USDC`, `WBTC.e`) to the address of the contract
//! currently carrying that name on one network.

use crate::error::{RegistryError, RegistryResult};
use crate::store::{RegistryStore, TableKind};
use crate::table::KeyedTable;
use crate::types::{Address, NetworkId, PersistMode};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Alias -> address mapping for one network
#[derive(Debug)]
pub struct AliasRegistry {
    table: KeyedTable<Address>,
}

impl AliasRegistry {
    /// Open the alias table for `network`
    ///
    /// # Errors
    /// Returns an error if the stored table cannot be loaded.
    pub fn open(store: Arc<dyn RegistryStore>, network: NetworkId) -> RegistryResult<Self> {
        Ok(Self {
            table: KeyedTable::open(store, network, TableKind::Aliases)?,
        })
    }

    /// Network this registry is scoped to
    #[inline]
    #[must_use]
    pub fn network(&self) -> &NetworkId {
        self.table.network()
    }

    /// Address bound to alias
    #[inline]
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<Address> {
        self.table.get(alias)
    }

    /// Check if alias is bound
    #[inline]
    #[must_use]
    pub fn has(&self, alias: &str) -> bool {
        self.table.has(alias)
    }

    /// Check if alias is bound in durable storage
    #[inline]
    #[must_use]
    pub fn is_durable(&self, alias: &str) -> bool {
        self.table.is_durable(alias)
    }

    /// Bind alias unconditionally (last writer wins)
    ///
    /// # Errors
    /// Returns a storage error if a durable write fails.
    pub fn set(&self, alias: &str, address: Address, mode: PersistMode) -> RegistryResult<()> {
        self.table.set(alias, address, mode)
    }

    /// Bind alias, refusing to move it to a different address unless `force`
    ///
    /// Rebinding to the same address is accepted and re-written, so an
    /// ephemeral binding can be made durable.
    ///
    /// # Errors
    /// Returns [`RegistryError::AliasConflict`] when the alias points
    /// elsewhere and `force` is off, or a storage error on durable writes.
    pub fn bind(
        &self,
        alias: &str,
        address: Address,
        force: bool,
        mode: PersistMode,
    ) -> RegistryResult<()> {
        let attempted = address.clone();
        self.table.set_checked(alias, address, mode, |current| match current {
            Some(existing) if *existing != attempted && !force => Err(RegistryError::AliasConflict {
                alias: alias.to_string(),
                existing: existing.clone(),
                attempted: attempted.clone(),
            }),
            _ => Ok(()),
        })
    }

    /// Bindings that live only in memory
    #[inline]
    #[must_use]
    pub fn ephemeral(&self) -> BTreeMap<String, Address> {
        self.table.ephemeral_entries()
    }

    /// Make the current bindings of `aliases` durable
    ///
    /// # Errors
    /// Returns a storage error if the write fails.
    pub fn persist<'k, I>(&self, aliases: I) -> RegistryResult<usize>
    where
        I: IntoIterator<Item = &'k str>,
    {
        self.table.persist(aliases)
    }

    /// Snapshot of all bindings
    #[inline]
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, Address> {
        self.table.entries()
    }

    /// Number of bound aliases
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if no alias is bound
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
