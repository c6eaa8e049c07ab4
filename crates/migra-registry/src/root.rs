//! Root registry
//!
//! Canonical role -> address bindings that consumers read to find the
//! active deployment. Migrations publish roots through
//! [`RootRegistry::commit`], which writes a whole batch at once.

use crate::error::RegistryResult;
use crate::store::{RegistryStore, TableKind};
use crate::table::KeyedTable;
use crate::types::{Address, NetworkId, PersistMode};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Role -> address bindings produced by one enact
pub type Roots = BTreeMap<String, Address>;

/// Role -> address mapping for one network
#[derive(Debug)]
pub struct RootRegistry {
    table: KeyedTable<Address>,
}

impl RootRegistry {
    /// Open the root table for `network`
    ///
    /// # Errors
    /// Returns an error if the stored table cannot be loaded.
    pub fn open(store: Arc<dyn RegistryStore>, network: NetworkId) -> RegistryResult<Self> {
        Ok(Self {
            table: KeyedTable::open(store, network, TableKind::Roots)?,
        })
    }

    /// Network this registry is scoped to
    #[inline]
    #[must_use]
    pub fn network(&self) -> &NetworkId {
        self.table.network()
    }

    /// Address bound to role
    #[inline]
    #[must_use]
    pub fn get(&self, role: &str) -> Option<Address> {
        self.table.get(role)
    }

    /// Check if role is bound
    #[inline]
    #[must_use]
    pub fn has(&self, role: &str) -> bool {
        self.table.has(role)
    }

    /// Bind one role outside a migration (operator repair)
    ///
    /// # Errors
    /// Returns a storage error if a durable write fails.
    pub fn set(&self, role: &str, address: Address, mode: PersistMode) -> RegistryResult<()> {
        self.table.set(role, address, mode)
    }

    /// Publish every binding in `roots` as one durable write
    ///
    /// Readers observe either the previous roots or all of `roots`. An empty
    /// batch is a no-op.
    ///
    /// # Errors
    /// Returns a storage error if the write fails; no root changes then.
    pub fn commit(&self, roots: Roots) -> RegistryResult<()> {
        let count = roots.len();
        self.table.set_batch(roots, PersistMode::Durable)?;
        if count > 0 {
            tracing::info!(network = %self.network(), roots = count, "roots committed");
        }
        Ok(())
    }

    /// Snapshot of all roots
    #[inline]
    #[must_use]
    pub fn entries(&self) -> Roots {
        self.table.entries()
    }
}
