//! Network-scoped keyed table with a durable layer and an in-memory overlay
//!
//! [`KeyedTable`] is the shared machinery behind the alias registry, the
//! root registry and the migration log. Reads see the overlay; durable
//! writes replace the stored table before they become visible.

use crate::error::{RegistryError, RegistryResult};
use crate::store::{RegistryStore, Table, TableKind};
use crate::types::{NetworkId, PersistMode, RegistryValue};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
struct Layers<V> {
    /// Mirror of what the store holds
    durable: BTreeMap<String, V>,
    /// What readers see (durable plus ephemeral writes)
    visible: BTreeMap<String, V>,
}

/// Keyed table bound to one network and one store table
#[derive(Debug)]
pub struct KeyedTable<V: RegistryValue> {
    store: Arc<dyn RegistryStore>,
    network: NetworkId,
    kind: TableKind,
    layers: RwLock<Layers<V>>,
}

impl<V: RegistryValue> KeyedTable<V> {
    /// Load the durable table for `network`
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or holds malformed values.
    pub fn open(
        store: Arc<dyn RegistryStore>,
        network: NetworkId,
        kind: TableKind,
    ) -> RegistryResult<Self> {
        let raw = store.load(&network, kind)?;
        let mut durable = BTreeMap::new();
        for (key, value) in raw {
            let decoded = V::decode(&value).map_err(|reason| {
                RegistryError::corrupt(
                    format!("{network}/{kind}"),
                    format!("entry '{key}': {reason}"),
                )
            })?;
            durable.insert(key, decoded);
        }

        Ok(Self {
            store,
            network,
            kind,
            layers: RwLock::new(Layers {
                visible: durable.clone(),
                durable,
            }),
        })
    }

    /// Network this table is scoped to
    #[inline]
    #[must_use]
    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    /// Get value for key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.layers.read().visible.get(key).cloned()
    }

    /// Check if key is present
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.layers.read().visible.contains_key(key)
    }

    /// Check if key is present in durable storage
    #[must_use]
    pub fn is_durable(&self, key: &str) -> bool {
        self.layers.read().durable.contains_key(key)
    }

    /// Snapshot of visible entries
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, V> {
        self.layers.read().visible.clone()
    }

    /// Number of visible entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.read().visible.len()
    }

    /// Check if no entries are visible
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.read().visible.is_empty()
    }

    /// Set a single key (last writer wins)
    ///
    /// # Errors
    /// Returns an error if a durable write fails; the value is then not visible.
    pub fn set(&self, key: &str, value: V, mode: PersistMode) -> RegistryResult<()> {
        self.set_checked(key, value, mode, |_| Ok(()))
    }

    /// Set a single key after `check` approves the current value
    ///
    /// The check and the write happen under one lock.
    ///
    /// # Errors
    /// Returns the check's error, or a storage error on durable writes.
    pub fn set_checked<F>(&self, key: &str, value: V, mode: PersistMode, check: F) -> RegistryResult<()>
    where
        F: FnOnce(Option<&V>) -> RegistryResult<()>,
    {
        let mut layers = self.layers.write();
        check(layers.visible.get(key))?;

        let mut batch = BTreeMap::new();
        batch.insert(key.to_string(), value);
        self.apply(&mut layers, batch, mode)
    }

    /// Set every entry of `batch` in one step
    ///
    /// Durable batches replace the stored table once; readers see either
    /// none or all of the batch.
    ///
    /// # Errors
    /// Returns a storage error on durable writes; nothing from the batch is
    /// then visible.
    pub fn set_batch(&self, batch: BTreeMap<String, V>, mode: PersistMode) -> RegistryResult<()> {
        let mut layers = self.layers.write();
        self.apply(&mut layers, batch, mode)
    }

    /// Entries visible in memory but not held durably
    #[must_use]
    pub fn ephemeral_entries(&self) -> BTreeMap<String, V> {
        let layers = self.layers.read();
        layers
            .visible
            .iter()
            .filter(|(key, value)| layers.durable.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Write the visible values of `keys` to durable storage in one step
    ///
    /// Keys that are missing or already durable are skipped. Returns the
    /// number of keys persisted.
    ///
    /// # Errors
    /// Returns a storage error; durability is then unchanged.
    pub fn persist<'k, I>(&self, keys: I) -> RegistryResult<usize>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let mut layers = self.layers.write();
        let batch: BTreeMap<String, V> = keys
            .into_iter()
            .filter_map(|key| {
                let value = layers.visible.get(key)?;
                (layers.durable.get(key) != Some(value)).then(|| (key.to_string(), value.clone()))
            })
            .collect();
        let count = batch.len();
        self.apply(&mut layers, batch, PersistMode::Durable)?;
        Ok(count)
    }

    fn apply(
        &self,
        layers: &mut Layers<V>,
        batch: BTreeMap<String, V>,
        mode: PersistMode,
    ) -> RegistryResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        if mode.is_durable() {
            let mut next = layers.durable.clone();
            next.extend(batch.iter().map(|(k, v)| (k.clone(), v.clone())));
            let raw: Table = next.iter().map(|(k, v)| (k.clone(), v.encode())).collect();
            self.store.save(&self.network, self.kind, &raw)?;
            layers.durable = next;
        }

        tracing::trace!(
            network = %self.network,
            table = %self.kind,
            entries = batch.len(),
            %mode,
            "table write"
        );
        layers.visible.extend(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Address;

    fn open(store: &Arc<MemoryStore>) -> KeyedTable<Address> {
        let store: Arc<dyn RegistryStore> = store.clone();
        KeyedTable::open(store, NetworkId::new("fuji").unwrap(), TableKind::Aliases).unwrap()
    }

    #[test]
    fn ephemeral_write_is_visible_but_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let table = open(&store);
        let addr = Address::from_bytes([1; 20]);

        table.set("WAVAX", addr.clone(), PersistMode::Ephemeral).unwrap();

        assert_eq!(table.get("WAVAX"), Some(addr));
        assert!(!table.is_durable("WAVAX"));
        assert!(open(&store).get("WAVAX").is_none());
    }

    #[test]
    fn durable_write_survives_reopen() {
        let store = Arc::new(MemoryStore::new());
        let table = open(&store);
        let addr = Address::from_bytes([2; 20]);

        table.set("WAVAX", addr.clone(), PersistMode::Durable).unwrap();

        assert!(table.is_durable("WAVAX"));
        assert_eq!(open(&store).get("WAVAX"), Some(addr));
    }

    #[test]
    fn durable_write_does_not_flush_ephemeral_entries() {
        let store = Arc::new(MemoryStore::new());
        let table = open(&store);

        table
            .set("scratch", Address::from_bytes([3; 20]), PersistMode::Ephemeral)
            .unwrap();
        table
            .set("kept", Address::from_bytes([4; 20]), PersistMode::Durable)
            .unwrap();

        let reopened = open(&store);
        assert!(reopened.has("kept"));
        assert!(!reopened.has("scratch"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn persist_promotes_selected_ephemeral_entries() {
        let store = Arc::new(MemoryStore::new());
        let table = open(&store);
        table.set("USDC", Address::from_bytes([5; 20]), PersistMode::Ephemeral).unwrap();
        table.set("WAVAX", Address::from_bytes([6; 20]), PersistMode::Ephemeral).unwrap();
        table.set("kept", Address::from_bytes([7; 20]), PersistMode::Durable).unwrap();
        assert_eq!(table.ephemeral_entries().len(), 2);

        let persisted = table.persist(["USDC", "kept", "missing"]).unwrap();

        assert_eq!(persisted, 1);
        assert!(table.is_durable("USDC"));
        assert!(!table.is_durable("WAVAX"));
        let reopened = open(&store);
        assert!(reopened.has("USDC"));
        assert!(reopened.has("kept"));
        assert!(!reopened.has("WAVAX"));
    }

    #[test]
    fn rejected_check_leaves_table_untouched() {
        let store = Arc::new(MemoryStore::new());
        let table = open(&store);

        let err = table
            .set_checked("USDC", Address::zero(), PersistMode::Durable, |_| {
                Err(RegistryError::Unavailable("nope".to_string()))
            })
            .unwrap_err();

        assert!(matches!(err, RegistryError::Unavailable(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn open_rejects_malformed_stored_value() {
        let store = Arc::new(MemoryStore::new());
        let mut raw = Table::new();
        raw.insert("USDC".to_string(), "not-an-address".to_string());
        store
            .save(&NetworkId::new("fuji").unwrap(), TableKind::Aliases, &raw)
            .unwrap();

        let dyn_store: Arc<dyn RegistryStore> = store;
        let err = KeyedTable::<Address>::open(dyn_store, NetworkId::new("fuji").unwrap(), TableKind::Aliases)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }
}
