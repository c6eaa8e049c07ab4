//! Backing stores for registry tables
//!
//! A store holds string tables keyed by network. Every `save` replaces a
//! whole table in one step; registries rely on this to publish batches
//! without partial states.

use crate::error::{RegistryError, RegistryResult};
use crate::types::NetworkId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Raw table contents
pub type Table = BTreeMap<String, String>;

/// Table kinds kept per network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// alias -> address
    Aliases,
    /// role -> address
    Roots,
    /// migration name -> enacted timestamp
    Migrations,
}

impl TableKind {
    /// Stable table name, also used as file stem
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Aliases => "aliases",
            Self::Roots => "roots",
            Self::Migrations => "migrations",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Durable storage for registry tables
pub trait RegistryStore: Send + Sync + fmt::Debug {
    /// Load a whole table; missing tables are empty
    ///
    /// # Errors
    /// Returns an error if the table exists but cannot be read or decoded.
    fn load(&self, network: &NetworkId, kind: TableKind) -> RegistryResult<Table>;

    /// Replace a whole table in one step
    ///
    /// # Errors
    /// Returns an error if the write could not be completed. On error the
    /// previous contents must remain readable.
    fn save(&self, network: &NetworkId, kind: TableKind, table: &Table) -> RegistryResult<()>;
}

/// JSON files under `<root>/<network>/<table>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create store rooted at directory (created lazily on first save)
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a table file
    #[must_use]
    pub fn table_path(&self, network: &NetworkId, kind: TableKind) -> PathBuf {
        self.root
            .join(network.as_str())
            .join(format!("{}.json", kind.name()))
    }
}

impl RegistryStore for FileStore {
    fn load(&self, network: &NetworkId, kind: TableKind) -> RegistryResult<Table> {
        let path = self.table_path(network, kind);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(e) => return Err(RegistryError::io_error(path, e)),
        };

        serde_json::from_str(&raw).map_err(|e| RegistryError::corrupt(path, e.to_string()))
    }

    fn save(&self, network: &NetworkId, kind: TableKind, table: &Table) -> RegistryResult<()> {
        let path = self.table_path(network, kind);
        let dir = self.root.join(network.as_str());
        std::fs::create_dir_all(&dir).map_err(|e| RegistryError::io_error(&dir, e))?;

        // Readers see either the old file or the new one, never a torn write.
        let mut tmp =
            tempfile::NamedTempFile::new_in(&dir).map_err(|e| RegistryError::io_error(&dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, table)
            .map_err(|e| RegistryError::corrupt(&path, e.to_string()))?;
        tmp.write_all(b"\n")
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| RegistryError::io_error(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| RegistryError::io_error(&path, e.error))?;

        tracing::debug!(path = %path.display(), entries = table.len(), "table saved");
        Ok(())
    }
}

/// In-process store shared between registry instances
///
/// Survives dropping and re-opening a registry, which makes it a stand-in
/// for durable storage across simulated restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<(NetworkId, TableKind), Table>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one table
    #[must_use]
    pub fn snapshot(&self, network: &NetworkId, kind: TableKind) -> Table {
        self.tables
            .read()
            .get(&(network.clone(), kind))
            .cloned()
            .unwrap_or_default()
    }
}

impl RegistryStore for MemoryStore {
    fn load(&self, network: &NetworkId, kind: TableKind) -> RegistryResult<Table> {
        Ok(self.snapshot(network, kind))
    }

    fn save(&self, network: &NetworkId, kind: TableKind, table: &Table) -> RegistryResult<()> {
        self.tables
            .write()
            .insert((network.clone(), kind), table.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fuji() -> NetworkId {
        NetworkId::new("fuji").unwrap()
    }

    #[test]
    fn file_store_missing_table_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load(&fuji(), TableKind::Roots).unwrap().is_empty());
    }

    #[test]
    fn file_store_round_trips_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let mut table = Table::new();
        table.insert("comet".to_string(), "0xaa".to_string());
        table.insert("configurator".to_string(), "0xbb".to_string());
        store.save(&fuji(), TableKind::Roots, &table).unwrap();

        assert!(store.table_path(&fuji(), TableKind::Roots).exists());
        assert_eq!(store.load(&fuji(), TableKind::Roots).unwrap(), table);
        assert!(store.load(&fuji(), TableKind::Aliases).unwrap().is_empty());
    }

    #[test]
    fn file_store_save_replaces_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let mut first = Table::new();
        first.insert("a".to_string(), "1".to_string());
        store.save(&fuji(), TableKind::Aliases, &first).unwrap();

        let mut second = Table::new();
        second.insert("b".to_string(), "2".to_string());
        store.save(&fuji(), TableKind::Aliases, &second).unwrap();

        assert_eq!(store.load(&fuji(), TableKind::Aliases).unwrap(), second);
    }

    #[test]
    fn file_store_reports_corrupt_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.table_path(&fuji(), TableKind::Aliases);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let err = store.load(&fuji(), TableKind::Aliases).unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn memory_store_is_network_scoped() {
        let store = MemoryStore::new();
        let other = NetworkId::new("goerli").unwrap();

        let mut table = Table::new();
        table.insert("USDC".to_string(), "0x01".to_string());
        store.save(&fuji(), TableKind::Aliases, &table).unwrap();

        assert_eq!(store.load(&fuji(), TableKind::Aliases).unwrap(), table);
        assert!(store.load(&other, TableKind::Aliases).unwrap().is_empty());
    }
}
