//! Record of enacted migrations per network

use crate::error::RegistryResult;
use crate::store::{RegistryStore, TableKind};
use crate::table::KeyedTable;
use crate::types::{NetworkId, PersistMode, RegistryValue};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Time a migration was enacted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnactedAt(pub DateTime<Utc>);

impl EnactedAt {
    /// Current time, at the millisecond precision it is stored with
    #[inline]
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().trunc_subsecs(3))
    }
}

impl fmt::Display for EnactedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl RegistryValue for EnactedAt {
    fn encode(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn decode(raw: &str) -> Result<Self, String> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| Self(t.with_timezone(&Utc)))
            .map_err(|e| e.to_string())
    }
}

/// Migration name -> enacted timestamp
#[derive(Debug)]
pub struct MigrationLog {
    table: KeyedTable<EnactedAt>,
}

impl MigrationLog {
    /// Open the log for `network`
    ///
    /// # Errors
    /// Returns an error if the stored table cannot be loaded.
    pub fn open(store: Arc<dyn RegistryStore>, network: NetworkId) -> RegistryResult<Self> {
        Ok(Self {
            table: KeyedTable::open(store, network, TableKind::Migrations)?,
        })
    }

    /// Check if migration was enacted
    #[inline]
    #[must_use]
    pub fn is_enacted(&self, migration: &str) -> bool {
        self.table.has(migration)
    }

    /// When migration was enacted
    #[inline]
    #[must_use]
    pub fn enacted_at(&self, migration: &str) -> Option<EnactedAt> {
        self.table.get(migration)
    }

    /// Durably record migration as enacted now
    ///
    /// # Errors
    /// Returns a storage error if the write fails.
    pub fn record(&self, migration: &str) -> RegistryResult<EnactedAt> {
        let at = EnactedAt::now();
        self.table.set(migration, at, PersistMode::Durable)?;
        Ok(at)
    }

    /// Snapshot of all enacted migrations
    #[inline]
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, EnactedAt> {
        self.table.entries()
    }
}
