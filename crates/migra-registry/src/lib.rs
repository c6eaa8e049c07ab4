//! Migra Registry
//!
//! Network-scoped, persistent name tables used by the migration engine.
//!
//! # Overview
//!
//! - **AliasRegistry**: stable alias -> deployed address
//! - **RootRegistry**: canonical role -> address, published in batches
//! - **MigrationLog**: which migrations were enacted, and when
//! - **RegistryStore**: durable backends ([`FileStore`], [`MemoryStore`])
//!
//! Every write carries a [`PersistMode`]. Durable writes replace the stored
//! table before the new value becomes visible; ephemeral writes stay in
//! memory and vanish with the registry.
//!
//! # Example
//!
//! ```rust
//! use migra_registry::{Address, AliasRegistry, MemoryStore, NetworkId, PersistMode};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let aliases = AliasRegistry::open(store, NetworkId::new("fuji").unwrap()).unwrap();
//!
//! let usdc: Address = "0xb97ef9ef8734c71904d8002f8b6bc66dd9c48a6e".parse().unwrap();
//! aliases.bind("USDC", usdc.clone(), false, PersistMode::Ephemeral).unwrap();
//! assert_eq!(aliases.get("USDC"), Some(usdc));
//! ```

#![warn(missing_docs)]

pub mod alias;
pub mod error;
pub mod log;
pub mod root;
pub mod store;
pub mod table;
pub mod types;

// Re-exports
pub use alias::AliasRegistry;
pub use error::{RegistryError, RegistryResult};
pub use log::{EnactedAt, MigrationLog};
pub use root::{RootRegistry, Roots};
pub use store::{FileStore, MemoryStore, RegistryStore, Table, TableKind};
pub use table::KeyedTable;
pub use types::{Address, NetworkId, PersistMode, RegistryValue};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
