//! Testing utilities for the migra workspace
//!
//! Shared fixtures, test migrations, initializers and store doubles.

#![allow(missing_docs)]

use migra_engine::migrations::deploy_fuji;
use migra_engine::{
    ChainError, ContractsBundle, DeployedContract, InitContext, Initializer, Migration,
    MigrationConfig, MigrationContext, MigrationPlan, MigrationResult, MigrationRunner,
    SimulatedChain, TxHash,
};
use migra_registry::{
    Address, MemoryStore, NetworkId, RegistryError, RegistryResult, RegistryStore, Roots, Table,
    TableKind,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn fuji() -> NetworkId {
    NetworkId::new("fuji").unwrap()
}

pub fn avalanche() -> NetworkId {
    NetworkId::new("avalanche").unwrap()
}

pub fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; Address::LEN])
}

/// Empty simulated chain on fuji
pub fn sim_chain() -> Arc<SimulatedChain> {
    Arc::new(SimulatedChain::new(fuji()))
}

/// Simulated fuji chain seeded for `001_DeployFuji`
pub fn fuji_chain() -> Arc<SimulatedChain> {
    Arc::new(deploy_fuji::simulated_chain(fuji()).unwrap())
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn open_runner(
    config: MigrationConfig,
    store: Arc<dyn RegistryStore>,
    chain: &Arc<SimulatedChain>,
) -> MigrationRunner {
    MigrationRunner::open(config, store, chain.clone(), chain.clone()).unwrap()
}

/// Migration that executes a plan and publishes selected bundle roles as roots
pub struct PlanMigration {
    name: String,
    build: Box<dyn Fn() -> MigrationPlan + Send + Sync>,
    roots: Vec<(String, String)>,
}

impl PlanMigration {
    pub fn new<F>(name: &str, build: F) -> Self
    where
        F: Fn() -> MigrationPlan + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            build: Box::new(build),
            roots: Vec::new(),
        }
    }

    /// Publish the contract bundled as `role` under root `root`
    pub fn with_root(mut self, root: &str, role: &str) -> Self {
        self.roots.push((root.to_string(), role.to_string()));
        self
    }
}

#[async_trait::async_trait]
impl Migration for PlanMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn prepare(&self, cx: &mut MigrationContext<'_>) -> MigrationResult<ContractsBundle> {
        let plan = (self.build)();
        cx.execute(&plan).await
    }

    async fn enact(
        &self,
        _cx: &mut MigrationContext<'_>,
        bundle: &ContractsBundle,
    ) -> MigrationResult<Roots> {
        let mut roots = Roots::new();
        for (root, role) in &self.roots {
            roots.insert(root.clone(), bundle.address(role)?);
        }
        Ok(roots)
    }
}

/// Counts invocations and optionally sends one call to the contract
#[derive(Debug, Clone, Default)]
pub struct RecordingInitializer {
    calls: Arc<AtomicUsize>,
    method: Option<String>,
}

impl RecordingInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calling(method: &str) -> Self {
        Self {
            calls: Arc::default(),
            method: Some(method.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Initializer for RecordingInitializer {
    async fn initialize(
        &self,
        contract: &DeployedContract,
        cx: &InitContext<'_>,
    ) -> Result<(), ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(method) = &self.method {
            cx.transact(contract.call(method.as_str()).arg(&cx.signer())).await?;
        }
        Ok(())
    }
}

/// Always reverts
#[derive(Debug, Clone, Default)]
pub struct FailingInitializer;

#[async_trait::async_trait]
impl Initializer for FailingInitializer {
    async fn initialize(
        &self,
        _contract: &DeployedContract,
        _cx: &InitContext<'_>,
    ) -> Result<(), ChainError> {
        Err(ChainError::Reverted {
            tx: TxHash("0x00".to_string()),
            reason: "initializer reverted".to_string(),
        })
    }
}

/// Memory store whose saves can be switched off, globally or per table
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: AtomicBool,
    failing_tables: Mutex<HashSet<TableKind>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_saves_of(&self, kind: TableKind) {
        self.failing_tables.lock().insert(kind);
    }

    pub fn clear_failures(&self) {
        self.fail_saves(false);
        self.failing_tables.lock().clear();
    }

    pub fn snapshot(&self, network: &NetworkId, kind: TableKind) -> Table {
        self.inner.snapshot(network, kind)
    }
}

impl RegistryStore for FailingStore {
    fn load(&self, network: &NetworkId, kind: TableKind) -> RegistryResult<Table> {
        self.inner.load(network, kind)
    }

    fn save(&self, network: &NetworkId, kind: TableKind, table: &Table) -> RegistryResult<()> {
        if self.failing.load(Ordering::SeqCst) || self.failing_tables.lock().contains(&kind) {
            return Err(RegistryError::Unavailable(format!("{network}/{kind} is read-only")));
        }
        self.inner.save(network, kind, table)
    }
}
