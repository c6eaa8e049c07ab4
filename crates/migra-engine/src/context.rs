//! Per-phase migration context
//!
//! A [`MigrationContext`] is what a migration's `prepare` and `enact` see:
//! the deploy engine bound to the phase's persistence mode, a read-only view
//! of the committed roots, and identifiers for logging.

use crate::bundle::ContractsBundle;
use crate::chain::{ChainClient, ConstructorArgs, DeployedContract};
use crate::engine::{DeployEngine, DeployStats, Initializer};
use crate::error::{MigrationResult, Phase};
use crate::plan::MigrationPlan;
use crate::target::TargetDescriptor;
use migra_registry::{Address, AliasRegistry, NetworkId, PersistMode, RootRegistry, Roots};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of one runner invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context for one phase of one migration
pub struct MigrationContext<'a> {
    migration: &'a str,
    run_id: RunId,
    engine: DeployEngine<'a>,
    roots: &'a RootRegistry,
}

impl<'a> MigrationContext<'a> {
    /// Create context
    #[must_use]
    pub fn new(
        migration: &'a str,
        run_id: RunId,
        engine: DeployEngine<'a>,
        roots: &'a RootRegistry,
    ) -> Self {
        Self {
            migration,
            run_id,
            engine,
            roots,
        }
    }

    /// Migration name
    #[inline]
    #[must_use]
    pub fn migration(&self) -> &str {
        self.migration
    }

    /// Run id
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    /// Persistence mode for alias writes in this phase
    #[inline]
    #[must_use]
    pub fn mode(&self) -> PersistMode {
        self.engine.mode()
    }

    /// Target network
    #[inline]
    #[must_use]
    pub fn network(&self) -> &NetworkId {
        self.engine.network()
    }

    /// Signing account
    #[inline]
    #[must_use]
    pub fn signer(&self) -> Address {
        self.engine.chain().signer()
    }

    /// Chain client
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &'a dyn ChainClient {
        self.engine.chain()
    }

    /// Alias registry
    #[inline]
    #[must_use]
    pub fn aliases(&self) -> &'a AliasRegistry {
        self.engine.aliases()
    }

    /// Address currently committed under root `role`
    #[inline]
    #[must_use]
    pub fn root(&self, role: &str) -> Option<Address> {
        self.roots.get(role)
    }

    /// Snapshot of the committed roots
    ///
    /// Migrations only read roots; the runner commits what `enact` returns.
    #[inline]
    #[must_use]
    pub fn roots(&self) -> Roots {
        self.roots.entries()
    }

    /// Engine counters for this phase
    #[inline]
    #[must_use]
    pub fn stats(&self) -> DeployStats {
        self.engine.stats()
    }

    /// Clone or deploy a single target
    ///
    /// # Errors
    /// See [`DeployEngine::clone_or_deploy`].
    pub async fn clone_or_deploy(
        &mut self,
        target: &TargetDescriptor,
        initializer: Option<&dyn Initializer>,
        bundle: &ContractsBundle,
    ) -> MigrationResult<DeployedContract> {
        self.engine.clone_or_deploy(target, initializer, bundle).await
    }

    /// Deploy a local build with typed constructor arguments
    ///
    /// # Errors
    /// See [`DeployEngine::clone_or_deploy`].
    pub async fn deploy<A>(
        &mut self,
        name: &str,
        build: &str,
        args: &A,
        bundle: &ContractsBundle,
    ) -> MigrationResult<DeployedContract>
    where
        A: ConstructorArgs + Sync + ?Sized,
    {
        let target = TargetDescriptor::local(name, build).with_args(args);
        self.engine.deploy(&target, bundle).await
    }

    /// Execute `plan` in declared order
    ///
    /// The plan is validated before anything is deployed. Each target's
    /// descriptor is built from the contracts deployed before it.
    ///
    /// # Errors
    /// Returns [`crate::MigrationError::InvalidPlan`] for a malformed plan,
    /// or the first clone/deploy failure.
    pub async fn execute(&mut self, plan: &MigrationPlan) -> MigrationResult<ContractsBundle> {
        plan.validate()?;
        tracing::debug!(
            migration = %self.migration,
            targets = plan.len(),
            "executing plan"
        );

        let mut bundle = ContractsBundle::new();
        for planned in plan.targets() {
            let target = planned.descriptor(&bundle)?;
            let contract = self
                .engine
                .clone_or_deploy(&target, planned.initializer(), &bundle)
                .await?;
            bundle.insert(planned.role(), contract);
        }
        Ok(bundle)
    }
}

impl fmt::Debug for MigrationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationContext")
            .field("migration", &self.migration)
            .field("run_id", &self.run_id)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
