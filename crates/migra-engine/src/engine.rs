//! Clone/deploy engine
//!
//! [`DeployEngine::clone_or_deploy`] either returns the contract already
//! bound to a target's alias, or imports, deploys, initializes and then
//! binds a fresh one. Both paths hand back a handle bound to the target's
//! interface.
//!
//! # Alias invariant
//!
//! An alias is bound only after the initializer succeeds, so an aliased
//! contract is always fully initialized. A failed initializer leaves the
//! contract deployed but unaliased; the next run deploys a fresh one.

use crate::bundle::ContractsBundle;
use crate::chain::{
    send_and_wait, ArtifactStore, BuildDescriptor, ChainClient, ChainError, ContractCall,
    DeployedContract, Receipt,
};
use crate::error::{MigrationError, Phase, Stage};
use crate::target::{TargetDescriptor, TargetSource};
use migra_registry::{Address, AliasRegistry, NetworkId, PersistMode, RegistryError};
use serde::Serialize;

/// Context handed to initializers
pub struct InitContext<'a> {
    chain: &'a dyn ChainClient,
    bundle: &'a ContractsBundle,
}

impl<'a> InitContext<'a> {
    /// Signing account
    #[inline]
    #[must_use]
    pub fn signer(&self) -> Address {
        self.chain.signer()
    }

    /// Chain client
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &'a dyn ChainClient {
        self.chain
    }

    /// Contracts deployed earlier in the run
    ///
    /// # Errors
    /// Returns [`ChainError::Precondition`] if `role` has not been deployed.
    pub fn contract(&self, role: &str) -> Result<&'a DeployedContract, ChainError> {
        self.bundle
            .get(role)
            .ok_or_else(|| ChainError::Precondition(format!("'{role}' not deployed yet")))
    }

    /// Send `call` and wait for it to be mined
    ///
    /// # Errors
    /// Returns the chain error if submission or confirmation fails.
    pub async fn transact(&self, call: ContractCall) -> Result<Receipt, ChainError> {
        send_and_wait(self.chain, call).await
    }
}

/// Post-deploy setup for a freshly deployed contract
///
/// Runs once per deployment, never on the alias fast path.
#[async_trait::async_trait]
pub trait Initializer: Send + Sync {
    /// Initialize `contract`
    async fn initialize(
        &self,
        contract: &DeployedContract,
        cx: &InitContext<'_>,
    ) -> Result<(), ChainError>;
}

/// Counters for one engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeployStats {
    /// Fresh deployments confirmed
    pub deployed: usize,
    /// Targets served from an alias
    pub reused: usize,
    /// Initializers that completed
    pub initialized: usize,
    /// Aliases bound or rebound
    pub aliases_bound: usize,
}

/// Clone/deploy engine for one phase of one run
pub struct DeployEngine<'a> {
    chain: &'a dyn ChainClient,
    artifacts: &'a dyn ArtifactStore,
    aliases: &'a AliasRegistry,
    phase: Phase,
    mode: PersistMode,
    force_redeploy: bool,
    stats: DeployStats,
}

impl<'a> DeployEngine<'a> {
    /// Create engine
    #[must_use]
    pub fn new(
        chain: &'a dyn ChainClient,
        artifacts: &'a dyn ArtifactStore,
        aliases: &'a AliasRegistry,
        phase: Phase,
        mode: PersistMode,
        force_redeploy: bool,
    ) -> Self {
        Self {
            chain,
            artifacts,
            aliases,
            phase,
            mode,
            force_redeploy,
            stats: DeployStats::default(),
        }
    }

    /// Network deployments land on
    #[inline]
    #[must_use]
    pub fn network(&self) -> &NetworkId {
        self.chain.network()
    }

    /// Chain client
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &'a dyn ChainClient {
        self.chain
    }

    /// Alias registry
    #[inline]
    #[must_use]
    pub fn aliases(&self) -> &'a AliasRegistry {
        self.aliases
    }

    /// Persistence mode for alias writes
    #[inline]
    #[must_use]
    pub fn mode(&self) -> PersistMode {
        self.mode
    }

    /// Phase this engine serves
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Counters so far
    #[inline]
    #[must_use]
    pub fn stats(&self) -> DeployStats {
        self.stats
    }

    /// Reuse the aliased contract, or import, deploy, initialize and alias a new one
    ///
    /// `bundle` holds contracts deployed earlier in the run; initializers
    /// read their dependencies from it.
    ///
    /// # Errors
    /// - [`MigrationError::ArtifactNotFound`] if the build cannot be resolved
    /// - [`MigrationError::DeploymentFailed`] if deploy or initializer fails
    /// - [`MigrationError::AliasConflict`] if the alias moved meanwhile
    /// - [`MigrationError::RegistryWriteFailed`] if a durable bind fails
    pub async fn clone_or_deploy(
        &mut self,
        target: &TargetDescriptor,
        initializer: Option<&dyn Initializer>,
        bundle: &ContractsBundle,
    ) -> Result<DeployedContract, MigrationError> {
        if let Some(existing) = self.lookup_alias(target) {
            tracing::info!(
                contract = %target.name,
                address = %existing.address,
                "skipping already existing contract"
            );
            self.stats.reused += 1;
            return Ok(existing);
        }

        let build = self.resolve_build(target).await?;

        tracing::info!(
            contract = %target.name,
            args = ?target.constructor_args,
            "deploying"
        );
        let mut contract = self.deploy_build(target, &build).await?;
        tracing::info!(contract = %target.name, address = %contract.address, "deployed");
        if contract.name != target.interface() {
            if target.interface.is_some() {
                tracing::warn!(
                    contract = %target.name,
                    interface = target.interface(),
                    build = %contract.name,
                    "build does not match declared interface"
                );
            }
            contract.name = target.interface().to_string();
        }
        self.stats.deployed += 1;

        if let Some(init) = initializer {
            let cx = InitContext {
                chain: self.chain,
                bundle,
            };
            if let Err(source) = init.initialize(&contract, &cx).await {
                tracing::warn!(
                    contract = %target.name,
                    address = %contract.address,
                    error = %source,
                    "initializer failed, contract left deployed without alias"
                );
                return Err(MigrationError::DeploymentFailed {
                    target: target.name.clone(),
                    phase: self.phase,
                    stage: Stage::Initialize,
                    address: Some(contract.address.clone()),
                    source,
                });
            }
            self.stats.initialized += 1;
        }

        if let Some(alias) = target.alias() {
            self.bind_alias(target, alias, &contract.address)?;
        }

        Ok(contract)
    }

    /// Deploy a local build without alias or initializer
    ///
    /// # Errors
    /// Same as [`Self::clone_or_deploy`].
    pub async fn deploy(
        &mut self,
        target: &TargetDescriptor,
        bundle: &ContractsBundle,
    ) -> Result<DeployedContract, MigrationError> {
        self.clone_or_deploy(target, None, bundle).await
    }

    fn lookup_alias(&self, target: &TargetDescriptor) -> Option<DeployedContract> {
        if self.force_redeploy {
            return None;
        }
        let alias = target.alias()?;
        self.aliases
            .get(alias)
            .map(|address| DeployedContract::reused(target.interface(), address))
    }

    async fn resolve_build(&self, target: &TargetDescriptor) -> Result<BuildDescriptor, MigrationError> {
        let resolved = match &target.source {
            TargetSource::Clone { address, network } => {
                tracing::info!(contract = %target.name, %address, %network, "importing");
                self.artifacts.import(address, network).await
            }
            TargetSource::Local { build } => {
                tracing::debug!(contract = %target.name, %build, "resolving local build");
                self.artifacts.resolve(build).await
            }
        };

        resolved.map_err(|source| MigrationError::ArtifactNotFound {
            target: target.name.clone(),
            phase: self.phase,
            source,
        })
    }

    async fn deploy_build(
        &self,
        target: &TargetDescriptor,
        build: &BuildDescriptor,
    ) -> Result<DeployedContract, MigrationError> {
        let failed = |source: ChainError| MigrationError::DeploymentFailed {
            target: target.name.clone(),
            phase: self.phase,
            stage: Stage::Deploy,
            address: None,
            source,
        };

        let pending = self
            .chain
            .deploy(build, &target.constructor_args)
            .await
            .map_err(failed)?;
        tracing::debug!(contract = %target.name, tx = %pending.tx_hash, "waiting for deployment");
        self.chain.wait_for_deployment(pending).await.map_err(failed)
    }

    fn bind_alias(
        &mut self,
        target: &TargetDescriptor,
        alias: &str,
        address: &Address,
    ) -> Result<(), MigrationError> {
        tracing::info!(
            contract = %target.name,
            %alias,
            %address,
            mode = %self.mode,
            "setting alias"
        );
        self.aliases
            .bind(alias, address.clone(), self.force_redeploy, self.mode)
            .map_err(|e| match e {
                RegistryError::AliasConflict {
                    alias,
                    existing,
                    attempted,
                } => MigrationError::AliasConflict {
                    target: target.name.clone(),
                    phase: self.phase,
                    alias,
                    existing,
                    attempted,
                },
                other => MigrationError::registry(self.phase, other),
            })?;
        self.stats.aliases_bound += 1;
        Ok(())
    }
}

impl std::fmt::Debug for DeployEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployEngine")
            .field("network", self.chain.network())
            .field("phase", &self.phase)
            .field("mode", &self.mode)
            .field("force_redeploy", &self.force_redeploy)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
