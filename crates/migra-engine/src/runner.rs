//! Migration runner
//!
//! Owns the registries for one network and drives migrations through
//! `Pending -> Prepared -> Enacted`:
//!
//! - `prepare` runs with the configured prepare persistence (ephemeral by
//!   default) and may be repeated; aliased targets are reused.
//! - `enact` requires a successful `prepare`, runs durably, commits the
//!   returned roots as one batch, makes the aliases of the bundled contracts
//!   durable and then records the migration in the log.
//!
//! Any failure marks the migration `Failed`. Deployed contracts are never
//! undone; re-running relies on alias memoization to skip finished work.

use crate::bundle::ContractsBundle;
use crate::chain::{ArtifactStore, ChainClient};
use crate::config::MigrationConfig;
use crate::context::{MigrationContext, RunId};
use crate::engine::{DeployEngine, DeployStats};
use crate::error::{MigrationError, MigrationResult, Phase};
use crate::migration::Migration;
use crate::state::{validate_transition, MigrationState};
use migra_registry::{
    Address, AliasRegistry, EnactedAt, FileStore, MigrationLog, NetworkId, PersistMode,
    RegistryResult, RegistryStore, RootRegistry, Roots,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Result of a completed prepare + enact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Migration name
    pub migration: String,
    /// Runner invocation
    pub run_id: RunId,
    /// Contracts produced by `prepare`
    pub bundle: ContractsBundle,
    /// Roots committed by `enact`
    pub roots: Roots,
    /// Engine counters from `prepare`
    pub prepare_stats: DeployStats,
    /// Engine counters from `enact`
    pub enact_stats: DeployStats,
    /// Log timestamp
    pub enacted_at: EnactedAt,
}

/// Outcome of [`MigrationRunner::run`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Migration was prepared and enacted in this run
    Enacted(RunReport),
    /// Migration was already in the log; nothing ran
    AlreadyEnacted {
        /// Migration name
        migration: String,
        /// When it was enacted
        enacted_at: EnactedAt,
    },
}

impl RunOutcome {
    /// Check if the migration ran in this invocation
    #[inline]
    #[must_use]
    pub fn ran(&self) -> bool {
        matches!(self, Self::Enacted(_))
    }
}

/// Runs migrations against one network
pub struct MigrationRunner {
    config: MigrationConfig,
    run_id: RunId,
    chain: Arc<dyn ChainClient>,
    artifacts: Arc<dyn ArtifactStore>,
    aliases: AliasRegistry,
    roots: RootRegistry,
    log: MigrationLog,
    states: HashMap<String, MigrationState>,
    prepare_stats: DeployStats,
    enact_stats: DeployStats,
}

impl MigrationRunner {
    /// Open registries for the chain's network in `store`
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] if the configured network differs
    /// from the chain's, or a registry error if stored tables cannot be loaded.
    pub fn open(
        config: MigrationConfig,
        store: Arc<dyn RegistryStore>,
        chain: Arc<dyn ChainClient>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> MigrationResult<Self> {
        let network = chain.network().clone();
        if let Some(configured) = &config.network {
            if *configured != network {
                return Err(MigrationError::Config(format!(
                    "configured network '{configured}' but chain client is on '{network}'"
                )));
            }
        }

        let aliases = AliasRegistry::open(Arc::clone(&store), network.clone())
            .map_err(|e| MigrationError::registry(Phase::Prepare, e))?;
        let roots = RootRegistry::open(Arc::clone(&store), network.clone())
            .map_err(|e| MigrationError::registry(Phase::Prepare, e))?;
        let log = MigrationLog::open(store, network.clone())
            .map_err(|e| MigrationError::registry(Phase::Prepare, e))?;

        let run_id = RunId::new();
        tracing::info!(
            %network,
            %run_id,
            force_redeploy = config.force_redeploy,
            prepare_mode = %config.prepare_mode,
            aliases = aliases.len(),
            "migration runner opened"
        );

        Ok(Self {
            config,
            run_id,
            chain,
            artifacts,
            aliases,
            roots,
            log,
            states: HashMap::new(),
            prepare_stats: DeployStats::default(),
            enact_stats: DeployStats::default(),
        })
    }

    /// Open over a [`FileStore`] rooted at the configured store directory
    ///
    /// # Errors
    /// See [`Self::open`].
    pub fn open_file_store(
        config: MigrationConfig,
        chain: Arc<dyn ChainClient>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> MigrationResult<Self> {
        let store = Arc::new(FileStore::new(config.store_dir.clone()));
        Self::open(config, store, chain, artifacts)
    }

    /// Network this runner targets
    #[inline]
    #[must_use]
    pub fn network(&self) -> &NetworkId {
        self.chain.network()
    }

    /// Run id
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Alias registry
    #[inline]
    #[must_use]
    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    /// Root registry
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &RootRegistry {
        &self.roots
    }

    /// Migration log
    #[inline]
    #[must_use]
    pub fn log(&self) -> &MigrationLog {
        &self.log
    }

    /// Engine counters from the last `prepare`
    #[inline]
    #[must_use]
    pub fn prepare_stats(&self) -> DeployStats {
        self.prepare_stats
    }

    /// Engine counters from the last `enact`
    #[inline]
    #[must_use]
    pub fn enact_stats(&self) -> DeployStats {
        self.enact_stats
    }

    /// Lifecycle state of `migration`
    ///
    /// Migrations recorded in the log start out `Enacted`.
    #[must_use]
    pub fn state(&self, migration: &str) -> MigrationState {
        self.states.get(migration).copied().unwrap_or_else(|| {
            if self.log.is_enacted(migration) {
                MigrationState::Enacted
            } else {
                MigrationState::Pending
            }
        })
    }

    /// Check if `migration` is in the log
    #[inline]
    #[must_use]
    pub fn is_enacted(&self, migration: &str) -> bool {
        self.log.is_enacted(migration)
    }

    /// Run the prepare phase
    ///
    /// # Errors
    /// Returns [`MigrationError::PhaseOrder`] if the migration is enacted or
    /// failed, otherwise the first error from the migration.
    pub async fn prepare(&mut self, migration: &dyn Migration) -> MigrationResult<ContractsBundle> {
        let name = migration.name();
        self.check_transition(name, MigrationState::Prepared, Phase::Prepare)?;

        let mode = self.config.prepare_mode;
        tracing::info!(migration = %name, run_id = %self.run_id, %mode, "preparing migration");

        let (result, stats) = {
            let mut cx = self.context(name, Phase::Prepare, mode);
            let result = migration.prepare(&mut cx).await;
            (result, cx.stats())
        };
        self.prepare_stats = stats;

        match result {
            Ok(bundle) => {
                tracing::info!(
                    migration = %name,
                    contracts = bundle.len(),
                    deployed = stats.deployed,
                    reused = stats.reused,
                    "migration prepared"
                );
                self.set_state(name, MigrationState::Prepared);
                Ok(bundle)
            }
            Err(e) => Err(self.fail(name, e)),
        }
    }

    /// Run the enact phase and commit its roots
    ///
    /// # Errors
    /// Returns [`MigrationError::PhaseOrder`] without writing anything unless
    /// the migration is `Prepared`; otherwise the first error from the
    /// migration, the root commit, or the log write.
    pub async fn enact(
        &mut self,
        migration: &dyn Migration,
        bundle: &ContractsBundle,
    ) -> MigrationResult<(Roots, EnactedAt)> {
        let name = migration.name();
        self.check_transition(name, MigrationState::Enacted, Phase::Enact)?;

        tracing::info!(migration = %name, run_id = %self.run_id, "enacting migration");

        let (result, stats) = {
            let mut cx = self.context(name, Phase::Enact, PersistMode::Durable);
            let result = migration.enact(&mut cx, bundle).await;
            (result, cx.stats())
        };
        self.enact_stats = stats;

        let committed = result.and_then(|roots| {
            self.roots
                .commit(roots.clone())
                .map_err(|e| MigrationError::registry(Phase::Enact, e))?;
            self.persist_bundle_aliases(bundle)
                .map_err(|e| MigrationError::registry(Phase::Enact, e))?;
            let at = self
                .log
                .record(name)
                .map_err(|e| MigrationError::registry(Phase::Enact, e))?;
            Ok((roots, at))
        });

        match committed {
            Ok((roots, at)) => {
                tracing::info!(migration = %name, roots = roots.len(), enacted_at = %at, "migration enacted");
                self.set_state(name, MigrationState::Enacted);
                Ok((roots, at))
            }
            Err(e) => Err(self.fail(name, e)),
        }
    }

    /// Prepare then enact, unless the log already has the migration
    ///
    /// # Errors
    /// Returns the first error from either phase.
    pub async fn run(&mut self, migration: &dyn Migration) -> MigrationResult<RunOutcome> {
        let name = migration.name();
        if let Some(enacted_at) = self.log.enacted_at(name) {
            tracing::info!(migration = %name, %enacted_at, "skipping already enacted migration");
            return Ok(RunOutcome::AlreadyEnacted {
                migration: name.to_string(),
                enacted_at,
            });
        }

        let bundle = self.prepare(migration).await?;
        let (roots, enacted_at) = self.enact(migration, &bundle).await?;

        Ok(RunOutcome::Enacted(RunReport {
            migration: name.to_string(),
            run_id: self.run_id,
            bundle,
            roots,
            prepare_stats: self.prepare_stats,
            enact_stats: self.enact_stats,
            enacted_at,
        }))
    }

    /// Run every migration in order, stopping at the first failure
    ///
    /// # Errors
    /// Returns the first error; earlier migrations stay enacted.
    pub async fn run_pending(
        &mut self,
        migrations: &[&dyn Migration],
    ) -> MigrationResult<Vec<RunOutcome>> {
        let mut outcomes = Vec::with_capacity(migrations.len());
        for migration in migrations {
            outcomes.push(self.run(*migration).await?);
        }
        Ok(outcomes)
    }

    fn context<'a>(&'a self, name: &'a str, phase: Phase, mode: PersistMode) -> MigrationContext<'a> {
        let engine = DeployEngine::new(
            self.chain.as_ref(),
            self.artifacts.as_ref(),
            &self.aliases,
            phase,
            mode,
            self.config.force_redeploy,
        );
        MigrationContext::new(name, self.run_id, engine, &self.roots)
    }

    /// Make ephemeral aliases pointing at `bundle` contracts durable
    fn persist_bundle_aliases(&self, bundle: &ContractsBundle) -> RegistryResult<usize> {
        let deployed: HashSet<&Address> = bundle.iter().map(|(_, c)| &c.address).collect();
        let ephemeral = self.aliases.ephemeral();
        let promote: Vec<&str> = ephemeral
            .iter()
            .filter(|(_, address)| deployed.contains(address))
            .map(|(alias, _)| alias.as_str())
            .collect();
        let persisted = self.aliases.persist(promote)?;
        if persisted > 0 {
            tracing::info!(network = %self.network(), aliases = persisted, "prepare aliases made durable");
        }
        Ok(persisted)
    }

    fn check_transition(&self, name: &str, to: MigrationState, phase: Phase) -> MigrationResult<()> {
        let state = self.state(name);
        validate_transition(state, to).map_err(|_| MigrationError::PhaseOrder {
            migration: name.to_string(),
            state,
            attempted: phase,
        })
    }

    fn set_state(&mut self, name: &str, to: MigrationState) {
        let from = self.state(name);
        tracing::debug!(migration = %name, %from, %to, "state transition");
        self.states.insert(name.to_string(), to);
    }

    fn fail(&mut self, name: &str, error: MigrationError) -> MigrationError {
        tracing::error!(
            migration = %name,
            phase = ?error.phase(),
            contract = ?error.target(),
            retryable = error.is_retryable(),
            error = %error,
            "migration failed"
        );
        self.set_state(name, MigrationState::Failed);
        error
    }
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("network", self.chain.network())
            .field("run_id", &self.run_id)
            .field("config", &self.config)
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}
