//! Migra Engine
//!
//! Two-phase, idempotent deployment migrations.
//!
//! # Overview
//!
//! A [`Migration`] has a `prepare` phase that clones or deploys contracts
//! and returns a [`ContractsBundle`], and an `enact` phase that derives the
//! canonical [`Roots`](migra_registry::Roots) from that bundle. The
//! [`MigrationRunner`] drives both phases, commits the roots in one batch
//! and records the migration as enacted.
//!
//! Deployments are memoized through aliases: a target whose alias is
//! already bound is reused instead of redeployed, unless force-redeploy is
//! on. Aliases are bound only after a target's initializer succeeds.
//!
//! # Modules
//!
//! - [`engine`]: clone/deploy engine
//! - [`plan`]: ordered targets with validated dependencies
//! - [`runner`]: phase ordering, root commit, migration log
//! - [`chain`]: chain client and artifact store seams
//! - [`sim`]: in-memory chain for tests and dry runs
//!
//! # Example
//!
//! ```rust,no_run
//! use migra_engine::migrations::deploy_fuji::{self, DeployFuji};
//! use migra_engine::{MigrationConfig, MigrationRunner};
//! use migra_registry::{MemoryStore, NetworkId};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = Arc::new(deploy_fuji::simulated_chain(NetworkId::new("fuji")?)?);
//! let mut runner = MigrationRunner::open(
//!     MigrationConfig::new(),
//!     Arc::new(MemoryStore::new()),
//!     chain.clone(),
//!     chain,
//! )?;
//!
//! let outcome = runner.run(&DeployFuji).await?;
//! assert!(outcome.ran());
//! assert!(runner.roots().has("comet"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bundle;
pub mod chain;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod migration;
pub mod migrations;
pub mod plan;
pub mod runner;
pub mod sim;
pub mod state;
pub mod target;

// Re-exports
pub use bundle::ContractsBundle;
pub use chain::{
    scaled, ArgValue, ArtifactError, ArtifactStore, BuildDescriptor, BuildOrigin, ChainClient,
    ChainError, ConstructorArgs, ContractCall, DeployedContract, PendingDeployment, PendingTx,
    Receipt, TxHash,
};
pub use config::MigrationConfig;
pub use context::{MigrationContext, RunId};
pub use engine::{DeployEngine, DeployStats, InitContext, Initializer};
pub use error::{MigrationError, MigrationResult, Phase, PlanError, Stage};
pub use migration::Migration;
pub use plan::{MigrationPlan, PlannedTarget};
pub use runner::{MigrationRunner, RunOutcome, RunReport};
pub use sim::{DeploymentRecord, SimulatedChain};
pub use state::MigrationState;
pub use target::{TargetDescriptor, TargetSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
