//! Error types for migrations
//!
//! Every failure aborts the current run and carries enough context (target,
//! phase, stage, cause) to diagnose and retry. Nothing is retried here;
//! retries rely on alias memoization to skip finished work.

use crate::chain::{ArtifactError, ChainError};
use crate::state::MigrationState;
use migra_registry::{Address, RegistryError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Migration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Deploy and wire contracts
    Prepare,
    /// Publish roots
    Enact,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => f.write_str("prepare"),
            Self::Enact => f.write_str("enact"),
        }
    }
}

/// Step of a single clone/deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Creation transaction submission or confirmation
    Deploy,
    /// Post-deploy initializer
    Initialize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy => f.write_str("deploy"),
            Self::Initialize => f.write_str("initialize"),
        }
    }
}

/// Structural problems in a migration plan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Two targets share a role
    #[error("duplicate role '{0}'")]
    DuplicateRole(String),

    /// Dependency names no target in the plan
    #[error("'{role}' depends on unknown role '{dependency}'")]
    UnknownDependency { role: String, dependency: String },

    /// Target depends on itself
    #[error("'{0}' depends on itself")]
    SelfDependency(String),

    /// Dependency relation is cyclic
    #[error("dependency cycle through '{0}'")]
    Cycle(String),

    /// Dependency declared after its dependent
    #[error("'{role}' is declared before its dependency '{dependency}'")]
    OutOfOrder { role: String, dependency: String },
}

/// Main migration error type
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Import or build resolution failed
    #[error("{phase}: artifact for '{target}' unavailable: {source}")]
    ArtifactNotFound {
        target: String,
        phase: Phase,
        #[source]
        source: ArtifactError,
    },

    /// Chain rejected or reverted a deploy or initializer transaction
    #[error("{phase}: {stage} of '{target}' failed: {source}")]
    DeploymentFailed {
        target: String,
        phase: Phase,
        stage: Stage,
        /// Address of the contract if it was deployed before the failure
        address: Option<Address>,
        #[source]
        source: ChainError,
    },

    /// Alias already bound to a different address
    #[error("{phase}: alias '{alias}' for '{target}' is bound to {existing}, refusing {attempted}")]
    AliasConflict {
        target: String,
        phase: Phase,
        alias: String,
        existing: Address,
        attempted: Address,
    },

    /// Durable persistence failed
    #[error("{phase}: registry write failed: {source}")]
    RegistryWriteFailed {
        phase: Phase,
        #[source]
        source: RegistryError,
    },

    /// Phase invoked out of order
    #[error("cannot {attempted} migration '{migration}' while it is {state}")]
    PhaseOrder {
        migration: String,
        state: MigrationState,
        attempted: Phase,
    },

    /// Plan failed validation
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    /// Bundle lookup failed
    #[error("bundle has no contract for role '{0}'")]
    MissingContract(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Map a registry failure during `phase`
    #[must_use]
    pub fn registry(phase: Phase, source: RegistryError) -> Self {
        Self::RegistryWriteFailed { phase, source }
    }

    /// Phase the error occurred in, if it is tied to one
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::ArtifactNotFound { phase, .. }
            | Self::DeploymentFailed { phase, .. }
            | Self::AliasConflict { phase, .. }
            | Self::RegistryWriteFailed { phase, .. } => Some(*phase),
            Self::PhaseOrder { attempted, .. } => Some(*attempted),
            Self::InvalidPlan(_) | Self::MissingContract(_) | Self::Config(_) => None,
        }
    }

    /// Target the error concerns, if any
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::ArtifactNotFound { target, .. }
            | Self::DeploymentFailed { target, .. }
            | Self::AliasConflict { target, .. } => Some(target.as_str()),
            Self::MissingContract(role) => Some(role.as_str()),
            _ => None,
        }
    }

    /// Check if re-running the migration may succeed without code changes
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DeploymentFailed { source, .. } => source.is_transient(),
            Self::ArtifactNotFound { source, .. } => matches!(source, ArtifactError::Transport(_)),
            Self::RegistryWriteFailed { source, .. } => source.is_storage_failure(),
            _ => false,
        }
    }
}

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;
