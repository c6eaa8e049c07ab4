//! Target descriptors
//!
//! A [`TargetDescriptor`] names one contract to bring into existence on the
//! current network, either cloned from a deployed instance elsewhere or
//! built locally.

use crate::chain::{ArgValue, ConstructorArgs};
use migra_registry::{Address, NetworkId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a target's build comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    /// Import the build deployed at `address` on `network`
    Clone {
        /// Source address
        address: Address,
        /// Source network
        network: NetworkId,
    },
    /// Resolve a named local build
    Local {
        /// Build name (e.g. `vendor/proxy/ProxyAdmin.sol`)
        build: String,
    },
}

impl fmt::Display for TargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clone { address, network } => write!(f, "{address}@{network}"),
            Self::Local { build } => write!(f, "local:{build}"),
        }
    }
}

/// One contract to clone or deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Human-readable name used in logs and errors
    pub name: String,
    /// Build source
    pub source: TargetSource,
    /// Encoded constructor arguments
    pub constructor_args: Vec<ArgValue>,
    /// Alias to memoize the deployment under
    pub alias: Option<String>,
    /// Interface the returned handle is bound to; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

impl TargetDescriptor {
    /// Clone the contract at `address` on `network`
    #[must_use]
    pub fn clone_of(name: impl Into<String>, address: Address, network: NetworkId) -> Self {
        Self {
            name: name.into(),
            source: TargetSource::Clone { address, network },
            constructor_args: Vec::new(),
            alias: None,
            interface: None,
        }
    }

    /// Deploy a local build
    #[must_use]
    pub fn local(name: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: TargetSource::Local {
                build: build.into(),
            },
            constructor_args: Vec::new(),
            alias: None,
            interface: None,
        }
    }

    /// Set typed constructor arguments
    #[must_use]
    pub fn with_args<A: ConstructorArgs + ?Sized>(mut self, args: &A) -> Self {
        self.constructor_args = args.encode();
        self
    }

    /// Memoize under `alias`
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Memoize under the target's own name
    #[must_use]
    pub fn aliased(self) -> Self {
        let alias = self.name.clone();
        self.with_alias(alias)
    }

    /// Bind returned handles to `interface`
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Alias, if any
    #[inline]
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Interface handles for this target carry, fresh or reused
    #[inline]
    #[must_use]
    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or(&self.name)
    }
}
