//! Chain and artifact seams
//!
//! The engine never signs, sends or compiles anything itself. It talks to:
//! - [`ArtifactStore`]: resolves local builds and imports deployed ones
//! - [`ChainClient`]: submits deployments and transactions, waits for them
//!
//! Both are async traits so real backends can suspend on network I/O.

use migra_registry::{Address, NetworkId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Constructor or call argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    /// Contract or account address
    Address(Address),
    /// Unsigned integer
    Uint(u128),
    /// Boolean flag
    Bool(bool),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Homogeneous list
    List(Vec<ArgValue>),
}

impl From<Address> for ArgValue {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

impl From<&Address> for ArgValue {
    fn from(value: &Address) -> Self {
        Self::Address(value.clone())
    }
}

impl From<u128> for ArgValue {
    fn from(value: u128) -> Self {
        Self::Uint(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(a) => write!(f, "{a}"),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Typed constructor arguments for one contract kind
///
/// Each contract kind gets its own argument struct so call sites cannot
/// pass the wrong shape.
pub trait ConstructorArgs {
    /// Encode into positional argument values
    fn encode(&self) -> Vec<ArgValue>;
}

impl ConstructorArgs for () {
    fn encode(&self) -> Vec<ArgValue> {
        Vec::new()
    }
}

/// `amount * 10^decimals`, saturating on overflow
#[must_use]
pub fn scaled(amount: u128, decimals: u32) -> u128 {
    10u128
        .checked_pow(decimals)
        .and_then(|unit| amount.checked_mul(unit))
        .unwrap_or(u128::MAX)
}

/// Where a build came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOrigin {
    /// Compiled from local sources
    Local,
    /// Imported from a deployed contract on another network
    Imported {
        /// Source address
        address: Address,
        /// Source network
        network: NetworkId,
    },
}

/// Deployable build output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    /// Contract name the build exposes
    pub contract_name: String,
    /// Where the build came from
    pub origin: BuildOrigin,
    /// Creation bytecode
    pub bytecode: Vec<u8>,
}

impl BuildDescriptor {
    /// Local build
    #[must_use]
    pub fn local(contract_name: impl Into<String>, bytecode: Vec<u8>) -> Self {
        Self {
            contract_name: contract_name.into(),
            origin: BuildOrigin::Local,
            bytecode,
        }
    }

    /// Build imported from `address` on `network`
    #[must_use]
    pub fn imported(
        contract_name: impl Into<String>,
        address: Address,
        network: NetworkId,
        bytecode: Vec<u8>,
    ) -> Self {
        Self {
            contract_name: contract_name.into(),
            origin: BuildOrigin::Imported { address, network },
            bytecode,
        }
    }
}

/// Transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Submitted, unconfirmed deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeployment {
    /// Contract name being deployed
    pub contract_name: String,
    /// Creation transaction
    pub tx_hash: TxHash,
}

/// Submitted, unconfirmed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    /// Transaction hash
    pub tx_hash: TxHash,
}

/// Inclusion receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block the transaction was mined in
    pub block_number: u64,
}

/// Handle to a live contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    /// Interface (contract name) the handle is bound to
    pub name: String,
    /// On-chain address
    pub address: Address,
    /// True when returned from the alias fast path
    #[serde(default)]
    pub reused: bool,
}

impl DeployedContract {
    /// Freshly confirmed contract
    #[must_use]
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            reused: false,
        }
    }

    /// Handle to an already-deployed contract found through its alias
    #[must_use]
    pub fn reused(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            reused: true,
        }
    }

    /// Same interface at another address (e.g. an implementation behind a proxy)
    #[must_use]
    pub fn attach(&self, address: Address) -> Self {
        Self::new(self.name.clone(), address)
    }

    /// Start a call against this contract
    #[must_use]
    pub fn call(&self, method: impl Into<String>) -> ContractCall {
        ContractCall::new(self.address.clone(), method)
    }
}

/// State-changing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    /// Target contract
    pub to: Address,
    /// Method name
    pub method: String,
    /// Positional arguments
    pub args: Vec<ArgValue>,
    /// Native value attached, in base units
    pub value: u128,
}

impl ContractCall {
    /// Call with no arguments
    #[must_use]
    pub fn new(to: Address, method: impl Into<String>) -> Self {
        Self {
            to,
            method: method.into(),
            args: Vec::new(),
            value: 0,
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Attach native value
    #[must_use]
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }
}

/// Chain-side failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Node refused the transaction before inclusion
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Transaction was mined but reverted
    #[error("transaction {tx} reverted: {reason}")]
    Reverted { tx: TxHash, reason: String },

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Initializer precondition not met (e.g. missing dependency)
    #[error("precondition failed: {0}")]
    Precondition(String),
}

impl ChainError {
    /// Check if resubmitting may succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rejected(_))
    }
}

/// Artifact lookup failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    /// No contract or build found
    #[error("no artifact for {0}")]
    NotFound(String),

    /// Build exists but cannot be deployed here
    #[error("incompatible artifact: {0}")]
    Incompatible(String),

    /// Source network unreachable
    #[error("transport error: {0}")]
    Transport(String),
}

/// Resolves builds
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Import the build of the contract deployed at `address` on `network`
    async fn import(
        &self,
        address: &Address,
        network: &NetworkId,
    ) -> Result<BuildDescriptor, ArtifactError>;

    /// Resolve a named local build
    async fn resolve(&self, name: &str) -> Result<BuildDescriptor, ArtifactError>;
}

/// Submits and confirms transactions on the target network
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Network this client is connected to
    fn network(&self) -> &NetworkId;

    /// Account signing transactions
    fn signer(&self) -> Address;

    /// Submit a deployment
    async fn deploy(
        &self,
        build: &BuildDescriptor,
        args: &[ArgValue],
    ) -> Result<PendingDeployment, ChainError>;

    /// Wait until a deployment is mined and its address assigned
    async fn wait_for_deployment(
        &self,
        pending: PendingDeployment,
    ) -> Result<DeployedContract, ChainError>;

    /// Submit a call
    async fn send(&self, call: ContractCall) -> Result<PendingTx, ChainError>;

    /// Wait until a transaction is mined
    async fn wait(&self, tx: PendingTx) -> Result<Receipt, ChainError>;
}

/// Submit `call` and wait for its receipt
///
/// # Errors
/// Returns the first chain error from submission or confirmation.
pub async fn send_and_wait(chain: &dyn ChainClient, call: ContractCall) -> Result<Receipt, ChainError> {
    tracing::debug!(to = %call.to, method = %call.method, "sending transaction");
    let pending = chain.send(call).await?;
    chain.wait(pending).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_amounts() {
        assert_eq!(scaled(10_000, 6), 10_000_000_000);
        assert_eq!(scaled(1_000, 8), 100_000_000_000);
        assert_eq!(scaled(1, 16), 10_000_000_000_000_000);
        assert_eq!(scaled(u128::MAX, 1), u128::MAX);
    }

    #[test]
    fn call_builder() {
        let token = DeployedContract::new("WAVAX", Address::from_bytes([1; 20]));
        let call = token.call("deposit").with_value(scaled(1, 16));

        assert_eq!(call.to, token.address);
        assert_eq!(call.method, "deposit");
        assert!(call.args.is_empty());
        assert_eq!(call.value, 10_000_000_000_000_000);
    }

    #[test]
    fn attach_keeps_interface() {
        let implementation = DeployedContract::reused("FiatTokenV2", Address::from_bytes([1; 20]));
        let proxied = implementation.attach(Address::from_bytes([2; 20]));

        assert_eq!(proxied.name, "FiatTokenV2");
        assert_eq!(proxied.address, Address::from_bytes([2; 20]));
        assert!(!proxied.reused);
    }

    #[test]
    fn arg_display() {
        let args = ArgValue::List(vec![ArgValue::Uint(6), ArgValue::from("USDC"), ArgValue::Bytes(vec![0xab])]);
        assert_eq!(args.to_string(), "[6, \"USDC\", 0xab]");
    }

    #[test]
    fn transient_errors() {
        assert!(ChainError::Transport("timeout".to_string()).is_transient());
        assert!(!ChainError::Reverted {
            tx: TxHash("0x01".to_string()),
            reason: "paused".to_string()
        }
        .is_transient());
    }
}
