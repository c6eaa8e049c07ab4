//! In-memory chain and artifact store
//!
//! [`SimulatedChain`] implements both [`ChainClient`] and [`ArtifactStore`]
//! so migrations can run without a node. Addresses and transaction hashes
//! are derived from the network, signer and nonce, so identical runs yield
//! identical addresses.

use crate::chain::{
    ArgValue, ArtifactError, ArtifactStore, BuildDescriptor, BuildOrigin, ChainClient, ChainError,
    ContractCall, DeployedContract, PendingDeployment, PendingTx, Receipt, TxHash,
};
use indexmap::IndexMap;
use migra_registry::{Address, NetworkId};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Deployment submitted to the simulated chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// Contract name of the build
    pub contract_name: String,
    /// Assigned address
    pub address: Address,
    /// Constructor arguments
    pub args: Vec<ArgValue>,
    /// Build origin
    pub origin: BuildOrigin,
}

#[derive(Debug, Default)]
struct SimState {
    nonce: u64,
    block: u64,
    remotes: HashMap<(NetworkId, Address), String>,
    builds: HashMap<String, String>,
    contracts: IndexMap<Address, String>,
    pending_deploys: HashMap<TxHash, (String, Address)>,
    pending_txs: HashMap<TxHash, Option<String>>,
    deployments: Vec<DeploymentRecord>,
    transactions: Vec<ContractCall>,
    failing_deploys: HashSet<String>,
    failing_methods: HashSet<String>,
}

impl SimState {
    fn next_nonce(&mut self) -> u64 {
        let nonce = self.nonce;
        self.nonce += 1;
        nonce
    }

    fn mine(&mut self) -> u64 {
        self.block += 1;
        self.block
    }
}

/// Deterministic in-memory chain
#[derive(Debug)]
pub struct SimulatedChain {
    network: NetworkId,
    signer: Address,
    state: Mutex<SimState>,
}

impl SimulatedChain {
    /// Chain for `network` with a fixed default signer
    #[must_use]
    pub fn new(network: NetworkId) -> Self {
        Self {
            network,
            signer: Address::from_bytes([0x5e; Address::LEN]),
            state: Mutex::new(SimState::default()),
        }
    }

    /// With signing account
    #[must_use]
    pub fn with_signer(mut self, signer: Address) -> Self {
        self.signer = signer;
        self
    }

    /// With a contract deployed at `address` on another network
    #[must_use]
    pub fn with_remote(self, network: NetworkId, address: Address, contract_name: &str) -> Self {
        self.publish_remote(network, address, contract_name);
        self
    }

    /// With a local build
    #[must_use]
    pub fn with_build(self, build: &str, contract_name: &str) -> Self {
        self.register_build(build, contract_name);
        self
    }

    /// Make the contract at `address` on `network` importable
    pub fn publish_remote(&self, network: NetworkId, address: Address, contract_name: &str) {
        self.state
            .lock()
            .remotes
            .insert((network, address), contract_name.to_string());
    }

    /// Make `build` resolvable
    pub fn register_build(&self, build: &str, contract_name: &str) {
        self.state
            .lock()
            .builds
            .insert(build.to_string(), contract_name.to_string());
    }

    /// Reject deployments of `contract_name` until cleared
    pub fn fail_deploys_of(&self, contract_name: &str) {
        self.state.lock().failing_deploys.insert(contract_name.to_string());
    }

    /// Revert calls to `method` until cleared
    pub fn fail_calls_to(&self, method: &str) {
        self.state.lock().failing_methods.insert(method.to_string());
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing_deploys.clear();
        state.failing_methods.clear();
    }

    /// Number of deployments submitted
    #[must_use]
    pub fn deploy_count(&self) -> usize {
        self.state.lock().deployments.len()
    }

    /// Deployments submitted, in order
    #[must_use]
    pub fn deployments(&self) -> Vec<DeploymentRecord> {
        self.state.lock().deployments.clone()
    }

    /// Transactions submitted, in order
    #[must_use]
    pub fn transactions(&self) -> Vec<ContractCall> {
        self.state.lock().transactions.clone()
    }

    /// Transactions calling `method`
    #[must_use]
    pub fn calls_to(&self, method: &str) -> Vec<ContractCall> {
        self.state
            .lock()
            .transactions
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Contract name deployed at `address` on this chain
    #[must_use]
    pub fn contract_at(&self, address: &Address) -> Option<String> {
        self.state.lock().contracts.get(address).cloned()
    }

    fn derive(&self, domain: &str, nonce: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        hasher.update(self.network.as_str().as_bytes());
        hasher.update(self.signer.as_str().as_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.finalize().into()
    }

    fn contract_address(&self, nonce: u64) -> Address {
        let digest = self.derive("create", nonce);
        let mut bytes = [0u8; Address::LEN];
        bytes.copy_from_slice(&digest[32 - Address::LEN..]);
        Address::from_bytes(bytes)
    }

    fn tx_hash(&self, nonce: u64) -> TxHash {
        TxHash(format!("0x{}", hex::encode(self.derive("tx", nonce))))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for SimulatedChain {
    async fn import(
        &self,
        address: &Address,
        network: &NetworkId,
    ) -> Result<BuildDescriptor, ArtifactError> {
        let state = self.state.lock();
        let name = state
            .remotes
            .get(&(network.clone(), address.clone()))
            .ok_or_else(|| ArtifactError::NotFound(format!("{address} on {network}")))?;
        Ok(BuildDescriptor::imported(
            name.clone(),
            address.clone(),
            network.clone(),
            name.as_bytes().to_vec(),
        ))
    }

    async fn resolve(&self, name: &str) -> Result<BuildDescriptor, ArtifactError> {
        let state = self.state.lock();
        let contract_name = state
            .builds
            .get(name)
            .ok_or_else(|| ArtifactError::NotFound(format!("build {name}")))?;
        Ok(BuildDescriptor::local(
            contract_name.clone(),
            contract_name.as_bytes().to_vec(),
        ))
    }
}

#[async_trait::async_trait]
impl ChainClient for SimulatedChain {
    fn network(&self) -> &NetworkId {
        &self.network
    }

    fn signer(&self) -> Address {
        self.signer.clone()
    }

    async fn deploy(
        &self,
        build: &BuildDescriptor,
        args: &[ArgValue],
    ) -> Result<PendingDeployment, ChainError> {
        let mut state = self.state.lock();
        if state.failing_deploys.contains(&build.contract_name) {
            return Err(ChainError::Rejected(format!(
                "deployment of {} rejected",
                build.contract_name
            )));
        }

        let nonce = state.next_nonce();
        let address = self.contract_address(nonce);
        let tx_hash = self.tx_hash(nonce);
        state.deployments.push(DeploymentRecord {
            contract_name: build.contract_name.clone(),
            address: address.clone(),
            args: args.to_vec(),
            origin: build.origin.clone(),
        });
        state
            .pending_deploys
            .insert(tx_hash.clone(), (build.contract_name.clone(), address));
        tracing::debug!(contract = %build.contract_name, tx = %tx_hash, "simulated deployment submitted");

        Ok(PendingDeployment {
            contract_name: build.contract_name.clone(),
            tx_hash,
        })
    }

    async fn wait_for_deployment(
        &self,
        pending: PendingDeployment,
    ) -> Result<DeployedContract, ChainError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let (name, address) = state
            .pending_deploys
            .remove(&pending.tx_hash)
            .ok_or_else(|| ChainError::Precondition(format!("unknown deployment {}", pending.tx_hash)))?;
        state.mine();
        state.contracts.insert(address.clone(), name.clone());
        Ok(DeployedContract::new(name, address))
    }

    async fn send(&self, call: ContractCall) -> Result<PendingTx, ChainError> {
        let mut state = self.state.lock();
        if !state.contracts.contains_key(&call.to) {
            return Err(ChainError::Rejected(format!("no contract at {}", call.to)));
        }

        let nonce = state.next_nonce();
        let tx_hash = self.tx_hash(nonce);
        let revert = state
            .failing_methods
            .contains(&call.method)
            .then(|| format!("{} reverted", call.method));
        state.pending_txs.insert(tx_hash.clone(), revert);
        state.transactions.push(call);

        Ok(PendingTx { tx_hash })
    }

    async fn wait(&self, tx: PendingTx) -> Result<Receipt, ChainError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let revert = state
            .pending_txs
            .remove(&tx.tx_hash)
            .ok_or_else(|| ChainError::Precondition(format!("unknown transaction {}", tx.tx_hash)))?;
        let block_number = state.mine();
        match revert {
            Some(reason) => Err(ChainError::Reverted {
                tx: tx.tx_hash,
                reason,
            }),
            None => Ok(Receipt {
                tx_hash: tx.tx_hash,
                block_number,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::send_and_wait;

    fn fuji() -> NetworkId {
        NetworkId::new("fuji").unwrap()
    }

    #[tokio::test]
    async fn addresses_are_deterministic() {
        let a = SimulatedChain::new(fuji()).with_build("Comet.sol", "Comet");
        let b = SimulatedChain::new(fuji()).with_build("Comet.sol", "Comet");

        for chain in [&a, &b] {
            let build = chain.resolve("Comet.sol").await.unwrap();
            let pending = chain.deploy(&build, &[]).await.unwrap();
            chain.wait_for_deployment(pending).await.unwrap();
        }

        assert_eq!(a.deployments()[0].address, b.deployments()[0].address);
        assert_eq!(a.deploy_count(), 1);
    }

    #[tokio::test]
    async fn distinct_nonces_distinct_addresses() {
        let chain = SimulatedChain::new(fuji()).with_build("Comet.sol", "Comet");
        let build = chain.resolve("Comet.sol").await.unwrap();

        let first = chain.deploy(&build, &[]).await.unwrap();
        let second = chain.deploy(&build, &[]).await.unwrap();
        let first = chain.wait_for_deployment(first).await.unwrap();
        let second = chain.wait_for_deployment(second).await.unwrap();

        assert_ne!(first.address, second.address);
    }

    #[tokio::test]
    async fn import_requires_published_remote() {
        let avalanche = NetworkId::new("avalanche").unwrap();
        let usdc = Address::from_bytes([0xb9; 20]);
        let chain = SimulatedChain::new(fuji()).with_remote(avalanche.clone(), usdc.clone(), "FiatTokenProxy");

        let build = chain.import(&usdc, &avalanche).await.unwrap();
        assert_eq!(build.contract_name, "FiatTokenProxy");

        let err = chain.import(&usdc, &fuji()).await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[tokio::test]
    async fn send_rejects_unknown_contract() {
        let chain = SimulatedChain::new(fuji());
        let err = chain
            .send(ContractCall::new(Address::from_bytes([9; 20]), "mint"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));
    }

    #[tokio::test]
    async fn injected_failures() {
        let chain = SimulatedChain::new(fuji()).with_build("WAVAX.sol", "WAVAX");
        let build = chain.resolve("WAVAX.sol").await.unwrap();

        chain.fail_deploys_of("WAVAX");
        assert!(chain.deploy(&build, &[]).await.is_err());
        chain.clear_failures();

        let pending = chain.deploy(&build, &[]).await.unwrap();
        let wavax = chain.wait_for_deployment(pending).await.unwrap();

        chain.fail_calls_to("deposit");
        let err = send_and_wait(&chain, wavax.call("deposit")).await.unwrap_err();
        assert!(matches!(err, ChainError::Reverted { .. }));
        assert_eq!(chain.calls_to("deposit").len(), 1);
    }
}
