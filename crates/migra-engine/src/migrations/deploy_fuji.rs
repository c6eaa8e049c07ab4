//! Initial Fuji deployment
//!
//! Clones the Avalanche USDC, WBTC.e and WAVAX token contracts onto the
//! target network, funds the signer with each, then bootstraps the Comet
//! protocol against them. `enact` publishes the protocol proxy as the
//! `comet` root. This only makes sense for an initial deployment or a reset.

use crate::bundle::ContractsBundle;
use crate::chain::{scaled, ArgValue, ChainError, ConstructorArgs, DeployedContract};
use crate::context::MigrationContext;
use crate::engine::{InitContext, Initializer};
use crate::error::{MigrationError, MigrationResult};
use crate::migration::Migration;
use crate::plan::{MigrationPlan, PlannedTarget};
use crate::sim::SimulatedChain;
use crate::target::TargetDescriptor;
use migra_registry::{Address, NetworkId, Roots};

/// Log name of this migration
pub const NAME: &str = "001_DeployFuji";

/// Network the token contracts are cloned from
pub const SOURCE_NETWORK: &str = "avalanche";

/// USDC implementation on the source network
pub const USDC_IMPLEMENTATION: &str = "0xa3fa3d254bf6af295b5b22cc6730b04144314890";
/// USDC proxy on the source network
pub const USDC_PROXY: &str = "0xb97ef9ef8734c71904d8002f8b6bc66dd9c48a6e";
/// WBTC.e on the source network
pub const WBTC: &str = "0x50b7545627a5162f82a992c33b87adc75187b218";
/// WAVAX on the source network
pub const WAVAX: &str = "0xb31f66aa3c1e785363f0875a1b74e27b85fd66c7";

/// Interface of the USDC implementation
pub const FIAT_TOKEN: &str = "FiatTokenV2_1";
/// Interface of the USDC proxy
pub const FIAT_TOKEN_PROXY: &str = "FiatTokenProxy";
/// Interface of WBTC.e
pub const BRIDGE_TOKEN: &str = "BridgeToken";
/// Interface of WAVAX
pub const WRAPPED_AVAX: &str = "WAVAX";

/// Local build of the proxy admin
pub const PROXY_ADMIN_BUILD: &str = "vendor/proxy/ProxyAdmin.sol";
/// Local build of the protocol implementation
pub const COMET_BUILD: &str = "Comet.sol";
/// Local build of the protocol proxy
pub const PROXY_BUILD: &str = "vendor/proxy/TransparentUpgradeableProxy.sol";

const USDC_DECIMALS: u32 = 6;
const WBTC_DECIMALS: u32 = 8;

/// `FiatTokenProxy(implementation)`
#[derive(Debug, Clone)]
pub struct FiatTokenProxyArgs {
    /// Initial implementation
    pub implementation: Address,
}

impl ConstructorArgs for FiatTokenProxyArgs {
    fn encode(&self) -> Vec<ArgValue> {
        vec![ArgValue::from(&self.implementation)]
    }
}

/// `Comet(governor, pauseGuardian, baseToken, assets)`
#[derive(Debug, Clone)]
pub struct CometArgs {
    /// Governor account
    pub governor: Address,
    /// Pause guardian account
    pub pause_guardian: Address,
    /// Base asset
    pub base_token: Address,
    /// Collateral assets
    pub assets: Vec<Address>,
}

impl ConstructorArgs for CometArgs {
    fn encode(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::from(&self.governor),
            ArgValue::from(&self.pause_guardian),
            ArgValue::from(&self.base_token),
            ArgValue::List(self.assets.iter().map(ArgValue::from).collect()),
        ]
    }
}

/// `TransparentUpgradeableProxy(logic, admin, data)`
#[derive(Debug, Clone)]
pub struct TransparentProxyArgs {
    /// Implementation
    pub logic: Address,
    /// Proxy admin
    pub admin: Address,
    /// Initialization calldata
    pub data: Vec<u8>,
}

impl ConstructorArgs for TransparentProxyArgs {
    fn encode(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::from(&self.logic),
            ArgValue::from(&self.admin),
            ArgValue::Bytes(self.data.clone()),
        ]
    }
}

/// Hands the proxy to the proxy admin, initializes the token and mints
/// 10,000 USDC to the signer
#[derive(Debug, Clone, Copy, Default)]
pub struct UsdcInit;

#[async_trait::async_trait]
impl Initializer for UsdcInit {
    async fn initialize(
        &self,
        proxy: &DeployedContract,
        cx: &InitContext<'_>,
    ) -> Result<(), ChainError> {
        let admin = cx.contract("ProxyAdmin")?;
        let implementation = cx.contract("USDCImplementation")?;
        let signer = cx.signer();

        cx.transact(proxy.call("changeAdmin").arg(&admin.address)).await?;

        let usdc = implementation.attach(proxy.address.clone());
        cx.transact(
            usdc.call("initialize")
                .arg("USD Coin")
                .arg("USDC")
                .arg("USD")
                .arg(u128::from(USDC_DECIMALS))
                .arg(&signer)
                .arg(&signer)
                .arg(&signer)
                .arg(&signer),
        )
        .await?;

        let amount = scaled(10_000, USDC_DECIMALS);
        cx.transact(usdc.call("configureMinter").arg(&signer).arg(amount)).await?;
        cx.transact(usdc.call("mint").arg(&signer).arg(amount)).await?;
        Ok(())
    }
}

/// Mints 1,000 WBTC.e to the signer
#[derive(Debug, Clone, Copy, Default)]
pub struct WbtcInit;

#[async_trait::async_trait]
impl Initializer for WbtcInit {
    async fn initialize(
        &self,
        wbtc: &DeployedContract,
        cx: &InitContext<'_>,
    ) -> Result<(), ChainError> {
        cx.transact(
            wbtc.call("mint")
                .arg(&cx.signer())
                .arg(scaled(1_000, WBTC_DECIMALS))
                .arg(Address::zero())
                .arg(0u128)
                .arg(ArgValue::Bytes(vec![0; 32])),
        )
        .await?;
        Ok(())
    }
}

/// Wraps 0.01 AVAX for the signer
#[derive(Debug, Clone, Copy, Default)]
pub struct WavaxInit;

#[async_trait::async_trait]
impl Initializer for WavaxInit {
    async fn initialize(
        &self,
        wavax: &DeployedContract,
        cx: &InitContext<'_>,
    ) -> Result<(), ChainError> {
        // 0.01 * 10^18
        cx.transact(wavax.call("deposit").with_value(scaled(1, 16))).await?;
        Ok(())
    }
}

/// The `001_DeployFuji` migration
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployFuji;

impl DeployFuji {
    /// Token deployment plan
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] if a source address is malformed.
    pub fn plan() -> MigrationResult<MigrationPlan> {
        let source = source_network()?;
        let usdc_proxy = remote(USDC_PROXY)?;
        let usdc_source = source.clone();

        Ok(MigrationPlan::new()
            .then(PlannedTarget::fixed(
                "ProxyAdmin",
                TargetDescriptor::local("ProxyAdmin", PROXY_ADMIN_BUILD),
            ))
            .then(PlannedTarget::fixed(
                "USDCImplementation",
                TargetDescriptor::clone_of("USDCImplementation", remote(USDC_IMPLEMENTATION)?, source.clone())
                    .with_interface(FIAT_TOKEN)
                    .aliased(),
            ))
            .then(
                PlannedTarget::derived("USDC", move |bundle| {
                    let args = FiatTokenProxyArgs {
                        implementation: bundle.address("USDCImplementation")?,
                    };
                    Ok(TargetDescriptor::clone_of("USDC", usdc_proxy.clone(), usdc_source.clone())
                        .with_args(&args)
                        .with_interface(FIAT_TOKEN_PROXY)
                        .aliased())
                })
                .after("ProxyAdmin")
                .after("USDCImplementation")
                .with_initializer(UsdcInit),
            )
            .then(
                PlannedTarget::fixed(
                    "WBTC.e",
                    TargetDescriptor::clone_of("WBTC.e", remote(WBTC)?, source.clone())
                        .with_interface(BRIDGE_TOKEN)
                        .aliased(),
                )
                .with_initializer(WbtcInit),
            )
            .then(
                PlannedTarget::fixed(
                    "WAVAX",
                    TargetDescriptor::clone_of("WAVAX", remote(WAVAX)?, source)
                        .with_interface(WRAPPED_AVAX)
                        .aliased(),
                )
                .with_initializer(WavaxInit),
            ))
    }
}

#[async_trait::async_trait]
impl Migration for DeployFuji {
    fn name(&self) -> &str {
        NAME
    }

    async fn prepare(&self, cx: &mut MigrationContext<'_>) -> MigrationResult<ContractsBundle> {
        let mut bundle = cx.execute(&Self::plan()?).await?;

        // Token calls go through the implementation interface at the proxy address
        let implementation = bundle.require("USDCImplementation")?.clone();
        let proxy = bundle.require("USDC")?.clone();
        let mut usdc = implementation.attach(proxy.address);
        usdc.reused = proxy.reused;
        bundle.insert("USDC", usdc);

        let protocol = deploy_network_comet(cx, &bundle).await?;
        bundle.extend(protocol.iter().map(|(role, c)| (role.to_string(), c.clone())));
        Ok(bundle)
    }

    async fn enact(
        &self,
        _cx: &mut MigrationContext<'_>,
        bundle: &ContractsBundle,
    ) -> MigrationResult<Roots> {
        tracing::info!("enacting by changing root");
        let mut roots = Roots::new();
        roots.insert("comet".to_string(), bundle.address("proxy")?);
        Ok(roots)
    }
}

/// Deploy the protocol against the tokens in `tokens`
///
/// Returns a bundle with the `comet` implementation and its `proxy`.
///
/// # Errors
/// Returns [`MigrationError::MissingContract`] if a token is missing, or the
/// first deploy failure.
pub async fn deploy_network_comet(
    cx: &mut MigrationContext<'_>,
    tokens: &ContractsBundle,
) -> MigrationResult<ContractsBundle> {
    let signer = cx.signer();
    let args = CometArgs {
        governor: signer.clone(),
        pause_guardian: signer,
        base_token: tokens.address("USDC")?,
        assets: vec![tokens.address("WBTC.e")?, tokens.address("WAVAX")?],
    };
    let comet = cx.deploy("Comet", COMET_BUILD, &args, tokens).await?;

    let proxy_args = TransparentProxyArgs {
        logic: comet.address.clone(),
        admin: tokens.address("ProxyAdmin")?,
        data: Vec::new(),
    };
    let proxy = cx
        .deploy("TransparentUpgradeableProxy", PROXY_BUILD, &proxy_args, tokens)
        .await?;

    let mut protocol = ContractsBundle::new();
    protocol.insert("comet", comet);
    protocol.insert("proxy", proxy);
    Ok(protocol)
}

/// Simulated chain on `network` that can run [`DeployFuji`]
///
/// # Errors
/// Returns [`MigrationError::Config`] if a source address is malformed.
pub fn simulated_chain(network: NetworkId) -> MigrationResult<SimulatedChain> {
    let source = source_network()?;
    Ok(SimulatedChain::new(network)
        .with_build(PROXY_ADMIN_BUILD, "ProxyAdmin")
        .with_build(COMET_BUILD, "Comet")
        .with_build(PROXY_BUILD, "TransparentUpgradeableProxy")
        .with_remote(source.clone(), remote(USDC_IMPLEMENTATION)?, FIAT_TOKEN)
        .with_remote(source.clone(), remote(USDC_PROXY)?, FIAT_TOKEN_PROXY)
        .with_remote(source.clone(), remote(WBTC)?, BRIDGE_TOKEN)
        .with_remote(source, remote(WAVAX)?, WRAPPED_AVAX))
}

fn remote(address: &str) -> MigrationResult<Address> {
    address
        .parse::<Address>()
        .map_err(|e| MigrationError::Config(e.to_string()))
}

fn source_network() -> MigrationResult<NetworkId> {
    NetworkId::new(SOURCE_NETWORK).map_err(|e| MigrationError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_is_valid() {
        let plan = DeployFuji::plan().unwrap();
        assert!(plan.validate().is_ok());
        assert_eq!(
            plan.targets().iter().map(PlannedTarget::role).collect::<Vec<_>>(),
            vec!["ProxyAdmin", "USDCImplementation", "USDC", "WBTC.e", "WAVAX"]
        );
    }

    #[test]
    fn only_clones_are_aliased() {
        let plan = DeployFuji::plan().unwrap();
        let mut bundle = ContractsBundle::new();
        bundle.insert(
            "USDCImplementation",
            DeployedContract::new("FiatTokenV2_1", Address::from_bytes([1; 20])),
        );

        let aliases: Vec<Option<String>> = plan
            .targets()
            .iter()
            .map(|t| t.descriptor(&bundle).unwrap().alias)
            .collect();
        assert_eq!(aliases[0], None);
        assert!(aliases[1..].iter().all(Option::is_some));
    }

    #[test]
    fn clones_declare_their_source_interface() {
        let plan = DeployFuji::plan().unwrap();
        let mut bundle = ContractsBundle::new();
        bundle.insert(
            "USDCImplementation",
            DeployedContract::new(FIAT_TOKEN, Address::from_bytes([1; 20])),
        );

        let interfaces: Vec<String> = plan
            .targets()
            .iter()
            .map(|t| t.descriptor(&bundle).unwrap().interface().to_string())
            .collect();
        assert_eq!(
            interfaces,
            vec!["ProxyAdmin", FIAT_TOKEN, FIAT_TOKEN_PROXY, BRIDGE_TOKEN, WRAPPED_AVAX]
        );
    }

    #[test]
    fn comet_args_encode_assets_as_list() {
        let args = CometArgs {
            governor: Address::from_bytes([1; 20]),
            pause_guardian: Address::from_bytes([1; 20]),
            base_token: Address::from_bytes([2; 20]),
            assets: vec![Address::from_bytes([3; 20]), Address::from_bytes([4; 20])],
        };
        let encoded = args.encode();
        assert_eq!(encoded.len(), 4);
        assert!(matches!(&encoded[3], ArgValue::List(items) if items.len() == 2));
    }
}
