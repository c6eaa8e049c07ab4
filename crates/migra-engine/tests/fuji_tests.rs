use migra_engine::migrations::deploy_fuji::{self, DeployFuji};
use migra_engine::{
    scaled, ArgValue, Migration, MigrationConfig, MigrationRunner, MigrationState, RunOutcome,
};
use migra_registry::{AliasRegistry, FileStore, RootRegistry};
use migra_test_utils::{fuji, fuji_chain, memory_store, open_runner};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn fresh_deployment() {
    let chain = fuji_chain();
    let mut runner = open_runner(MigrationConfig::new(), memory_store(), &chain);

    let outcome = runner.run(&DeployFuji).await.unwrap();
    let RunOutcome::Enacted(report) = outcome else {
        panic!("expected a fresh run");
    };

    let deployed: Vec<String> = chain.deployments().into_iter().map(|d| d.contract_name).collect();
    assert_eq!(
        deployed,
        vec![
            "ProxyAdmin",
            "FiatTokenV2_1",
            "FiatTokenProxy",
            "BridgeToken",
            "WAVAX",
            "Comet",
            "TransparentUpgradeableProxy",
        ]
    );

    let methods: Vec<String> = chain.transactions().into_iter().map(|c| c.method).collect();
    assert_eq!(
        methods,
        vec!["changeAdmin", "initialize", "configureMinter", "mint", "mint", "deposit"]
    );

    assert_eq!(
        report.bundle.roles().collect::<Vec<_>>(),
        vec!["ProxyAdmin", "USDCImplementation", "USDC", "WBTC.e", "WAVAX", "comet", "proxy"]
    );
    let proxy = report.bundle.address("proxy").unwrap();
    assert_eq!(report.roots.get("comet"), Some(&proxy));
    assert_eq!(runner.roots().get("comet"), Some(proxy));
    assert_eq!(runner.state(DeployFuji.name()), MigrationState::Enacted);
    assert_eq!(report.prepare_stats.deployed, 7);
    assert_eq!(report.prepare_stats.initialized, 3);
    assert_eq!(report.prepare_stats.aliases_bound, 4);
}

#[tokio::test]
async fn usdc_is_addressed_through_its_implementation() {
    let chain = fuji_chain();
    let mut runner = open_runner(MigrationConfig::new(), memory_store(), &chain);
    let bundle = runner.prepare(&DeployFuji).await.unwrap();

    let usdc = bundle.require("USDC").unwrap();
    assert_eq!(usdc.name, "FiatTokenV2_1");
    assert_eq!(runner.aliases().get("USDC"), Some(usdc.address.clone()));

    let change_admin = chain.transactions()[0].args.clone();
    assert_eq!(change_admin, vec![ArgValue::from(bundle.address("ProxyAdmin").unwrap())]);

    let mint = &chain.calls_to("mint")[0];
    assert_eq!(mint.to, usdc.address);
    assert_eq!(mint.args[1], ArgValue::Uint(scaled(10_000, 6)));

    let deposit = &chain.calls_to("deposit")[0];
    assert_eq!(deposit.value, 10_000_000_000_000_000);
    assert_eq!(deposit.to, bundle.address("WAVAX").unwrap());
}

#[tokio::test]
async fn comet_references_the_tokens() {
    let chain = fuji_chain();
    let mut runner = open_runner(MigrationConfig::new(), memory_store(), &chain);
    let bundle = runner.prepare(&DeployFuji).await.unwrap();

    let comet = chain
        .deployments()
        .into_iter()
        .find(|d| d.contract_name == "Comet")
        .unwrap();
    assert_eq!(comet.args[2], ArgValue::from(bundle.address("USDC").unwrap()));
    assert_eq!(
        comet.args[3],
        ArgValue::List(vec![
            ArgValue::from(bundle.address("WBTC.e").unwrap()),
            ArgValue::from(bundle.address("WAVAX").unwrap()),
        ])
    );

    let proxy = chain
        .deployments()
        .into_iter()
        .find(|d| d.contract_name == "TransparentUpgradeableProxy")
        .unwrap();
    assert_eq!(proxy.args[0], ArgValue::from(bundle.address("comet").unwrap()));
}

#[tokio::test]
async fn reprepare_only_redeploys_unaliased_contracts() {
    let chain = fuji_chain();
    let mut runner = open_runner(MigrationConfig::new(), memory_store(), &chain);

    let first = runner.prepare(&DeployFuji).await.unwrap();
    let transactions = chain.transactions().len();
    let second = runner.prepare(&DeployFuji).await.unwrap();

    let redeployed: Vec<String> = chain.deployments()[7..]
        .iter()
        .map(|d| d.contract_name.clone())
        .collect();
    assert_eq!(redeployed, vec!["ProxyAdmin", "Comet", "TransparentUpgradeableProxy"]);
    assert_eq!(chain.transactions().len(), transactions);

    for role in ["USDCImplementation", "USDC", "WBTC.e", "WAVAX"] {
        let (before, after) = (first.require(role).unwrap(), second.require(role).unwrap());
        assert_eq!(before.address, after.address, "{role}");
        assert_eq!(before.name, after.name, "{role}");
        assert!(after.reused, "{role}");
    }
    assert_eq!(second.require("USDC").unwrap().name, "FiatTokenV2_1");
    assert_eq!(second.require("WBTC.e").unwrap().name, "BridgeToken");
}

#[tokio::test]
async fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let chain = fuji_chain();
    let config = MigrationConfig::new().with_store_dir(dir.path());

    let proxy = {
        let mut runner =
            MigrationRunner::open_file_store(config.clone(), chain.clone(), chain.clone()).unwrap();
        let RunOutcome::Enacted(report) = runner.run(&DeployFuji).await.unwrap() else {
            panic!("expected a fresh run");
        };
        report.bundle.address("proxy").unwrap()
    };

    let store = Arc::new(FileStore::new(dir.path()));
    assert_eq!(RootRegistry::open(store.clone(), fuji()).unwrap().get("comet"), Some(proxy));
    // Enact made the prepare aliases durable
    let aliases = AliasRegistry::open(store, fuji()).unwrap();
    assert_eq!(
        aliases.entries().into_keys().collect::<Vec<_>>(),
        vec!["USDC", "USDCImplementation", "WAVAX", "WBTC.e"]
    );

    let mut runner = MigrationRunner::open_file_store(config, chain.clone(), chain).unwrap();
    assert!(!runner.run(&DeployFuji).await.unwrap().ran());
}

#[test]
fn simulated_chain_knows_every_source() {
    let chain = deploy_fuji::simulated_chain(fuji()).unwrap();
    assert_eq!(chain.deploy_count(), 0);
    assert!(DeployFuji::plan().unwrap().validate().is_ok());
}
