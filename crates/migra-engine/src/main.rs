use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use migra_engine::migrations::deploy_fuji::{self, DeployFuji};
use migra_engine::{Migration, MigrationConfig, MigrationRunner, RunOutcome};
use migra_registry::{
    AliasRegistry, FileStore, MigrationLog, NetworkId, PersistMode, RegistryStore, RootRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_NETWORK: &str = "fuji";

fn store_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("network")
            .long("network")
            .value_parser(value_parser!(String))
            .help("Target network (default: config, MIGRA_NETWORK, or fuji)"),
    )
    .arg(
        Arg::new("store")
            .long("store")
            .value_parser(value_parser!(PathBuf))
            .help("Store directory (default: config, MIGRA_STORE_DIR, or ./deployments)"),
    )
    .arg(
        Arg::new("config")
            .long("config")
            .value_parser(value_parser!(PathBuf))
            .help("TOML configuration file"),
    )
    .arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Output as JSON"),
    )
}

fn cli() -> Command {
    Command::new("migra")
        .version(migra_engine::VERSION)
        .about("Two-phase deployment migrations")
        .subcommand_required(true)
        .subcommand(
            store_args(Command::new("simulate").about("Run 001_DeployFuji against a simulated chain"))
                .arg(
                    Arg::new("runs")
                        .long("runs")
                        .default_value("1")
                        .value_parser(value_parser!(u32))
                        .help("Number of times to run"),
                )
                .arg(
                    Arg::new("prepare-only")
                        .long("prepare-only")
                        .action(ArgAction::SetTrue)
                        .help("Only run prepare, repeatedly"),
                )
                .arg(
                    Arg::new("durable")
                        .long("durable")
                        .action(ArgAction::SetTrue)
                        .help("Persist aliases written during prepare"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Redeploy aliased targets (same as REDEPLOY=1)"),
                ),
        )
        .subcommand(store_args(Command::new("aliases").about("Print a network's aliases")))
        .subcommand(store_args(Command::new("roots").about("Print a network's roots")))
        .subcommand(store_args(Command::new("log").about("Print a network's enacted migrations")))
}

fn load_config(args: &ArgMatches) -> Result<(MigrationConfig, NetworkId)> {
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => MigrationConfig::load(path)?,
        None => MigrationConfig::new(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(dir) = args.get_one::<PathBuf>("store") {
        config = config.with_store_dir(dir.clone());
    }
    let network = match args.get_one::<String>("network") {
        Some(name) => NetworkId::new(name.as_str())?,
        None => match &config.network {
            Some(network) => network.clone(),
            None => NetworkId::new(DEFAULT_NETWORK)?,
        },
    };
    Ok((config.with_network(network.clone()), network))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn simulate(args: &ArgMatches) -> Result<()> {
    let (mut config, network) = load_config(args)?;
    if args.get_flag("force") {
        config = config.with_force_redeploy(true);
    }
    if args.get_flag("durable") {
        config = config.with_prepare_mode(PersistMode::Durable);
    }
    let runs = args.get_one::<u32>("runs").copied().unwrap_or(1);
    let json = args.get_flag("json");

    let chain = Arc::new(deploy_fuji::simulated_chain(network.clone())?);
    let store_dir = config.store_dir.clone();
    let mut runner = MigrationRunner::open_file_store(config, chain.clone(), chain.clone())
        .with_context(|| format!("opening store at {}", store_dir.display()))?;
    let migration = DeployFuji;

    for run in 1..=runs {
        let before = chain.deploy_count();
        if args.get_flag("prepare-only") {
            let bundle = runner.prepare(&migration).await?;
            let stats = runner.prepare_stats();
            if json {
                print_json(&serde_json::json!({ "run": run, "bundle": bundle, "stats": stats }))?;
            } else {
                println!(
                    "run {run}: prepared {} contracts ({} deployed, {} reused)",
                    bundle.len(),
                    stats.deployed,
                    stats.reused
                );
            }
        } else {
            let outcome = runner.run(&migration).await?;
            if json {
                print_json(&outcome)?;
            } else {
                match &outcome {
                    RunOutcome::Enacted(report) => {
                        println!("run {run}: enacted {}", report.migration);
                        for (role, address) in &report.roots {
                            println!("  root {role} -> {address}");
                        }
                    }
                    RunOutcome::AlreadyEnacted { migration, enacted_at } => {
                        println!("run {run}: {migration} already enacted at {enacted_at}");
                    }
                }
            }
        }
        if !json {
            println!("  deploy transactions: {}", chain.deploy_count() - before);
        }
    }

    tracing::info!(
        migration = migration.name(),
        state = %runner.state(migration.name()),
        "simulation finished"
    );
    Ok(())
}

fn show(args: &ArgMatches, table: &str) -> Result<()> {
    let (config, network) = load_config(args)?;
    let store: Arc<dyn RegistryStore> = Arc::new(FileStore::new(config.store_dir));
    let json = args.get_flag("json");

    let entries: Vec<(String, String)> = match table {
        "aliases" => AliasRegistry::open(store, network.clone())?
            .entries()
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect(),
        "roots" => RootRegistry::open(store, network.clone())?
            .entries()
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect(),
        _ => MigrationLog::open(store, network.clone())?
            .entries()
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect(),
    };

    if json {
        let map: std::collections::BTreeMap<_, _> = entries.into_iter().collect();
        return print_json(&map);
    }
    if entries.is_empty() {
        println!("no {table} for {network}");
    }
    for (key, value) in entries {
        println!("{key:<24} {value}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("simulate", args)) => simulate(args).await,
        Some((table @ ("aliases" | "roots" | "log"), args)) => show(args, table),
        _ => Ok(()),
    }
}
