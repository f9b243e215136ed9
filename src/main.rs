//! macvland - macvlan network driver
//!
//! Attaches container sandboxes to macvlan sub-interfaces of a host parent
//! interface, resolves their gateways, and records the bindings.

mod bindings;
mod cli;
mod driver;
mod endpoint;
mod error;
mod join_info;
mod manifest;
mod network;
mod registry;
mod store;
mod sweep;
#[cfg(test)]
mod testing;

use bindings::RuntimeLedger;
use cli::{Cli, Commands};
use driver::Driver;
use error::{ErrorKind, Result};
use join_info::{IFNAME_OPTION, Options, SandboxJoinInfo};
use network::IpLink;
use store::JsonStore;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

/// Exit status per error class so callers can tell "not found" from "broken"
fn exit_code(e: &error::Error) -> i32 {
    match e.kind() {
        ErrorKind::NotFound => 2,
        ErrorKind::Conflict => 3,
        ErrorKind::ConfigurationMismatch => 4,
        ErrorKind::ResourceCreation => 5,
        ErrorKind::Persistence => 6,
        ErrorKind::InvalidArgument | ErrorKind::Config | ErrorKind::Io => 1,
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    // Commands that don't require config
    if let Commands::Completion { shell } = cli.command {
        Cli::generate_completion(shell);
        return Ok(());
    }

    let config = manifest::load(&cli.config)?;

    if let Commands::Check = cli.command {
        println!(
            "Configuration OK: {} network(s), {} endpoint(s)",
            config.networks.len(),
            config.networks.iter().map(|n| n.endpoints.len()).sum::<usize>()
        );
        return Ok(());
    }

    let store = Arc::new(JsonStore::open(&config.config.state_dir)?);
    let links = Arc::new(IpLink::new());

    // Held until exit so a sweep never sees a join between link and record
    let _lock = store.lock()?;

    if let Commands::Sweep { delete, json } = cli.command {
        let report = sweep::run(
            links.as_ref(),
            store.as_ref(),
            &config.config.interface_prefix,
            delete,
        )?;
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if report.orphans.is_empty() {
            println!("No orphaned interfaces");
        } else {
            for name in &report.orphans {
                let status = if report.deleted.contains(name) {
                    "deleted"
                } else if delete {
                    "failed"
                } else {
                    "orphaned"
                };
                println!("{:<16} {}", name, status);
            }
        }
        return Ok(());
    }

    let bindings = Arc::new(RuntimeLedger::open(&config.config.runtime_dir)?);
    let registry = Arc::new(config.build_registry(links.as_ref())?);
    let driver = Driver::new(registry, links, store, bindings, config.driver_options());
    driver.restore()?;

    let result = dispatch(&driver, cli.command);
    driver.shutdown();
    result
}

fn dispatch(driver: &Driver, command: Commands) -> Result<()> {
    match command {
        Commands::Join {
            network,
            endpoint,
            sandbox,
            ifname,
            json,
        } => {
            let mut options = Options::new();
            if let Some(name) = ifname {
                options.insert(IFNAME_OPTION.to_string(), serde_json::Value::String(name));
            }

            let mut info = SandboxJoinInfo::new();
            driver.join(&network, &endpoint, &sandbox, &mut info, &options)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_join(&endpoint, &info);
            }
        }
        Commands::Leave { network, endpoint } => {
            driver.leave(&network, &endpoint)?;
            println!("Endpoint {} left network {}", endpoint, network);
        }
        Commands::Ls { json } => ls(driver, json)?,
        // Already handled in run
        Commands::Check | Commands::Sweep { .. } | Commands::Completion { .. } => unreachable!(),
    }

    Ok(())
}

fn print_join(endpoint: &str, info: &SandboxJoinInfo) {
    println!("Endpoint {} joined", endpoint);
    if let Some(names) = &info.names {
        match &names.dst_name {
            Some(dst) => println!("  interface: {} -> {}", names.src_name, dst),
            None => println!("  interface: {} -> {}N", names.src_name, names.dst_prefix),
        }
    }
    if let Some(gw) = info.gateway {
        println!("  gateway:   {}", gw);
    }
    if let Some(gw) = info.gateway_v6 {
        println!("  gateway6:  {}", gw);
    }
    if info.gateway_service_disabled {
        println!("  gateway service disabled");
    }
}

fn ls(driver: &Driver, json: bool) -> Result<()> {
    let networks = driver.registry().networks();

    if json {
        let out: Vec<_> = networks
            .iter()
            .map(|n| {
                let config = n.config();
                let endpoints: Vec<_> = n
                    .snapshot()
                    .into_iter()
                    .map(|(record, state)| {
                        serde_json::json!({
                            "id": record.id,
                            "address": record.addr,
                            "address_v6": record.addr_v6,
                            "interface": record.src_name,
                            "state": state.as_str(),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "id": n.id(),
                    "parent": config.parent,
                    "mode": config.mode,
                    "internal": config.internal,
                    "endpoints": endpoints,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:<10} {:<8}",
        "NETWORK", "PARENT", "MODE", "INTERNAL"
    );
    for n in &networks {
        let config = n.config();
        println!(
            "{:<20} {:<16} {:<10} {:<8}",
            n.id(),
            config.parent,
            config.mode,
            config.internal
        );
        for (record, state) in n.snapshot() {
            let addr = record
                .addr
                .or(record.addr_v6)
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".into());
            println!(
                "  {:<18} {:<20} {:<8} {}",
                record.id,
                addr,
                state.as_str(),
                record.src_name.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}
