use std::{net::IpAddr, path::PathBuf, process::ExitCode, sync::Arc};

use access_census::{
    config::{Config, ConfigError, DEFAULT_CONFIG_FILE},
    data_aquisition::snmp::SnmpConnector,
    drivers::{DeviceDriver, DriverError, factory::Unrecognized},
    topology::{Census, NodeReport, NodeState, PollReport},
};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde_json::json;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "access-census", version, about = "Active-subscriber census and outage detection over SNMP")]
struct Cli {
    /// TOML configuration file; a missing file means built-in defaults.
    #[arg(long, short, global = true, env = "CENSUS_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Repeat for more detail (info, debug, trace).
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk the tree below ROOT and report active subscribers and the root's outage verdict.
    Census { root: IpAddr },
    /// Show which driver a device is matched to.
    Identify { address: IpAddr },
    /// Per-port status and role, the uplink and the neighbors of one device.
    Ports { address: IpAddr },
    /// Deregistration records of an OLT and the outage verdict.
    Outage { address: IpAddr },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{address}: {reason}")]
    Unrecognized { address: IpAddr, reason: Unrecognized },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("{address}: {vendor} has no power diagnostics")]
    NoDiagnostics { address: IpAddr, vendor: String },

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => 2,
            CliError::Unrecognized { .. } => 3,
            CliError::Driver(_) => 4,
            CliError::NoDiagnostics { .. } => 5,
            CliError::Json(_) => 1,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(&cli.config)?;
    tracing::debug!(path = %cli.config.display(), hosts = config.directory.hosts.len(), "configuration loaded");

    let directory = config.directory();
    if directory.is_empty() {
        tracing::warn!("directory has no hosts, traversal will not descend below the root");
    }
    let connector = Arc::new(SnmpConnector::new(config.snmp.clone()));
    let census = Census::new(connector, Arc::new(directory), config.census_settings());

    match cli.command {
        Command::Census { root } => {
            let report = census.poll(root).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Command::Identify { address } => {
            let driver = identify(&census, address).await?;
            if cli.json {
                println!("{}", json!({ "address": address, "vendor": driver.vendor() }));
            } else {
                println!("{address}: {}", driver.vendor());
            }
            Ok(())
        }
        Command::Ports { address } => ports(&census, address, cli.json).await,
        Command::Outage { address } => outage(&census, address, cli.json).await,
    }
}

async fn identify(census: &Census, address: IpAddr) -> Result<Box<dyn DeviceDriver>, CliError> {
    census
        .factory()
        .identify(census.identity(address))
        .await
        .map_err(|reason| CliError::Unrecognized { address, reason })
}

async fn ports(census: &Census, address: IpAddr, as_json: bool) -> Result<(), CliError> {
    let driver = identify(census, address).await?;
    let statuses = driver.port_status().await?;
    let roles = driver.port_descriptions().await?;
    let uplink = driver.find_uplink().await?;
    let neighbors = driver.neighbors().await?;
    let active = driver.active_user_count().await?;

    if as_json {
        let ports: Vec<_> = driver
            .port_indices()
            .await?
            .into_iter()
            .map(|port| json!({ "port": port, "status": statuses.get(&port), "role": roles.get(&port) }))
            .collect();
        let out = json!({
            "address": address,
            "vendor": driver.vendor(),
            "ports": ports,
            "uplink": uplink,
            "neighbors": neighbors,
            "active_users": active,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{address}: {}", driver.vendor());
    println!("{:>6}  {:<6}  ROLE", "PORT", "STATUS");
    for port in driver.port_indices().await? {
        let status = statuses.get(&port).map_or_else(|| "?".to_string(), ToString::to_string);
        let role = roles.get(&port).map_or_else(|| "-".to_string(), ToString::to_string);
        let marker = if uplink.as_ref().is_some_and(|u| u.port == port) { "  <- uplink" } else { "" };
        println!("{port:>6}  {status:<6}  {role}{marker}");
    }
    println!("active users: {active}");
    println!("neighbors: {}", join(&neighbors.traversable));
    if !neighbors.manual.is_empty() {
        println!("manual: {}", join(&neighbors.manual));
    }
    Ok(())
}

async fn outage(census: &Census, address: IpAddr, as_json: bool) -> Result<(), CliError> {
    let driver = identify(census, address).await?;
    let Some(diagnostics) = driver.power_diagnostics() else {
        return Err(CliError::NoDiagnostics {
            address,
            vendor: driver.vendor().to_string(),
        });
    };
    let log = diagnostics.deregistration_times().await?;
    let now = Local::now().naive_local();
    let buckets = census.outage_settings().correlated_buckets(&log.records, now);

    if as_json {
        let out = json!({
            "address": address,
            "now": now,
            "records": log.records,
            "rejected": log.rejected,
            "correlated_minutes": buckets,
            "outage_detected": !buckets.is_empty(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for (mac, ts) in &log.records {
        println!("{mac}  {ts}");
    }
    if log.rejected > 0 {
        println!("({} records could not be decoded)", log.rejected);
    }
    for (minute, terminals) in &buckets {
        println!("{minute}: {} terminals deregistered", terminals.len());
    }
    println!("outage detected: {}", !buckets.is_empty());
    Ok(())
}

fn print_report(report: &PollReport) {
    println!("root {} at {}", report.root, report.polled_at);
    println!("active users: {}", report.active_users);
    match report.outage_detected {
        Some(verdict) => println!("outage detected: {verdict}"),
        None => println!("outage detected: n/a"),
    }
    print_node(&report.tree, 0);

    let manual = report.tree.all_manual_neighbors();
    if !manual.is_empty() {
        println!("left for manual handling: {}", join(&manual));
    }
}

fn print_node(node: &NodeReport, depth: usize) {
    let indent = "  ".repeat(depth);
    let name = node.hostname.as_deref().unwrap_or("root");
    let vendor = node.vendor.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
    let state = match &node.state {
        NodeState::Resolved => format!("{} own / {} total", node.own_active, node.total_active),
        NodeState::Unrecognized(reason) | NodeState::Unreachable(reason) => format!("skipped: {reason}"),
        NodeState::Revisited => "already on path".into(),
        NodeState::DepthLimit => "depth limit".into(),
    };
    println!("{indent}{name} {} [{vendor}] {state}", node.address);
    for unresolved in &node.unresolved_neighbors {
        println!("{indent}  {unresolved} (not in directory)");
    }
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn join<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
