//! The `minnow` binary: run the simulated instrument host, or poke a
//! running one from the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use tracing_subscriber::EnvFilter;

use minnow_client::{DeviceClient, ManagerClient, ProtocolClient};
use minnow_server::{Host, ServerConfig};

#[derive(Parser)]
#[command(name = "minnow", version, about = "Simulated nanopore instrument host and client")]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the instrument host until interrupted.
    Daemon {
        /// Path to a TOML configuration file (default: minnow.toml).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the manager listener port.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Call a running host.
    Client {
        /// Host to connect to.
        #[arg(long, default_value = minnow_client::DEFAULT_HOST)]
        host: String,

        /// Listener port: the manager port for manager commands, a device
        /// port for device and protocol commands.
        #[arg(long, default_value_t = minnow_client::DEFAULT_MANAGER_PORT)]
        port: u16,

        #[command(subcommand)]
        command: ClientCommand,
    },
}

#[derive(Subcommand)]
enum ClientCommand {
    /// Describe the host behind the manager listener.
    DescribeHost,
    /// List active devices (superseded; prefer flow-cell-positions).
    ListDevices,
    /// List flow cell positions and their RPC ports.
    FlowCellPositions,
    /// Report a device's current state.
    DeviceState,
    /// Report a device's identity and capabilities.
    DeviceInfo,
    /// Report the flow cell loaded in a device.
    FlowCellInfo,
    /// List the protocols a device can run.
    ListProtocols,
    /// Start a protocol run on a device.
    StartProtocol {
        /// Protocol identifier, e.g. sequencing/dna_lsk109.
        identifier: String,
        /// Experiment group for the run.
        #[arg(long)]
        group_id: Option<String>,
        /// Sample identifier for the run.
        #[arg(long)]
        sample_id: Option<String>,
        /// Extra protocol arguments, repeatable.
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// List run ids on a device, most recent first.
    ListRuns,
    /// Show details for one run (defaults to the most recent).
    RunInfo {
        #[arg(long)]
        run_id: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Daemon { config, port } => daemon(config, port).await,
        Command::Client {
            host,
            port,
            command,
        } => client(&host, port, command).await,
    }
}

async fn daemon(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config =
        ServerConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    if let Some(port) = port {
        config.manager_port = port;
    }

    let host = Host::bind(&config).await.context("failed to bind host")?;
    tracing::info!(
        manager = %host.manager_addr(),
        devices = host.device_addrs().len(),
        "host ready"
    );

    host.serve(config.grace()).await;
    Ok(())
}

async fn client(host: &str, port: u16, command: ClientCommand) -> anyhow::Result<()> {
    match command {
        ClientCommand::DescribeHost => {
            let mut manager = ManagerClient::connect(host, port).await?;
            let info = manager.describe_host().await?;
            println!("{} ({})", info.product_name, info.product_code);
            println!("serial:       {}", info.serial);
            println!("network name: {}", info.network_name);
        }
        ClientCommand::ListDevices => {
            let mut manager = ManagerClient::connect(host, port).await?;
            #[allow(deprecated)]
            let devices = manager.list_devices().await?;
            for device in devices {
                println!("{}\tport {}", device.name, device.insecure_port);
            }
        }
        ClientCommand::FlowCellPositions => {
            let mut manager = ManagerClient::connect(host, port).await?;
            let positions: Vec<_> = manager.flow_cell_positions().await?.try_collect().await?;
            for position in positions {
                let port = position.rpc_ports.as_ref().map_or(0, |ports| ports.insecure);
                println!(
                    "{}\t{}\tport {port}",
                    position.name,
                    position.state().as_str_name()
                );
            }
        }
        ClientCommand::DeviceState => {
            let mut device = DeviceClient::connect(host, port).await?;
            let state = device.get_device_state().await?;
            println!("{}", state.as_str_name());
        }
        ClientCommand::DeviceInfo => {
            let mut device = DeviceClient::connect(host, port).await?;
            let info = device.get_device_info().await?;
            println!("device:   {} ({})", info.device_id, info.device_type);
            println!("firmware: {}", info.firmware_version);
            println!("channels: {}", info.max_channel_count);
        }
        ClientCommand::FlowCellInfo => {
            let mut device = DeviceClient::connect(host, port).await?;
            let info = device.get_flow_cell_info().await?;
            if info.has_flow_cell {
                println!("flow cell: {} ({})", info.flow_cell_id, info.product_code);
                println!("channels:  {}", info.channel_count);
            } else {
                println!("no flow cell loaded");
            }
        }
        ClientCommand::ListProtocols => {
            let mut protocol = ProtocolClient::connect(host, port).await?;
            for info in protocol.list_protocols().await? {
                println!("{}\t{}\t[{}]", info.identifier, info.name, info.tags.join(", "));
            }
        }
        ClientCommand::StartProtocol {
            identifier,
            group_id,
            sample_id,
            args,
        } => {
            let mut protocol = ProtocolClient::connect(host, port).await?;
            let run_id = protocol
                .start_protocol(&identifier, group_id.as_deref(), sample_id.as_deref(), args)
                .await?;
            let info = protocol.get_run_info(Some(&run_id)).await?;
            print_run_info(&info);
        }
        ClientCommand::ListRuns => {
            let mut protocol = ProtocolClient::connect(host, port).await?;
            for run_id in protocol.list_protocol_runs().await? {
                println!("{run_id}");
            }
        }
        ClientCommand::RunInfo { run_id } => {
            let mut protocol = ProtocolClient::connect(host, port).await?;
            let info = protocol.get_run_info(run_id.as_deref()).await?;
            print_run_info(&info);
        }
    }

    Ok(())
}

fn print_run_info(info: &minnow_client::proto::protocol::ProtocolRunInfo) {
    println!("run:      {}", info.run_id);
    println!("protocol: {}", info.protocol_id);
    println!("state:    {}", info.state().as_str_name());
    println!("started:  {} ms since epoch", info.start_time_unix_ms);
    if let Some(user_info) = &info.user_info {
        if let Some(group) = &user_info.protocol_group_id {
            println!("group:    {group}");
        }
        if let Some(sample) = &user_info.sample_id {
            println!("sample:   {sample}");
        }
    }
    if !info.args.is_empty() {
        println!("args:     {}", info.args.join(" "));
    }
}
