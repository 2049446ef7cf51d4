//! office-bridge CLI - descriptor inspection and transport probing

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use office_bridge::descriptor::{ConnectionDescriptor, DEFAULT_SCHEME};
use office_bridge::{SocketConnector, TransportConnector};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "office-bridge")]
#[command(
    author,
    version,
    about = "Inspect connection descriptors and probe office listeners"
)]
struct Cli {
    /// Increase log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a descriptor into transport, protocol and root object
    Parse {
        /// Connection descriptor, e.g. uno:socket,host=localhost,port=2002;urp;StarOffice.ServiceManager
        descriptor: String,

        /// Scheme the descriptor must start with
        #[arg(short, long, default_value = DEFAULT_SCHEME)]
        scheme: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Open the descriptor's transport and report the channel
    Probe {
        /// Connection descriptor
        descriptor: String,

        /// Scheme the descriptor must start with
        #[arg(short, long, default_value = DEFAULT_SCHEME)]
        scheme: String,

        /// Give up after this many milliseconds (default: wait for the transport)
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Parse {
            descriptor,
            scheme,
            json,
        } => parse(&descriptor, &scheme, json),
        Commands::Probe {
            descriptor,
            scheme,
            timeout_ms,
        } => probe(&descriptor, &scheme, timeout_ms.map(Duration::from_millis)).await,
    }
}

fn parse(raw: &str, scheme: &str, json: bool) -> Result<()> {
    let descriptor = ConnectionDescriptor::parse_with_scheme(raw, scheme)?;
    let transport = descriptor
        .transport()
        .context("Failed to parse transport spec")?;
    tracing::debug!(
        "Parsed {descriptor}: {} transport, {} param(s)",
        transport.kind,
        transport.params.len()
    );

    if json {
        let value = serde_json::json!({
            "descriptor": descriptor,
            "transport": transport,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Transport: {}", descriptor.transport_spec);
    println!("  kind: {}", transport.kind);
    for (key, value) in &transport.params {
        println!("  {key}: {value}");
    }
    println!("Protocol:  {}", descriptor.protocol_name);
    println!("Root:      {}", descriptor.root_object_id);
    Ok(())
}

async fn probe(raw: &str, scheme: &str, timeout: Option<Duration>) -> Result<()> {
    let descriptor = ConnectionDescriptor::parse_with_scheme(raw, scheme)?;
    let connector = SocketConnector::new();
    tracing::info!("Connecting to {}", descriptor.transport_spec);

    let connect = connector.connect(&descriptor.transport_spec);
    let channel = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, connect)
            .await
            .with_context(|| {
                format!(
                    "No answer from '{}' within {timeout:?}",
                    descriptor.transport_spec
                )
            })??,
        None => connect.await?,
    };

    tracing::info!("Connected, closing {}", channel.description());
    println!("connected: {}", channel.description());
    channel.close().await.context("Failed to close channel")?;
    Ok(())
}
