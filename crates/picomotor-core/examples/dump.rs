//! Picomotor Controller Dump Tool
//!
//! Connects to an 8742 controller, prints its identification and the
//! settings of every channel, then optionally makes a small relative move
//! and waits for it to finish.
//!
//! Usage:
//!   cargo run --example dump -- [OPTIONS]
//!
//! Options:
//!   --config FILE     JSON driver configuration
//!   --tcp HOST        Connect over TCP (port 23)
//!   --simulation      Use the simulated controller
//!   --move CH STEPS   Relative move on a channel after the dump
//!
//! Without --config, --tcp or --simulation the first USB controller is used.
//! Set RUST_LOG=debug to see every command and response.

use anyhow::{bail, Context, Result};
use picomotor_core::config::{DriverConfig, TransportConfig};
use picomotor_core::protocol::{stream, Channel};
use picomotor_core::simulator::SimulatorConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = DriverConfig::default();
    let mut relative_move: Option<(u8, i64)> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                let path = args.get(i).context("--config needs a file")?;
                config = DriverConfig::from_file(path)
                    .with_context(|| format!("loading {}", path))?;
            }
            "--tcp" => {
                i += 1;
                let host = args.get(i).context("--tcp needs a host")?;
                config.transport = TransportConfig::Stream {
                    host: host.clone(),
                    port: stream::DEFAULT_PORT,
                };
            }
            "--simulation" => {
                config.transport = TransportConfig::Simulated(SimulatorConfig::default());
            }
            "--move" => {
                let channel = args.get(i + 1).context("--move needs a channel")?;
                let steps = args.get(i + 2).context("--move needs a step count")?;
                relative_move = Some((channel.parse()?, steps.parse()?));
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => bail!("unknown argument: {}", other),
        }
        i += 1;
    }

    let mut ctrl = config.connect().await?;

    println!("{}", ctrl.identify().await?);
    println!("error: {}", ctrl.error_message().await?);
    for channel in Channel::all() {
        let settings = ctrl.channel_settings(channel.get()).await?;
        println!("{}", serde_json::to_string(&settings)?);
    }

    if let Some((channel, steps)) = relative_move {
        ctrl.set_relative(channel, steps).await?;
        ctrl.finish(Some(channel)).await?;
        println!("channel {} at {}", channel, ctrl.position(channel).await?);
    }

    ctrl.close().await?;
    Ok(())
}

fn print_help() {
    println!("Picomotor Controller Dump Tool");
    println!();
    println!("Usage: dump [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config FILE     JSON driver configuration");
    println!("      --tcp HOST        Connect over TCP (port 23)");
    println!("      --simulation      Use the simulated controller");
    println!("      --move CH STEPS   Relative move on a channel after the dump");
    println!("  -h, --help            Show this help");
}
