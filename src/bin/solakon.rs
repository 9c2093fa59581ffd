//! Solakon ONE command line tool
//!
//! Usage: solakon --host 192.168.1.50 poll
//!        solakon --config solakon.yaml watch
//!        solakon --config solakon.yaml set-number export_limit 600

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use figment::providers::Serialized;
use solakon_modbus::{logging, Hub, HubConfig};
use tracing::info;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// YAML configuration file
    #[clap(short, long, env = "SOLAKON_CONFIG")]
    config: Option<PathBuf>,

    /// Device host, overrides the configuration
    #[clap(long)]
    host: Option<String>,

    /// Modbus TCP port, overrides the configuration
    #[clap(long)]
    port: Option<u16>,

    /// Modbus unit identifier, overrides the configuration
    #[clap(long)]
    slave_id: Option<u8>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[clap(short = 'l', long, default_value = "warn")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show device identification and test the connection
    Info,
    /// Run one poll cycle and print the snapshot as JSON
    Poll,
    /// Poll every scan interval until interrupted
    Watch,
    /// Write a numeric point
    SetNumber { key: String, value: f64 },
    /// Turn a switch point on or off
    SetSwitch {
        key: String,
        #[clap(value_parser = parse_on_off)]
        state: bool,
    },
}

fn parse_on_off(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}

impl Args {
    fn load_config(&self) -> solakon_modbus::Result<HubConfig> {
        let mut figment = HubConfig::figment(self.config.as_deref())?;
        if let Some(host) = &self.host {
            figment = figment.merge(Serialized::default("host", host));
        }
        if let Some(port) = self.port {
            figment = figment.merge(Serialized::default("port", port));
        }
        if let Some(slave_id) = self.slave_id {
            figment = figment.merge(Serialized::default("slave_id", slave_id));
        }
        HubConfig::from_figment(&figment)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(&args.log_level)?;

    let config = args.load_config()?;
    let hub = Hub::from_config(&config)?;
    info!(host = %config.host, port = config.port, slave_id = config.slave_id, "starting");

    let outcome = run(&hub, &config, args.command).await;
    hub.close().await?;
    outcome
}

async fn run(
    hub: &Hub,
    config: &HubConfig,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Info => {
            let connected = hub.test_connection().await;
            let info = hub.device_info().await;
            println!("manufacturer: {}", info.manufacturer_or_default());
            println!("model:        {}", info.model_or_default());
            println!("serial:       {}", info.serial.as_deref().unwrap_or("-"));
            println!("connection:   {}", if connected { "ok" } else { "failed" });
        }
        Command::Poll => {
            let snapshot = hub.poll_all().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Watch => {
            let mut ticker = tokio::time::interval(config.scan_interval());
            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = hub.poll_all().await;
                        println!("{}", serde_json::to_string(&snapshot)?);
                    }
                    _ = &mut shutdown => {
                        info!("interrupted");
                        break;
                    }
                }
            }
        }
        Command::SetNumber { key, value } => {
            let written = hub.write_number(&key, value).await?;
            println!("{} = {}", key, written);
        }
        Command::SetSwitch { key, state } => {
            let word = hub.write_switch(&key, state).await?;
            println!(
                "{} = {} (register 0x{:04X})",
                key,
                if state { "on" } else { "off" },
                word
            );
        }
    }
    Ok(())
}
