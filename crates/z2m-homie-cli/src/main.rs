//! Command-line interface for the Zigbee2MQTT Homie 5 bridge.

mod config;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use z2m_homie_bridge::topic::device_topic;
use z2m_homie_bridge::{
    BridgeContext, HomieTransport, Homie5Bridge, MessageRouter, MqttTransport, Qos, Will,
    Zigbee2MqttHost,
};
use z2m_homie_core::config::env_vars;
use z2m_homie_core::EventBus;
use z2m_homie_devices::{Description, DeviceState, SystemClock, parse_devices, translate};

use crate::config::AppConfig;

/// Publish Zigbee2MQTT devices as Homie 5 devices.
#[derive(Parser, Debug)]
#[command(name = "z2m-homie")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bridge until interrupted.
    Run {
        /// MQTT broker host.
        #[arg(long)]
        broker: Option<String>,
        /// MQTT broker port.
        #[arg(short, long)]
        port: Option<u16>,
        /// Zigbee2MQTT base topic.
        #[arg(long)]
        base_topic: Option<String>,
    },
    /// Print the Homie descriptions for a Zigbee2MQTT `bridge/devices` dump.
    Translate {
        /// Path to the devices JSON document.
        #[arg(required = true)]
        devices: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Run {
            broker,
            port,
            base_topic,
        } => {
            if let Some(broker) = broker {
                config.mqtt.broker = broker;
            }
            if let Some(port) = port {
                config.mqtt.port = port;
            }
            if let Some(base_topic) = base_topic {
                config.bridge.z2m_base_topic = base_topic;
            }
            config.validate()?;
            run_bridge(config).await
        }
        Command::Translate { devices } => {
            config.validate()?;
            print_descriptions(&config, &devices)
        }
    }
}

fn init_logging(verbose: bool) {
    // JSON output for container environments
    let json_logging = env_vars::parse::<bool>(env_vars::LOG_JSON).unwrap_or(false);

    let default_level = if verbose { "z2m_homie=debug" } else { "z2m_homie=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run_bridge(config: AppConfig) -> Result<()> {
    let bus = Arc::new(EventBus::with_name("z2m-homie"));
    let will = Will::retained(
        device_topic(&config.bridge, &config.bridge.bridge_id, "$state"),
        DeviceState::Lost.as_str(),
    );

    let (transport, event_loop) = MqttTransport::new(&config.mqtt, Some(will));
    tracing::info!(broker = %transport.broker(), "Connecting to MQTT broker");
    let transport = Arc::new(transport);

    let host = Arc::new(Zigbee2MqttHost::new(
        config.bridge.z2m_base_topic.clone(),
        transport.clone(),
        bus.clone(),
    ));
    let router = Arc::new(MessageRouter::new(&config.bridge, host.clone(), bus.clone()));
    let event_task = event_loop.spawn(router);

    transport
        .subscribe(&host.subscription(), Qos::AtLeastOnce)
        .await?;
    let timeout = Duration::from_secs(config.discovery_timeout_secs);
    if !host.wait_for_devices(timeout).await {
        anyhow::bail!(
            "No device list received on {}/bridge/devices within {:?}",
            host.base_topic(),
            timeout
        );
    }

    let mut bridge = Homie5Bridge::new(BridgeContext {
        config: config.bridge.clone(),
        transport: transport.clone(),
        devices: host.clone(),
        states: host.clone(),
        commands: host.clone(),
        bus: bus.clone(),
        versions: Arc::new(SystemClock),
    });
    bridge.start().await.context("Failed to start bridge")?;

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            event = bridge.next_event() => event,
        };
        let Some(event) = event else {
            tracing::warn!("Event bus closed");
            break;
        };
        if let Err(e) = bridge.handle_event(event).await {
            tracing::warn!(error = %e, "Failed to handle event");
        }
    }

    bridge.stop().await.context("Failed to stop bridge")?;
    transport.end().await?;
    if tokio::time::timeout(Duration::from_secs(5), event_task)
        .await
        .is_err()
    {
        tracing::warn!("MQTT event loop did not stop in time");
    }
    Ok(())
}

fn print_descriptions(config: &AppConfig, path: &std::path::Path) -> Result<()> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read devices file {}", path.display()))?;
    let devices = parse_devices(&content)?;

    let descriptions: BTreeMap<String, Description> = devices
        .iter()
        .filter(|device| device.is_eligible())
        .map(|device| {
            let description =
                translate(device, &SystemClock).with_root(config.bridge.bridge_id.clone());
            (config.bridge.device_id(&device.ieee_address), description)
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&descriptions)?);
    Ok(())
}
