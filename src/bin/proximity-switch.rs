use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use futures::StreamExt;
use log::{info, warn, LevelFilter};
use proximity_switch::{init_logging, load_config, start_tracker};
use proximity_switch::config::types::DeviceConfig;
use proximity_switch::device::btle::BtleLink;
use proximity_switch::error::{AppRunError, ConfigError};

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Connects to nearby bluetooth devices and reports which of the observed ones is closest.\n\nExample: proximity-switch --device AA:BB:CC:DD:EE:01=Kitchen --device AA:BB:CC:DD:EE:02=Office", long_about = None)]
struct Args {
    /// Path to the config file, instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device to track and observe, as ADDRESS or ADDRESS=NAME. May be repeated.
    #[arg(long = "device", value_name = "ADDRESS[=NAME]")]
    devices: Vec<String>,

    /// Sampling interval for observed devices, e.g. "250ms" or "1s"
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<std::time::Duration>,

    /// Log every sample
    #[arg(short, long)]
    verbose: bool,
}

fn parse_device(argument: &str) -> DeviceConfig {
    let (address, name) = match argument.split_once('=') {
        Some((address, name)) => (address, name),
        None => (argument, ""),
    };

    DeviceConfig {
        address: address.trim().to_string(),
        name: name.trim().to_string(),
        observe: true,
    }
}

async fn run(args: Args) -> Result<(), AppRunError> {
    let (mut config, mut locker) = load_config(args.config.as_deref()).await?;
    let _guard = locker.lock()?;

    config.devices.extend(args.devices.iter().map(|argument| parse_device(argument)));
    config.dedup_devices();
    if let Some(interval) = args.interval {
        config.observe_interval_ms = interval.as_millis() as u64;
    }

    if config.devices.is_empty() {
        warn!("No devices configured; add some to the config file or pass --device");
        return Ok(());
    }

    let link = Arc::new(BtleLink::new().await?);
    let tracker = start_tracker(link, &config).await?;
    let mut closest = tracker.observe_closest();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|source| AppRunError::Signal { source })?;
                break;
            },
            Some(device) = closest.next() => {
                info!("Switch to {}", device);
            },
        }
    }

    info!("Shutting down");
    tracker.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppRunError> {
    let args = Args::parse();
    init_logging(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info });
    info!(concat!("proximity-switch ", env!("CARGO_PKG_VERSION")));

    match run(args).await {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            warn!("proximity-switch is already running");
            Ok(())
        },
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        let device = parse_device("AA:BB:CC:DD:EE:01=Kitchen speaker");
        assert_eq!(device.address, "AA:BB:CC:DD:EE:01");
        assert_eq!(device.name, "Kitchen speaker");
        assert!(device.observe);

        assert_eq!(parse_device("AA:BB:CC:DD:EE:02").name, "");
    }
}
