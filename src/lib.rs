use std::env;
use std::sync::Arc;
use log::{info, LevelFilter};

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::link::LinkLayer;
use crate::device::types::Device;
use crate::error::{ConfigError, TrackerError};
use crate::proximity::tracker::{ProximityTracker, TrackerSettings};

pub mod config;
pub mod device;
pub mod error;
pub mod proximity;
pub mod signal;

pub fn init_logging(level: LevelFilter) {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("proximity_switch", level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

/// Reads the config file at `path`, or the default config location if `None`. The returned locker
/// has to be locked and kept alive for as long as the config is in use.
pub async fn load_config(path: Option<&std::path::Path>) -> Result<(Config, config::io::ConfigIOLocker), ConfigError> {
    let mut config_io = match path {
        Some(path) => ConfigIO::open_sync(path)?,
        None => ConfigIO::new_sync()?,
    };
    let locker = config_io.locker()?;
    let config = config_io.read().await?;
    Ok((config, locker))
}

/// Builds a tracker for every device in `config`, connects all of them and observes the ones marked
/// for observation.
pub async fn start_tracker<L: LinkLayer>(link: Arc<L>, config: &Config) -> Result<ProximityTracker<L>, TrackerError> {
    let tracker = ProximityTracker::new(link, TrackerSettings::from(config));

    let devices: Vec<Device> = config.devices.iter().map(|device| device.device()).collect();
    for device in devices {
        tracker.add_device(device)?;
    }

    tracker.set_observation_set(config.observed_addresses()).await?;

    for device in tracker.devices() {
        tracker.connect(device.address())?;
    }

    info!("Tracking {} device(s)", tracker.devices().len());
    Ok(tracker)
}
