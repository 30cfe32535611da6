use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors reported by a link layer for a single request.
///
/// A `NotConnected` reply to a signal read means the link was lost; every other error on a read is
/// a failed sample and leaves the connection alone.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No peripheral found with address {address}")]
    NotFound { address: String },

    #[error("The device is not connected")]
    NotConnected,

    #[error("The device did not report a signal strength")]
    NoSignal,

    #[error("The link layer did not reply before the deadline")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Unknown device {address}")]
    UnknownDevice { address: String },

    #[error("Device {address} has already been added")]
    DuplicateDevice { address: String },

    #[error("The proximity selector task has stopped")]
    SelectorStopped,
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (bluetooth): {source}")]
    LinkError { #[from] source: LinkError },

    #[error("Failed to start application: {source}")]
    TrackerError { #[from] source: TrackerError },

    #[error("Failed to wait for shutdown signal: {source}")]
    Signal { source: io::Error },
}
