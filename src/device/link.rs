use async_trait::async_trait;

use crate::error::LinkError;

/// The radio, as seen by a device connection.
///
/// Every request is a single asynchronous round trip identified by the device address. Connections
/// never call these from inside their own lock; replies are fed back to the connection once the
/// future resolves.
#[async_trait]
pub trait LinkLayer: Send + Sync + 'static {
    async fn connect(&self, address: &str) -> Result<(), LinkError>;

    async fn disconnect(&self, address: &str) -> Result<(), LinkError>;

    /// Reads the current signal strength (dBm). Returns `LinkError::NotConnected` if the link has been
    /// lost in the meantime.
    async fn read_signal_strength(&self, address: &str) -> Result<i32, LinkError>;
}
