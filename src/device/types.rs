use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::SystemTime;
use serde::{Deserialize, Serialize};

/// Canonical spelling of a device address: no surrounding whitespace, upper case hex digits.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

/// A peer device. Two devices are the same device iff their addresses match, the display name is
/// informational only. Addresses are normalized on construction, so `aa:bb:..` and `AA:BB:..` are
/// the same device.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    address: String,
    name: String,
}

impl Device {
    pub fn new(address: impl AsRef<str>, name: impl Into<String>) -> Self {
        Device {
            address: normalize_address(address.as_ref()),
            name: name.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Success,
    Error,
}

/// One signal strength reading, as produced by a single read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSample {
    pub value: i32, // dBm, more negative is weaker
    pub timestamp: SystemTime,
    pub outcome: SampleOutcome,
}

impl SignalSample {
    pub fn success(value: i32) -> Self {
        SignalSample { value, timestamp: SystemTime::now(), outcome: SampleOutcome::Success }
    }

    pub fn error() -> Self {
        SignalSample { value: 0, timestamp: SystemTime::now(), outcome: SampleOutcome::Error }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == SampleOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_device_identity_is_the_address() {
        let a = Device::new("AA:BB:CC:DD:EE:01", "Kitchen");
        let b = Device::new("AA:BB:CC:DD:EE:01", "Renamed");
        let c = Device::new("AA:BB:CC:DD:EE:02", "Kitchen");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Device> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_address_case_does_not_matter() {
        let lower = Device::new(" aa:bb:cc:dd:ee:0f", "Kitchen");
        let upper = Device::new("AA:BB:CC:DD:EE:0F", "Kitchen");

        assert_eq!(lower.address(), "AA:BB:CC:DD:EE:0F");
        assert_eq!(lower, upper);
        assert_eq!(normalize_address("aa:bb:cc:dd:ee:0f\n"), "AA:BB:CC:DD:EE:0F");
    }

    #[test]
    fn test_sample_outcome() {
        assert!(SignalSample::success(-40).is_success());
        assert!(!SignalSample::error().is_success());
    }
}
