/**
 * How often (milliseconds) to sample the signal strength of a device that is not under observation.
 */
pub const SCAN_INTERVAL: u64 = 2000;

/**
 * How often (milliseconds) to sample the signal strength of a device in the observation set.
 */
pub const OBSERVE_INTERVAL: u64 = 500;

/**
 * How long (milliseconds) a connect request may take before it counts as failed.
 */
pub const CONNECT_DEADLINE: u64 = 10000;

/**
 * How long (milliseconds) a single signal strength read may take.
 */
pub const READ_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) to scan before looking up a peripheral that is not yet known to the adapter.
 */
pub const DISCOVERY_DELAY: u64 = 2000;

/**
 * Shortest allowed gap (milliseconds) between two signal strength reads of the same device.
 */
pub const MIN_INTERVAL: u64 = 50;
