pub mod filter;
pub mod classifier;
pub mod observable;

use serde::{Deserialize, Serialize};

use crate::signal::classifier::{classify, QualityTier};

/// A smoothed signal value together with the tier derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalReading {
    pub value: i32,
    pub tier: QualityTier,
}

impl SignalReading {
    pub fn from_smoothed(value: i32) -> Self {
        SignalReading { value, tier: classify(value) }
    }
}
