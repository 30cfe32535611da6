use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    Great,
    Good,
    Fair,
    Weak,
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            QualityTier::Great => "Great",
            QualityTier::Good => "Good",
            QualityTier::Fair => "Fair",
            QualityTier::Weak => "Weak",
        };

        write!(f, "{}", result)
    }
}

/// Maps a smoothed signal value to its tier. Anything outside the explicit bands, including values
/// above 0, is `Weak`.
pub fn classify(value: i32) -> QualityTier {
    match value {
        -10..=0 => QualityTier::Great,
        -30..=-11 => QualityTier::Good,
        -60..=-31 => QualityTier::Fair,
        _ => QualityTier::Weak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(classify(0), QualityTier::Great);
        assert_eq!(classify(-10), QualityTier::Great);
        assert_eq!(classify(-11), QualityTier::Good);
        assert_eq!(classify(-30), QualityTier::Good);
        assert_eq!(classify(-31), QualityTier::Fair);
        assert_eq!(classify(-60), QualityTier::Fair);
        assert_eq!(classify(-61), QualityTier::Weak);
    }

    #[test]
    fn test_out_of_range_falls_back_to_weak() {
        assert_eq!(classify(1), QualityTier::Weak);
        assert_eq!(classify(20), QualityTier::Weak);
        assert_eq!(classify(-127), QualityTier::Weak);
        assert_eq!(classify(i32::MIN), QualityTier::Weak);
        assert_eq!(classify(i32::MAX), QualityTier::Weak);
    }

    #[test]
    fn test_tiers_are_monotonic() {
        let rank = |tier: QualityTier| match tier {
            QualityTier::Great => 3,
            QualityTier::Good => 2,
            QualityTier::Fair => 1,
            QualityTier::Weak => 0,
        };

        let mut previous = rank(classify(-200));
        for value in -199..=0 {
            let current = rank(classify(value));
            assert!(current >= previous, "tier dropped at {}", value);
            previous = current;
        }
    }
}
