/// Folds a raw sample into the previous smoothed value.
///
/// The first sample after a (re)connect seeds the filter as-is. After that every sample gets the
/// same weight as the accumulated history: `(previous + raw) / 2`, truncated toward zero like integer
/// division, so `-15.5` becomes `-15`.
pub fn smooth(previous: Option<i32>, raw: i32) -> i32 {
    match previous {
        None => raw,
        Some(previous) => {
            let sum = i64::from(previous) + i64::from(raw);
            // the average of two i32 values always fits in an i32
            (sum / 2) as i32
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smooth_all(raw: &[i32]) -> Vec<i32> {
        let mut smoothed = None;
        raw.iter()
            .map(|&value| {
                let next = smooth(smoothed, value);
                smoothed = Some(next);
                next
            })
            .collect()
    }

    #[test]
    fn test_first_sample_seeds_the_filter() {
        assert_eq!(smooth(None, -57), -57);
    }

    #[test]
    fn test_equal_weight_average() {
        assert_eq!(smooth_all(&[-40, -20, -10]), vec![-40, -30, -20]);
    }

    #[test]
    fn test_halves_truncate_toward_zero() {
        assert_eq!(smooth(Some(-21), -10), -15);
        assert_eq!(smooth(Some(-20), -11), -15);
        assert_eq!(smooth(Some(3), 0), 1);
        assert_eq!(smooth(Some(-1), 0), 0);

        // -10.5 lands on -10, the weakest Great value
        assert_eq!(smooth(Some(-11), -10), -10);
    }

    #[test]
    fn test_recurrence_holds_for_every_prefix() {
        let raw = [-70, -65, -30, -31, -90, -12, 0, 4];
        let smoothed = smooth_all(&raw);

        assert_eq!(smoothed[0], raw[0]);
        for k in 1..raw.len() {
            let expected = ((f64::from(smoothed[k - 1]) + f64::from(raw[k])) / 2.0).trunc() as i32;
            assert_eq!(smoothed[k], expected, "k = {}", k);
        }
    }

    #[test]
    fn test_extremes_do_not_overflow() {
        assert_eq!(smooth(Some(i32::MIN), i32::MIN), i32::MIN);
        assert_eq!(smooth(Some(i32::MAX), i32::MAX), i32::MAX);
        assert_eq!(smooth(Some(i32::MIN), i32::MAX), 0);
    }
}
