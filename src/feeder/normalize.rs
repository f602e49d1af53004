//! Timestamp alignment to the oracle resolution

/// Smallest multiple of `resolution` that is `>= timestamp`.
///
/// Aligned timestamps are returned unchanged. A zero resolution disables
/// alignment.
pub fn normalize_timestamp(timestamp: u64, resolution: u64) -> u64 {
    if resolution == 0 {
        return timestamp;
    }
    timestamp.div_ceil(resolution) * resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOLUTION: u64 = 600;

    #[test]
    fn aligned_timestamp_is_unchanged() {
        assert_eq!(normalize_timestamp(0, RESOLUTION), 0);
        assert_eq!(normalize_timestamp(1_700_000_400, RESOLUTION), 1_700_000_400);
    }

    #[test]
    fn rounds_up_to_next_bucket() {
        assert_eq!(normalize_timestamp(1, RESOLUTION), 600);
        assert_eq!(normalize_timestamp(599, RESOLUTION), 600);
        assert_eq!(normalize_timestamp(601, RESOLUTION), 1200);
        assert_eq!(normalize_timestamp(12_345_678, RESOLUTION), 12_346_200);
    }

    #[test]
    fn bucket_properties_hold() {
        let samples = (0..5_000u64)
            .map(|i| i * 7_919 + (i % 13))
            .chain([1_699_999_999, 1_700_000_000, 1_700_000_001, u32::MAX as u64]);
        for t in samples {
            let n = normalize_timestamp(t, RESOLUTION);
            assert_eq!(n % RESOLUTION, 0, "t={t}");
            assert!(n >= t, "t={t}");
            assert!(n - t < RESOLUTION, "t={t}");
            assert_eq!(normalize_timestamp(n, RESOLUTION), n, "t={t}");
        }
    }

    #[test]
    fn zero_resolution_disables_alignment() {
        assert_eq!(normalize_timestamp(123, 0), 123);
    }
}
