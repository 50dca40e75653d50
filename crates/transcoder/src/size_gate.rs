//! Size Gate Module
//!
//! Post-transcode check that stops the batch when an output grew past its source.

/// Result of the size gate check
#[derive(Debug, Clone, PartialEq)]
pub enum SizeGateResult {
    /// Output is within the allowed ratio
    Accept { ratio: f64 },
    /// Output exceeds `original * max_ratio`
    Reject {
        original_bytes: u64,
        output_bytes: u64,
        ratio: f64,
    },
}

impl SizeGateResult {
    /// Output size divided by original size.
    pub fn ratio(&self) -> f64 {
        match self {
            SizeGateResult::Accept { ratio } | SizeGateResult::Reject { ratio, .. } => *ratio,
        }
    }
}

/// Output size divided by original size; infinite for an empty original.
pub fn size_ratio(original_bytes: u64, output_bytes: u64) -> f64 {
    if original_bytes == 0 {
        return if output_bytes == 0 { 1.0 } else { f64::INFINITY };
    }
    output_bytes as f64 / original_bytes as f64
}

/// Check if the output file size passes the size gate.
///
/// Returns `Reject` if `output_bytes > original_bytes * max_ratio`,
/// otherwise returns `Accept`. An output exactly at the threshold passes.
pub fn check_size_gate(original_bytes: u64, output_bytes: u64, max_ratio: f64) -> SizeGateResult {
    let ratio = size_ratio(original_bytes, output_bytes);

    if output_bytes as f64 > original_bytes as f64 * max_ratio {
        SizeGateResult::Reject {
            original_bytes,
            output_bytes,
            ratio,
        }
    } else {
        SizeGateResult::Accept { ratio }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_larger_output_rejected() {
        let result = check_size_gate(1000, 1100, 1.0);
        assert_eq!(
            result,
            SizeGateResult::Reject {
                original_bytes: 1000,
                output_bytes: 1100,
                ratio: 1.1,
            }
        );
    }

    #[test]
    fn test_equal_size_accepted() {
        assert_eq!(check_size_gate(1000, 1000, 1.0), SizeGateResult::Accept { ratio: 1.0 });
    }

    #[test]
    fn test_custom_ratio() {
        assert!(matches!(check_size_gate(1000, 950, 0.9), SizeGateResult::Reject { .. }));
        assert!(matches!(check_size_gate(1000, 850, 0.9), SizeGateResult::Accept { .. }));
    }

    #[test]
    fn test_empty_original() {
        assert_eq!(size_ratio(0, 0), 1.0);
        assert!(size_ratio(0, 10).is_infinite());
        assert!(matches!(check_size_gate(0, 10, 1.0), SizeGateResult::Reject { .. }));
    }

    // Property: Reject exactly when the output exceeds the threshold.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_size_gate_threshold(
            original_bytes in 1u64..=1u64 << 40,
            output_bytes in 0u64..=1u64 << 40,
            max_ratio in 0.01f64..=2.0f64,
        ) {
            let result = check_size_gate(original_bytes, output_bytes, max_ratio);
            let threshold = original_bytes as f64 * max_ratio;

            match result {
                SizeGateResult::Accept { ratio } => {
                    prop_assert!(output_bytes as f64 <= threshold,
                        "Accept returned but output_bytes ({}) > threshold ({})",
                        output_bytes, threshold);
                    prop_assert_eq!(ratio, output_bytes as f64 / original_bytes as f64);
                }
                SizeGateResult::Reject { original_bytes: orig, output_bytes: out, .. } => {
                    prop_assert!(output_bytes as f64 > threshold,
                        "Reject returned but output_bytes ({}) <= threshold ({})",
                        output_bytes, threshold);
                    prop_assert_eq!(orig, original_bytes);
                    prop_assert_eq!(out, output_bytes);
                }
            }
        }
    }
}
