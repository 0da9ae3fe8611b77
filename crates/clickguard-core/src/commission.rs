//! Commission arithmetic
//!
//! Commission rules belong to billing; the pipeline only needs the payable amount
//! to attach to a conversion and to the partner webhook.

/// Payable commission in minor units for `amount` at `rate_percent` percent.
///
/// Rounds half away from zero. Negative or non-finite rates yield zero.
pub fn commission_for(amount: i64, rate_percent: f64) -> i64 {
    if !rate_percent.is_finite() || rate_percent < 0.0 {
        log::warn!("Ignoring invalid commission rate {}", rate_percent);
        return 0;
    }

    ((amount as f64) * rate_percent / 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_basic() {
        assert_eq!(commission_for(10_000, 10.0), 1_000);
        assert_eq!(commission_for(0, 25.0), 0);
    }

    #[test]
    fn test_commission_rounds_half_away_from_zero() {
        // 12.5% of 1_005 = 125.625
        assert_eq!(commission_for(1_005, 12.5), 126);
        // 5% of 10 = 0.5
        assert_eq!(commission_for(10, 5.0), 1);
    }

    #[test]
    fn test_commission_invalid_rate() {
        assert_eq!(commission_for(10_000, -5.0), 0);
        assert_eq!(commission_for(10_000, f64::NAN), 0);
    }
}
