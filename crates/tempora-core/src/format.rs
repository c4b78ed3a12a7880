//! Display rounding and formatting of aggregate values.
//!
//! Rounding goes through `rust_decimal` so that values are rounded on their
//! shortest decimal representation (half away from zero) rather than on the
//! binary expansion of the float.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places used for display values.
pub const DISPLAY_DECIMALS: u32 = 2;

/// Rounds `value` to `dp` decimal places.
///
/// Returns `None` for NaN or infinite input. Values outside the range of
/// `Decimal` are returned unrounded.
#[must_use]
pub fn round_to(value: f64, dp: u32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    match Decimal::from_f64(value) {
        Some(d) => d
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
            .to_f64(),
        None => Some(value),
    }
}

/// Formats `value` with exactly `dp` decimal places.
#[must_use]
pub fn format_fixed(value: f64, dp: u32) -> String {
    let rounded = round_to(value, dp).unwrap_or(value);
    // Avoid rendering "-0.00"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.*}", dp as usize, rounded)
}

/// Formats a percentage value, e.g. `12.35%`.
#[must_use]
pub fn format_percent(value: f64) -> String {
    format!("{}%", format_fixed(value, DISPLAY_DECIMALS))
}

/// Formats a value for display: integral for counts, two decimals otherwise.
#[must_use]
pub fn format_value(value: f64, integral: bool) -> String {
    if integral {
        format_fixed(value, 0)
    } else {
        format_fixed(value, DISPLAY_DECIMALS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.345_678, 2), Some(12.35));
        assert_eq!(round_to(0.125, 2), Some(0.13));
        assert_eq!(round_to(-1.256, 2), Some(-1.26));
        assert_eq!(round_to(f64::NAN, 2), None);
        assert_eq!(round_to(f64::INFINITY, 2), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_fixed(10.0, 2), "10.00");
        assert_eq!(format_fixed(-0.001, 2), "0.00");
        assert_eq!(format_percent(33.333_333), "33.33%");
        assert_eq!(format_value(3.0, true), "3");
        assert_eq!(format_value(3.0, false), "3.00");
    }
}
