//! Numeric normalization applied wherever a value enters a response.

/// Magnitudes below this collapse to exactly zero.
pub const ZERO_EPSILON: f64 = 1e-9;

const DECIMAL_SCALE: f64 = 1e6;

/// Canonicalize a value for the wire.
///
/// NaN and infinities become `None`; near-zero values become exactly `0.0`;
/// everything else is rounded to six decimals, ties away from zero.
pub fn normalize(value: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() < ZERO_EPSILON {
        return Some(0.0);
    }

    let scaled = value * DECIMAL_SCALE;
    if !scaled.is_finite() {
        return Some(value);
    }

    // f64::round rounds half away from zero.
    let rounded = scaled.round() / DECIMAL_SCALE;
    if rounded.abs() < ZERO_EPSILON {
        Some(0.0)
    } else {
        Some(rounded)
    }
}

/// [`normalize`] lifted over an optional value.
pub fn normalize_opt(value: Option<f64>) -> Option<f64> {
    value.and_then(normalize)
}

/// Normalize every sample of a series.
pub fn normalize_series(values: impl IntoIterator<Item = Option<f64>>) -> Vec<Option<f64>> {
    values.into_iter().map(normalize_opt).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_is_none() {
        assert_eq!(normalize(f64::NAN), None);
        assert_eq!(normalize(f64::INFINITY), None);
        assert_eq!(normalize(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_near_zero_collapses() {
        assert_eq!(normalize(1e-10), Some(0.0));
        assert_eq!(normalize(-1e-10), Some(0.0));
        assert_eq!(normalize(4e-7), Some(0.0));
        assert!(normalize(-1e-10).unwrap().is_sign_positive());
    }

    #[test]
    fn test_rounds_to_six_decimals() {
        assert_eq!(normalize(0.1234564), Some(0.123456));
        assert_eq!(normalize(2.0 / 3.0), Some(0.666667));
        assert_eq!(normalize(-2.0 / 3.0), Some(-0.666667));
        assert_eq!(normalize(12.5), Some(12.5));
    }

    #[test]
    fn test_huge_values_pass_through() {
        assert_eq!(normalize(1e305), Some(1e305));
    }

    #[test]
    fn test_normalize_series() {
        assert_eq!(
            normalize_series([Some(1.0), None, Some(f64::NAN)]),
            vec![Some(1.0), None, None]
        );
    }
}
