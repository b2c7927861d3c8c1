//! Fixed-point (Q<shift>) helpers
//!
//! A real coefficient `x` is encoded as the signed integer `round(x * 2^shift)`.
//! All evaluation happens on the integer side; conversion back to `f64` is only
//! used for display and for the persisted record.
//!
//! Division by `2^shift` is always floor division (rounds toward negative
//! infinity), matching an arithmetic right shift (`SAR`) on two's complement.

/// Largest supported shift exponent
pub const MAX_SHIFT: u32 = 32;

/// `2^shift` as an exact integer
pub fn scale(shift: u32) -> i128 {
    1i128 << shift
}

/// Exact `floor(numerator / 2^shift)`
///
/// `div_euclid` with a positive divisor is floor division, so negative
/// numerators round toward negative infinity instead of toward zero.
pub fn floor_shift(numerator: i128, shift: u32) -> i128 {
    numerator.div_euclid(scale(shift))
}

/// Real value of a Q<shift> integer
pub fn to_real(value_fp: i64, shift: u32) -> f64 {
    value_fp as f64 / scale(shift) as f64
}

/// Encode a real value as Q<shift>, rounding halves to even
///
/// `None` if the value is not finite or the scaled value does not fit `i64`.
pub fn round_to_fixed(value: f64, shift: u32) -> Option<i64> {
    let scaled = (value * scale(shift) as f64).round_ties_even();
    // i64::MAX as f64 rounds up to 2^63, which itself is out of range
    if scaled.is_finite() && scaled >= i64::MIN as f64 && scaled < i64::MAX as f64 {
        Some(scaled as i64)
    } else {
        None
    }
}
