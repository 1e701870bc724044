//! Ranges of the fixed-point and integer fields used by color paint formats.
//!
//! See <https://learn.microsoft.com/en-us/typography/opentype/spec/otff#data-types>

pub const MIN_INT16: f64 = i16::MIN as f64;
pub const MAX_INT16: f64 = i16::MAX as f64;

pub const MIN_UINT16: f64 = 0.0;
pub const MAX_UINT16: f64 = u16::MAX as f64;

/// Smallest value an F2Dot14 can hold
pub const MIN_F2DOT14: f64 = -2.0;
/// Largest value an F2Dot14 can hold, 1.99993896484375
pub const MAX_F2DOT14: f64 = i16::MAX as f64 / (1 << 14) as f64;

/// Smallest value a 16.16 Fixed can hold
pub const MIN_FIXED: f64 = i16::MIN as f64;
/// Largest value a 16.16 Fixed can hold
pub const MAX_FIXED: f64 = i32::MAX as f64 / (1 << 16) as f64;

const EPSILON: f64 = 1e-9;

/// Compare floats with a small absolute tolerance.
pub fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

/// True if every value is an integer that fits an int16 (FWORD).
pub fn int16_safe(values: &[f64]) -> bool {
    values
        .iter()
        .all(|v| almost_equal(*v, v.round()) && (MIN_INT16..=MAX_INT16).contains(v))
}

/// True if every value is an integer that fits a uint16 (UFWORD).
pub fn uint16_safe(values: &[f64]) -> bool {
    values
        .iter()
        .all(|v| almost_equal(*v, v.round()) && (MIN_UINT16..=MAX_UINT16).contains(v))
}

pub fn f2dot14_safe(values: &[f64]) -> bool {
    values
        .iter()
        .all(|v| (MIN_F2DOT14..=MAX_F2DOT14).contains(v))
}

/// Angles are stored as F2Dot14 in units of 180 degrees.
pub fn f2dot14_rotation_safe(degrees: &[f64]) -> bool {
    degrees
        .iter()
        .all(|v| (MIN_F2DOT14..=MAX_F2DOT14).contains(&(v / 180.0)))
}

pub fn fixed_safe(values: &[f64]) -> bool {
    values.iter().all(|v| (MIN_FIXED..=MAX_FIXED).contains(v))
}
