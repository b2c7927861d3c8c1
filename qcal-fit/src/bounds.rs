//! Search bounds for the coefficient lattice
//!
//! All intervals are inclusive. Default a/b windows are derived from a
//! floating-point seed estimate rounded to Q<shift>:
//! - window = max(32, 2^shift / 256)
//! - a ∈ [max(0, a_center - window), a_center + window]
//! - b ∈ [b_center - 8·window, b_center + 8·window] (b is less sensitive)

use crate::{Error, Result};
use qcal_common::fixed_point::{round_to_fixed, scale, MAX_SHIFT};
use qcal_common::{CalibrationConfig, SeedEstimate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Minimum half-width of the default a window
pub const MIN_SEED_WINDOW: i64 = 32;

/// b window is this many a windows wide
pub const B_WINDOW_FACTOR: i64 = 8;

/// Inclusive integer interval `[lo, hi]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval<T> {
    pub lo: T,
    pub hi: T,
}

impl<T: PartialOrd + Copy + fmt::Display> Interval<T> {
    /// Create a non-empty interval
    pub fn new(lo: T, hi: T) -> Result<Self> {
        if lo > hi {
            return Err(Error::Common(qcal_common::Error::InvalidInput(format!(
                "empty interval [{}, {}]",
                lo, hi
            ))));
        }
        Ok(Self { lo, hi })
    }
}

impl Interval<i32> {
    /// Ascending enumeration of every value
    pub fn iter(&self) -> RangeInclusive<i32> {
        self.lo..=self.hi
    }

    pub fn width(&self) -> u64 {
        (i64::from(self.hi) - i64::from(self.lo) + 1) as u64
    }
}

impl Interval<i64> {
    /// Narrow an `i64` interval to coefficient width
    pub fn to_coefficient(self, name: &str) -> Result<Interval<i32>> {
        let lo = i32::try_from(self.lo);
        let hi = i32::try_from(self.hi);
        match (lo, hi) {
            (Ok(lo), Ok(hi)) => Interval::new(lo, hi),
            _ => Err(Error::Common(qcal_common::Error::InvalidInput(format!(
                "{} bounds {} exceed the 32-bit coefficient range",
                name, self
            )))),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

impl<T: PartialOrd + Copy + fmt::Display> TryFrom<(T, T)> for Interval<T> {
    type Error = Error;

    fn try_from((lo, hi): (T, T)) -> Result<Self> {
        Interval::new(lo, hi)
    }
}

/// Bounds of the `(a_fp, b_fp)` lattice plus the offset interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBounds {
    pub a: Interval<i32>,
    pub b: Interval<i32>,
    pub c: Interval<i64>,
}

impl SearchBounds {
    pub fn new(a: Interval<i32>, b: Interval<i32>, c: Interval<i64>) -> Self {
        Self { a, b, c }
    }

    /// Default a/b windows centered on a seed estimate
    pub fn around_seed(seed: SeedEstimate, shift: u32, c: Interval<i64>) -> Result<Self> {
        let a = seed_a_window(seed.a, shift)?;
        let b = seed_b_window(seed.b, shift)?;
        Ok(Self { a, b, c })
    }

    /// Bounds from configuration; explicit bounds override each axis independently
    ///
    /// The seed window of an axis is only derived when that axis has no
    /// explicit bounds.
    pub fn from_config(config: &CalibrationConfig) -> Result<Self> {
        let a = match config.a_bounds {
            Some(pair) => Interval::try_from(pair)?.to_coefficient("a")?,
            None => seed_a_window(config.seed.a, config.shift)?,
        };
        let b = match config.b_bounds {
            Some(pair) => Interval::try_from(pair)?.to_coefficient("b")?,
            None => seed_b_window(config.seed.b, config.shift)?,
        };
        let c = Interval::try_from(config.c_bounds_or_default())?;

        Ok(Self { a, b, c })
    }

    /// Number of lattice cells
    pub fn cell_count(&self) -> u64 {
        self.a.width() * self.b.width()
    }
}

/// Half-width of the default a window for a shift
pub fn seed_window(shift: u32) -> i64 {
    let scaled = (scale(shift) / 256) as i64;
    MIN_SEED_WINDOW.max(scaled)
}

/// `[max(0, center - window), center + window]`
fn seed_a_window(seed: f64, shift: u32) -> Result<Interval<i32>> {
    let center = seed_center("a", seed, shift)?;
    let window = seed_window(shift);
    let lo = center.checked_sub(window).map(|lo| lo.max(0));
    let hi = center.checked_add(window);
    window_interval("a", seed, shift, lo, hi)
}

/// `[center - 8·window, center + 8·window]`
fn seed_b_window(seed: f64, shift: u32) -> Result<Interval<i32>> {
    let center = seed_center("b", seed, shift)?;
    let half = seed_window(shift).checked_mul(B_WINDOW_FACTOR);
    let lo = half.and_then(|half| center.checked_sub(half));
    let hi = half.and_then(|half| center.checked_add(half));
    window_interval("b", seed, shift, lo, hi)
}

fn seed_center(name: &str, seed: f64, shift: u32) -> Result<i64> {
    if shift > MAX_SHIFT {
        return Err(Error::Common(qcal_common::Error::InvalidInput(format!(
            "shift must be in 0..={}, got {}",
            MAX_SHIFT, shift
        ))));
    }
    round_to_fixed(seed, shift).ok_or_else(|| unrepresentable_seed(name, seed, shift))
}

fn window_interval(
    name: &str,
    seed: f64,
    shift: u32,
    lo: Option<i64>,
    hi: Option<i64>,
) -> Result<Interval<i32>> {
    match (lo, hi) {
        (Some(lo), Some(hi)) => Interval::new(lo, hi)?.to_coefficient(name),
        _ => Err(unrepresentable_seed(name, seed, shift)),
    }
}

fn unrepresentable_seed(name: &str, seed: f64, shift: u32) -> Error {
    Error::Common(qcal_common::Error::InvalidInput(format!(
        "{} seed {} has no Q{} window in the 64-bit range",
        name, seed, shift
    )))
}
