//! Fixed-point polynomial evaluation
//!
//! `base(i) = floor(((a_fp * i + b_fp) * i) / 2^shift)`
//!
//! Coefficients are `i32` and buckets `u32`, so every intermediate fits in
//! `i128` without overflow: `|a*i + b| < 2^64` and `|(a*i + b) * i| < 2^96`.
//! No floating point is involved.

use crate::dataset::Bucket;
use qcal_common::fixed_point::floor_shift;

/// The `a`-dependent term `a_fp * bucket`
///
/// Depends only on `a_fp`, so the search computes it once per `a` and reuses
/// it across the whole `b` sweep.
pub fn partial_term(bucket: Bucket, a_fp: i32) -> i128 {
    i128::from(a_fp) * i128::from(bucket)
}

/// Finish the base value from a precomputed [`partial_term`]
pub fn base_from_partial(partial: i128, bucket: Bucket, b_fp: i32, shift: u32) -> i128 {
    let inner = partial + i128::from(b_fp);
    floor_shift(inner * i128::from(bucket), shift)
}

/// Base polynomial value for one bucket
pub fn base_value(bucket: Bucket, a_fp: i32, b_fp: i32, shift: u32) -> i128 {
    base_from_partial(partial_term(bucket, a_fp), bucket, b_fp, shift)
}
