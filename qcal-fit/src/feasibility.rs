//! Minimal feasible offset for one `(a_fp, b_fp)` cell
//!
//! `required_c = max(c_lo, max_i(threshold_i - base_i))`, accumulated bucket by
//! bucket. The cell is abandoned as soon as `required_c` exceeds `c_hi`; that
//! early exit is what keeps the full 2-D enumeration tractable.
//!
//! Base values are consumed lazily and kept, so the pruning pass and the final
//! margin computation read the same evaluated numbers (a single formula path).
//! Buckets after the abandoning one are never evaluated.

use crate::bounds::Interval;
use crate::{Error, Result};

/// Offset and per-bucket results of a feasible cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fit {
    /// Smallest offset in bounds that overapproximates every bucket
    pub c: i64,

    /// `base_i + c`
    pub approximations: Vec<i128>,

    /// `approximation_i - threshold_i`, all non-negative
    pub margins: Vec<i128>,
}

/// Find the minimal feasible offset, or `None` if no offset in `c_bounds` works
///
/// `bases` must yield exactly one value per threshold, in bucket order.
///
/// # Errors
/// `Error::InternalConsistency` if the base count does not match or a
/// constructed margin is negative. Neither can happen for correct arithmetic,
/// so both abort the run rather than skipping the cell.
pub fn fit_offset<I>(bases: I, thresholds: &[i64], c_bounds: Interval<i64>) -> Result<Option<Fit>>
where
    I: IntoIterator<Item = i128>,
{
    let c_hi = i128::from(c_bounds.hi);
    let mut required_c = i128::from(c_bounds.lo);
    let mut evaluated = Vec::with_capacity(thresholds.len());
    let mut bases = bases.into_iter();

    for &threshold in thresholds {
        let base = bases.next().ok_or_else(|| {
            Error::InternalConsistency(format!(
                "{} base values for {} thresholds",
                evaluated.len(),
                thresholds.len()
            ))
        })?;
        required_c = required_c.max(i128::from(threshold) - base);
        if required_c > c_hi {
            return Ok(None);
        }
        evaluated.push(base);
    }

    if bases.next().is_some() {
        return Err(Error::InternalConsistency(format!(
            "more base values than the {} thresholds",
            thresholds.len()
        )));
    }

    let c = i64::try_from(required_c).map_err(|_| {
        Error::InternalConsistency(format!("offset {} outside {}", required_c, c_bounds))
    })?;

    let approximations: Vec<i128> = evaluated.iter().map(|&base| base + required_c).collect();
    let margins: Vec<i128> = approximations
        .iter()
        .zip(thresholds)
        .map(|(&approx, &threshold)| approx - i128::from(threshold))
        .collect();

    if let Some((index, margin)) = margins.iter().enumerate().find(|(_, m)| **m < 0) {
        return Err(Error::InternalConsistency(format!(
            "negative margin {} at position {} with c = {}",
            margin, index, c
        )));
    }

    Ok(Some(Fit {
        c,
        approximations,
        margins,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn bounds(lo: i64, hi: i64) -> Interval<i64> {
        Interval::new(lo, hi).unwrap()
    }

    #[test]
    fn test_minimal_offset() {
        let fit = fit_offset(vec![10, 20, 30], &[15, 22, 31], bounds(0, 100))
            .unwrap()
            .unwrap();

        // Largest deficit is bucket 0: 15 - 10 = 5
        assert_eq!(fit.c, 5);
        assert_eq!(fit.approximations, vec![15, 25, 35]);
        assert_eq!(fit.margins, vec![0, 3, 4]);
    }

    #[test]
    fn test_pinned_at_lower_bound() {
        let fit = fit_offset(vec![100, 100], &[50, 60], bounds(7, 20)).unwrap().unwrap();
        assert_eq!(fit.c, 7);
        assert_eq!(fit.margins, vec![57, 47]);
    }

    #[test]
    fn test_exact_upper_bound_is_feasible() {
        let fit = fit_offset(vec![0], &[20], bounds(0, 20)).unwrap().unwrap();
        assert_eq!(fit.c, 20);
        assert_eq!(fit.margins, vec![0]);
    }

    #[test]
    fn test_infeasible() {
        assert_eq!(fit_offset(vec![0, 0], &[5, 21], bounds(0, 20)).unwrap(), None);
    }

    #[test]
    fn test_negative_bases() {
        let fit = fit_offset(vec![-3, -1], &[79, 77], bounds(0, 130)).unwrap().unwrap();
        assert_eq!(fit.c, 82);
        assert_eq!(fit.margins, vec![0, 4]);
    }

    #[test]
    fn test_abandons_before_evaluating_remaining_buckets() {
        let evaluated = Cell::new(0);
        let bases = [0i128, 0, 0, 0].into_iter().inspect(|_| evaluated.set(evaluated.get() + 1));

        let result = fit_offset(bases, &[1, 50, 1, 1], bounds(0, 10)).unwrap();

        assert_eq!(result, None);
        assert_eq!(evaluated.get(), 2, "should stop at the second bucket");
    }

    #[test]
    fn test_short_base_sequence_is_internal_error() {
        let err = fit_offset(vec![0], &[1, 2], bounds(0, 10)).unwrap_err();
        assert!(matches!(err, Error::InternalConsistency(_)));
    }

    #[test]
    fn test_long_base_sequence_is_internal_error() {
        let err = fit_offset(vec![0, 0, 0], &[1, 2], bounds(0, 10)).unwrap_err();
        assert!(matches!(err, Error::InternalConsistency(_)));
    }

    #[test]
    fn test_decrementing_offset_breaks_some_bucket() {
        let bases = vec![4, -9, 12, 0];
        let thresholds: [i64; 4] = [30, 20, 41, 28];
        let fit = fit_offset(bases.clone(), &thresholds, bounds(0, 100)).unwrap().unwrap();

        let c = i128::from(fit.c - 1);
        assert!(bases
            .iter()
            .zip(&thresholds)
            .any(|(&base, &t)| base + c < i128::from(t)));
    }
}
