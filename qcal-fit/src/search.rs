//! Coefficient lattice search
//!
//! **Purpose:** Enumerate every `(a_fp, b_fp)` cell inside the bounds, find the
//! minimal feasible offset per cell, and keep the best candidate.
//!
//! **Enumeration order:** `a_fp` ascending, then `b_fp` ascending. The
//! a-dependent term `a_fp * i` is computed once per `a_fp` and reused for the
//! whole `b_fp` sweep.
//!
//! **Ranking:** lower average margin wins; ties go to the lower maximum
//! margin; remaining ties keep the earlier cell. The bucket count is fixed for
//! one search, so averages are compared through exact margin sums.

use crate::bounds::SearchBounds;
use crate::dataset::Dataset;
use crate::evaluator::{base_from_partial, partial_term};
use crate::feasibility::{fit_offset, Fit};
use crate::{Error, Result};
use qcal_common::fixed_point::{to_real, MAX_SHIFT};
use tracing::{debug, info};

/// A feasible coefficient triple and its per-bucket results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub a_fp: i32,
    pub b_fp: i32,
    pub c: i64,
    pub shift: u32,

    /// `base_i + c` per bucket
    pub approximations: Vec<i128>,

    /// `approximation_i - threshold_i` per bucket, all non-negative
    pub margins: Vec<i128>,

    pub margin_sum: i128,
    pub min_margin: i128,
    pub max_margin: i128,
}

impl Candidate {
    fn from_fit(a_fp: i32, b_fp: i32, shift: u32, fit: Fit) -> Self {
        let margin_sum = fit.margins.iter().sum();
        let min_margin = fit.margins.iter().copied().min().unwrap_or(0);
        let max_margin = fit.margins.iter().copied().max().unwrap_or(0);

        Self {
            a_fp,
            b_fp,
            c: fit.c,
            shift,
            approximations: fit.approximations,
            margins: fit.margins,
            margin_sum,
            min_margin,
            max_margin,
        }
    }

    /// Average margin (display and persistence only; ranking uses `margin_sum`)
    pub fn avg_margin(&self) -> f64 {
        if self.margins.is_empty() {
            return 0.0;
        }
        self.margin_sum as f64 / self.margins.len() as f64
    }

    /// Real value of `a_fp`
    pub fn a(&self) -> f64 {
        to_real(i64::from(self.a_fp), self.shift)
    }

    /// Real value of `b_fp`
    pub fn b(&self) -> f64 {
        to_real(i64::from(self.b_fp), self.shift)
    }

    /// Strictly better than `other` under the ranking
    ///
    /// Equal rank returns false, so the earlier candidate is kept.
    pub fn outranks(&self, other: &Candidate) -> bool {
        (self.margin_sum, self.max_margin) < (other.margin_sum, other.max_margin)
    }
}

/// Lattice counters for one search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Cells enumerated
    pub cells_visited: u64,

    /// Cells abandoned because the required offset exceeded the bound
    pub cells_pruned: u64,

    /// Cells with a feasible offset
    pub feasible_cells: u64,
}

/// Result of one search
///
/// `best` is `None` when no cell in bounds is feasible; the caller may widen
/// the bounds and retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub best: Option<Candidate>,
    pub stats: SearchStats,
}

/// Search the whole lattice for the best fixed-point candidate
///
/// The best-so-far accumulator is local to this call.
///
/// # Errors
/// - `Error::Common` if `shift` is outside `0..=MAX_SHIFT`
/// - `Error::InternalConsistency` if a constructed candidate is not an
///   overapproximation
pub fn find_best_fixed_point(
    dataset: &Dataset,
    shift: u32,
    bounds: &SearchBounds,
) -> Result<SearchOutcome> {
    if shift > MAX_SHIFT {
        return Err(Error::Common(qcal_common::Error::InvalidInput(format!(
            "shift must be in 0..={}, got {}",
            MAX_SHIFT, shift
        ))));
    }

    info!(
        "Searching shift={} (Q{}) with a in {}, b in {}, c in {} ({} cells)",
        shift,
        shift,
        bounds.a,
        bounds.b,
        bounds.c,
        bounds.cell_count()
    );

    let buckets = dataset.buckets();
    let thresholds = dataset.thresholds();

    let mut best: Option<Candidate> = None;
    let mut stats = SearchStats::default();

    for a_fp in bounds.a.iter() {
        let partials: Vec<i128> = buckets
            .iter()
            .map(|&bucket| partial_term(bucket, a_fp))
            .collect();

        for b_fp in bounds.b.iter() {
            stats.cells_visited += 1;

            let bases = buckets
                .iter()
                .zip(&partials)
                .map(|(&bucket, &partial)| base_from_partial(partial, bucket, b_fp, shift));

            let fit = match fit_offset(bases, thresholds, bounds.c)? {
                Some(fit) => fit,
                None => {
                    stats.cells_pruned += 1;
                    continue;
                }
            };
            stats.feasible_cells += 1;

            let candidate = Candidate::from_fit(a_fp, b_fp, shift, fit);
            let supersedes = match &best {
                None => true,
                Some(current) => candidate.outranks(current),
            };

            if supersedes {
                debug!(
                    "New best: a_fp={} b_fp={} c={} avg_margin={:.6} max_margin={}",
                    candidate.a_fp,
                    candidate.b_fp,
                    candidate.c,
                    candidate.avg_margin(),
                    candidate.max_margin
                );
                best = Some(candidate);
            }
        }
    }

    info!(
        "Search complete: {} cells visited, {} pruned, {} feasible",
        stats.cells_visited, stats.cells_pruned, stats.feasible_cells
    );

    Ok(SearchOutcome { best, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Interval;

    fn bounds(a: (i32, i32), b: (i32, i32), c: (i64, i64)) -> SearchBounds {
        SearchBounds::new(
            Interval::new(a.0, a.1).unwrap(),
            Interval::new(b.0, b.1).unwrap(),
            Interval::new(c.0, c.1).unwrap(),
        )
    }

    fn candidate(margins: Vec<i128>) -> Candidate {
        let fit = Fit {
            c: 0,
            approximations: margins.clone(),
            margins,
        };
        Candidate::from_fit(0, 0, 12, fit)
    }

    #[test]
    fn test_ranking_prefers_lower_average() {
        let low = candidate(vec![1, 1, 1]);
        let high = candidate(vec![0, 0, 4]);
        assert!(low.outranks(&high));
        assert!(!high.outranks(&low));
    }

    #[test]
    fn test_ranking_tie_breaks_on_max_margin() {
        let flat = candidate(vec![2, 2, 2]);
        let spiky = candidate(vec![0, 0, 6]);
        assert!(flat.outranks(&spiky));
        assert!(!spiky.outranks(&flat));
    }

    #[test]
    fn test_equal_rank_does_not_outrank() {
        let first = candidate(vec![1, 3]);
        let second = candidate(vec![3, 1]);
        assert!(!first.outranks(&second));
        assert!(!second.outranks(&first));
    }

    #[test]
    fn test_candidate_statistics() {
        let c = candidate(vec![0, 3, 4]);
        assert_eq!(c.margin_sum, 7);
        assert_eq!(c.min_margin, 0);
        assert_eq!(c.max_margin, 4);
        assert!((c.avg_margin() - 7.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_real_coefficients() {
        let fit = Fit {
            c: 1,
            approximations: vec![],
            margins: vec![],
        };
        let c = Candidate::from_fit(2048, -6144, 12, fit);
        assert_eq!(c.a(), 0.5);
        assert_eq!(c.b(), -1.5);
    }

    #[test]
    fn test_exact_line_has_zero_margin() {
        // threshold(i) = i, reachable with a_fp = 0, b_fp = 2^12, c = 0
        let dataset = Dataset::from_pairs(&[(10, 10), (20, 20), (30, 30)]).unwrap();
        let outcome = find_best_fixed_point(&dataset, 12, &bounds((0, 2), (4096, 4100), (0, 5))).unwrap();

        let best = outcome.best.unwrap();
        assert_eq!(best.margin_sum, 0);
        assert_eq!((best.a_fp, best.b_fp, best.c), (0, 4096, 0));
        assert_eq!(outcome.stats.cells_visited, 3 * 5);
    }

    #[test]
    fn test_no_feasible_cell_returns_none() {
        let dataset = Dataset::from_pairs(&[(16, 500), (17, 500)]).unwrap();
        let outcome = find_best_fixed_point(&dataset, 12, &bounds((0, 3), (-3, 0), (0, 10))).unwrap();

        assert!(outcome.best.is_none());
        assert_eq!(outcome.stats.cells_visited, 16);
        assert_eq!(outcome.stats.cells_pruned, 16);
        assert_eq!(outcome.stats.feasible_cells, 0);
    }

    #[test]
    fn test_earliest_cell_wins_full_tie() {
        // Bucket 1 at shift 12: every small a/b yields base 0, so all cells tie
        let dataset = Dataset::from_pairs(&[(1, 5)]).unwrap();
        let outcome = find_best_fixed_point(&dataset, 12, &bounds((3, 6), (7, 9), (0, 10))).unwrap();

        let best = outcome.best.unwrap();
        assert_eq!((best.a_fp, best.b_fp, best.c), (3, 7, 5));
    }

    #[test]
    fn test_invalid_shift() {
        let dataset = Dataset::from_pairs(&[(1, 5)]).unwrap();
        let b = bounds((0, 0), (0, 0), (0, 10));
        assert!(find_best_fixed_point(&dataset, MAX_SHIFT + 1, &b).is_err());
        assert!(find_best_fixed_point(&dataset, MAX_SHIFT, &b).is_ok());
    }

    #[test]
    fn test_shift_zero_is_plain_integer_quadratic() {
        // base = (1*3 + 0) * 3 = 9, so c = 10 - 9 = 1
        let dataset = Dataset::from_pairs(&[(3, 10)]).unwrap();
        let b = bounds((1, 1), (0, 0), (0, 5));
        let best = find_best_fixed_point(&dataset, 0, &b).unwrap().best.unwrap();

        assert_eq!((best.a_fp, best.b_fp, best.c), (1, 0, 1));
        assert_eq!(best.approximations, vec![10]);
        assert_eq!(best.margins, vec![0]);
    }
}
