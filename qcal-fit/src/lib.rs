//! # QCAL Fit Library (qcal-fit)
//!
//! Calibrates integer fixed-point quadratic coefficients that overapproximate a
//! measured per-bucket threshold curve while minimizing the average waste.
//!
//! The burned-in form evaluated for bucket `i` is
//! `floor(((a_fp * i + b_fp) * i) / 2^shift) + c`.
//!
//! **Pipeline:** dataset → lattice search (evaluator + feasibility builder per
//! cell) → report/persist.

pub mod bounds;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod feasibility;
pub mod report;
pub mod search;

pub use bounds::{Interval, SearchBounds};
pub use dataset::{Bucket, Dataset, LoadPolicy, ThresholdRecord, ThresholdStatus};
pub use error::{Error, Result};
pub use report::{CliFormatter, CoefficientRecord};
pub use search::{find_best_fixed_point, Candidate, SearchOutcome, SearchStats};
