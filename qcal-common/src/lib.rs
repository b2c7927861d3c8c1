//! # QCAL Common Library
//!
//! Shared code for the quadratic calibration tools:
//! - Error type and `Result` alias
//! - Calibration configuration loading and resolution
//! - Fixed-point helpers (scale, exact floor shift, real conversion)

pub mod config;
pub mod error;
pub mod fixed_point;

pub use config::{CalibrationConfig, SeedEstimate};
pub use error::{Error, Result};
