//! Calibration configuration loading and config file resolution

use crate::fixed_point::{round_to_fixed, MAX_SHIFT};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "QCAL_CONFIG";

/// Default offset bounds used when none are configured
pub const DEFAULT_C_BOUNDS: (i64, i64) = (110, 130);

/// Floating-point estimate of the curve's leading coefficients
///
/// Only used to center the default a/b search windows; never enters evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedEstimate {
    pub a: f64,
    pub b: f64,
}

impl Default for SeedEstimate {
    fn default() -> Self {
        Self {
            a: 0.0195,
            b: -2.556,
        }
    }
}

/// Calibration run configuration
///
/// Every field has a default, so an empty TOML file is a valid config.
/// Bounds are inclusive `[lo, hi]` pairs; `None` means derive from the seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Measurement history written by the threshold oracle
    pub dataset_path: PathBuf,

    /// Coefficient record, overwritten on every successful run
    pub output_path: PathBuf,

    /// Fixed-point shift exponent (Q<shift>)
    pub shift: u32,

    /// Bucket index that is never part of the domain
    pub reserved_bucket: u32,

    /// Threshold used when neither min nor safety threshold is usable
    pub fallback_threshold: i64,

    /// Seed estimate for the default a/b windows
    pub seed: SeedEstimate,

    pub a_bounds: Option<(i64, i64)>,
    pub b_bounds: Option<(i64, i64)>,
    pub c_bounds: Option<(i64, i64)>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("threshold_optimization_results.json"),
            output_path: PathBuf::from("quadratic_coefficients.json"),
            shift: 14,
            reserved_bucket: 64,
            fallback_threshold: 79,
            seed: SeedEstimate::default(),
            a_bounds: None,
            b_bounds: None,
            c_bounds: None,
        }
    }
}

impl CalibrationConfig {
    /// Load configuration following the resolution priority:
    /// 1. Command-line argument (highest priority)
    /// 2. `QCAL_CONFIG` environment variable
    /// 3. `<user config dir>/qcal/config.toml` if it exists
    /// 4. Built-in defaults (fallback)
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CalibrationConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// a/b bounds must fit in `i32` so that the exact evaluation path
    /// (`(a*i + b) * i` in `i128`) cannot overflow. The seed only matters for
    /// an axis without explicit bounds, so only those axes check its scaled range.
    pub fn validate(&self) -> Result<()> {
        if self.shift > MAX_SHIFT {
            return Err(Error::Config(format!(
                "shift must be in 0..={}, got {}",
                MAX_SHIFT, self.shift
            )));
        }

        if !self.seed.a.is_finite() || !self.seed.b.is_finite() {
            return Err(Error::Config(format!(
                "seed must be finite, got a = {}, b = {}",
                self.seed.a, self.seed.b
            )));
        }

        for (name, value, bounds) in [
            ("seed.a", self.seed.a, self.a_bounds),
            ("seed.b", self.seed.b, self.b_bounds),
        ] {
            if bounds.is_some() {
                continue;
            }
            let fits = round_to_fixed(value, self.shift)
                .is_some_and(|center| i32::try_from(center).is_ok());
            if !fits {
                return Err(Error::Config(format!(
                    "{} = {} at Q{} exceeds the 32-bit coefficient range",
                    name, value, self.shift
                )));
            }
        }

        for (name, bounds) in [("a_bounds", self.a_bounds), ("b_bounds", self.b_bounds)] {
            if let Some((lo, hi)) = bounds {
                check_interval(name, lo, hi)?;
                if i32::try_from(lo).is_err() || i32::try_from(hi).is_err() {
                    return Err(Error::Config(format!(
                        "{} [{}, {}] exceeds the 32-bit coefficient range",
                        name, lo, hi
                    )));
                }
            }
        }

        if let Some((lo, hi)) = self.c_bounds {
            check_interval("c_bounds", lo, hi)?;
        }

        Ok(())
    }

    /// Offset bounds, falling back to [`DEFAULT_C_BOUNDS`]
    pub fn c_bounds_or_default(&self) -> (i64, i64) {
        self.c_bounds.unwrap_or(DEFAULT_C_BOUNDS)
    }
}

fn check_interval(name: &str, lo: i64, hi: i64) -> Result<()> {
    if lo > hi {
        return Err(Error::Config(format!(
            "{} is empty: lower bound {} exceeds upper bound {}",
            name, lo, hi
        )));
    }
    Ok(())
}

/// Resolve which config file to read, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory, only when present
    let user_config = default_config_path()?;
    if user_config.exists() {
        Some(user_config)
    } else {
        debug!("No user config at {}", user_config.display());
        None
    }
}

/// Platform config location (`~/.config/qcal/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("qcal").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = CalibrationConfig::default();
        assert_eq!(config.shift, 14);
        assert_eq!(config.reserved_bucket, 64);
        assert_eq!(config.fallback_threshold, 79);
        assert_eq!(config.c_bounds_or_default(), (110, 130));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("shift = 12\na_bounds = [0, 50]\n");
        let config = CalibrationConfig::from_file(file.path()).unwrap();

        assert_eq!(config.shift, 12);
        assert_eq!(config.a_bounds, Some((0, 50)));
        assert_eq!(config.b_bounds, None);
        assert_eq!(config.reserved_bucket, 64);
        assert_eq!(config.seed, SeedEstimate::default());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let file = write_config("shift = \"twelve\"");
        let err = CalibrationConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {:?}", err);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CalibrationConfig::from_file(Path::new("/nonexistent/qcal.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CalibrationConfig {
            shift: MAX_SHIFT + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.shift = 12;
        config.c_bounds = Some((130, 110));
        assert!(config.validate().is_err());

        config.c_bounds = None;
        config.b_bounds = Some((i64::from(i32::MIN) - 1, 0));
        assert!(config.validate().is_err());

        config.b_bounds = Some((-100, 0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shift_zero_is_valid() {
        let config = CalibrationConfig {
            shift: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_seed() {
        let config = CalibrationConfig {
            shift: 12,
            seed: SeedEstimate { a: -1e30, b: -2.556 },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = CalibrationConfig {
            seed: SeedEstimate { a: 0.0195, b: f64::NAN },
            b_bounds: Some((-10, 0)),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_bounds_skip_seed_range_check() {
        // Default b seed at Q30 is about -2.7e9, outside i32
        let config = CalibrationConfig {
            shift: 30,
            a_bounds: Some((0, 10)),
            b_bounds: Some((-10, 0)),
            c_bounds: Some((0, 10)),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = CalibrationConfig {
            b_bounds: None,
            ..config
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_cli_argument_wins_over_env() {
        std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");
        let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")));
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));
    }

    #[test]
    #[serial]
    fn test_env_var_used_without_cli_argument() {
        std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");
        let resolved = resolve_config_path(None);
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));
    }

    #[test]
    #[serial]
    fn test_load_through_env_var() {
        let file = write_config("reserved_bucket = 7\nfallback_threshold = 90\n");
        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let config = CalibrationConfig::load(None);
        std::env::remove_var(CONFIG_ENV_VAR);

        let config = config.unwrap();
        assert_eq!(config.reserved_bucket, 7);
        assert_eq!(config.fallback_threshold, 90);
    }
}
