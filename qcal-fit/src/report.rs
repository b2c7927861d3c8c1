//! Report generation and coefficient persistence
//!
//! **Purpose:** Render the winning candidate for the terminal and write the
//! machine-readable coefficient record. The record file is overwritten on
//! every run; no history is kept here.

use crate::bounds::SearchBounds;
use crate::dataset::Bucket;
use crate::search::{Candidate, SearchStats};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "======================================================================";

/// Persisted coefficient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRecord {
    /// Integer form burned into the estimator
    pub fixed_point: FixedPointSection,

    /// Real-valued form for humans
    pub coefficients: CoefficientSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedPointSection {
    pub shift: u32,
    pub a_fp: i32,
    pub b_fp: i32,
    pub c: i64,
    pub avg_margin: f64,
    pub min_margin: i128,
    pub max_margin: i128,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSection {
    pub a: f64,
    pub b: f64,
    pub c: i64,
}

impl From<&Candidate> for CoefficientRecord {
    fn from(candidate: &Candidate) -> Self {
        Self {
            fixed_point: FixedPointSection {
                shift: candidate.shift,
                a_fp: candidate.a_fp,
                b_fp: candidate.b_fp,
                c: candidate.c,
                avg_margin: candidate.avg_margin(),
                min_margin: candidate.min_margin,
                max_margin: candidate.max_margin,
            },
            coefficients: CoefficientSection {
                a: candidate.a(),
                b: candidate.b(),
                c: candidate.c,
            },
        }
    }
}

impl CoefficientRecord {
    /// Write the record as pretty JSON, replacing any existing file
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Read a record back from disk
    pub fn import_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let record: CoefficientRecord = serde_json::from_reader(file)?;
        Ok(record)
    }
}

/// CLI formatter for calibration results
pub struct CliFormatter;

impl CliFormatter {
    /// Boxed section title
    pub fn format_banner(title: &str) -> String {
        format!("{}\n{}\n{}", RULE, title, RULE)
    }

    /// Example: `Searching Q14: a in [255, 383], b in [-42390, -41366], c in [110, 130] (132225 cells)`
    pub fn format_search_header(shift: u32, bounds: &SearchBounds) -> String {
        format!(
            "Searching Q{}: a in {}, b in {}, c in {} ({} cells)",
            shift,
            bounds.a,
            bounds.b,
            bounds.c,
            bounds.cell_count()
        )
    }

    /// Resolved bucket/threshold table
    pub fn format_dataset<I>(rows: I) -> String
    where
        I: IntoIterator<Item = (Bucket, i64)>,
    {
        let mut output = String::from("Bucket | Threshold\n-------|----------\n");
        for (bucket, threshold) in rows {
            output.push_str(&format!("{:6} | {:9}\n", bucket, threshold));
        }
        output
    }

    /// Lattice counters
    pub fn format_stats(stats: &SearchStats) -> String {
        format!(
            "Cells: {} visited, {} pruned, {} feasible",
            stats.cells_visited, stats.cells_pruned, stats.feasible_cells
        )
    }

    /// Full solution display: coefficients, margins, summary, assembly snippet
    pub fn format_solution(candidate: &Candidate, buckets: &[Bucket]) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{}\n\n",
            Self::format_banner(&format!("BEST Q{} FIXED-POINT QUADRATIC", candidate.shift))
        ));

        output.push_str(&format!(
            "a_fp = {} ({})  ->  a = {:.12}\n",
            candidate.a_fp,
            hex_signed(i64::from(candidate.a_fp)),
            candidate.a()
        ));
        output.push_str(&format!(
            "b_fp = {} (abs = 0x{:x})  ->  b = {:.12}\n",
            candidate.b_fp,
            candidate.b_fp.unsigned_abs(),
            candidate.b()
        ));
        output.push_str(&format!("c    = {}\n", candidate.c));

        output.push_str("\nMargins (approx - threshold):\n");
        for (bucket, margin) in buckets.iter().zip(&candidate.margins) {
            output.push_str(&format!("  bucket {:2}: {}\n", bucket, margin));
        }

        output.push_str("\nSummary:\n");
        output.push_str(&format!("  Min margin  : {}\n", candidate.min_margin));
        output.push_str(&format!("  Max margin  : {}\n", candidate.max_margin));
        output.push_str(&format!("  Avg margin  : {:.6}\n", candidate.avg_margin()));

        output.push_str("\nAssembly snippet (use SAR for signed shift):\n");
        output.push_str(&Self::format_asm_snippet(candidate));

        output
    }

    /// EVM assembly for the burned-in evaluation
    ///
    /// A negative `b_fp` is emitted as `sub` of its magnitude; the final shift
    /// is `sar` so negative intermediates floor like the search assumed.
    pub fn format_asm_snippet(candidate: &Candidate) -> String {
        let a_hex = hex_signed(i64::from(candidate.a_fp));
        let b_abs_hex = format!("0x{:x}", candidate.b_fp.unsigned_abs());

        let inner_line = if candidate.b_fp >= 0 {
            format!("let inner := add(mul({}, i), {})", a_hex, b_abs_hex)
        } else {
            format!("let inner := sub(mul({}, i), {})", a_hex, b_abs_hex)
        };

        format!(
            "```solidity\n{}  // (a*i + b) in Q{}\nlet threshold := add(sar({}, mul(i, inner)), {})\n```\n",
            inner_line, candidate.shift, candidate.shift, candidate.c
        )
    }
}

/// Hex with an explicit sign instead of two's complement
fn hex_signed(value: i64) -> String {
    if value < 0 {
        format!("-0x{:x}", value.unsigned_abs())
    } else {
        format!("0x{:x}", value)
    }
}
