//! Build identification for the `qcal-fit` binary
//!
//! Exposes `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` to the crate via
//! `env!`, so every calibration run logs which build produced its record.

use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rustc-env=GIT_HASH={}", git_hash());
    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    println!(
        "cargo:rustc-env=BUILD_PROFILE={}",
        std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string())
    );

    println!("cargo:rerun-if-changed=build.rs");
    for path in git_head_files() {
        println!("cargo:rerun-if-changed={}", path.display());
    }
}

/// Run git and return its trimmed stdout, or `None` outside a checkout
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}

fn git_hash() -> String {
    git(&["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(|| "unknown".to_string())
}

/// `HEAD` plus the branch ref it points at, so a commit or checkout reruns the script
fn git_head_files() -> Vec<PathBuf> {
    let Some(git_dir) = git(&["rev-parse", "--git-dir"]) else {
        return Vec::new();
    };
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
    let git_dir = Path::new(&manifest_dir).join(git_dir);

    let mut files = vec![git_dir.join("HEAD")];
    // Detached HEAD resolves to the literal "HEAD" and has no ref file
    if let Some(head_ref) = git(&["rev-parse", "--symbolic-full-name", "HEAD"]) {
        let ref_file = git_dir.join(&head_ref);
        if head_ref.starts_with("refs/") && ref_file.exists() {
            files.push(ref_file);
        }
    }
    files
}
