//! The seam between the validation pipeline and the external tools it drives.
//!
//! Every external invocation (archive test, digest, checksum verification,
//! quality control) goes through [`Toolbox`]. Invocations block, are attempted
//! exactly once and are never retried. An `Err` from any method means the tool
//! could not be run at all, which aborts the run; a tool that ran and reported
//! a failure is an `Ok` carrying that failure.

pub mod native;
pub mod process;

use std::path::Path;
use std::path::PathBuf;

use crate::checks::checksum::Manifest;
use crate::metrics::QcTableLayout;

pub use self::native::NativeToolbox;
pub use self::process::ProcessToolbox;

/// Where the quality control tools left their output.
#[derive(Clone, Debug)]
pub struct QcOutput {
    /// The table holding per-file read counts.
    pub counts_table: PathBuf,

    /// The table holding per-file read lengths.
    pub lengths_table: PathBuf,

    /// The aggregate report directory that gets packaged.
    pub report_dir: PathBuf,

    /// Intermediate per-file QC output.
    pub working_dir: PathBuf,
}

/// The external tools the pipeline depends on.
pub trait Toolbox {
    /// Tests the integrity of a compressed archive. `Ok(true)` means the
    /// archive passed.
    fn test_archive(&self, path: &Path) -> anyhow::Result<bool>;

    /// Computes the hex digest of a file.
    fn digest(&self, path: &Path) -> anyhow::Result<String>;

    /// Verifies every entry of the manifest against the files in `dir`,
    /// returning a `<filename>: <OK|FAILED>` line per entry.
    fn verify_manifest(&self, dir: &Path, manifest: &Manifest) -> anyhow::Result<String>;

    /// Runs quality control over the given files, writing into `out_dir`.
    fn run_qc(
        &self,
        files: &[PathBuf],
        out_dir: &Path,
        threads: usize,
        layout: &QcTableLayout,
    ) -> anyhow::Result<QcOutput>;
}
