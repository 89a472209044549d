//! A [`Toolbox`] that shells out to the standard command line tools:
//! `gzip`, `md5sum`, `fastqc` and `multiqc`.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use anyhow::bail;
use anyhow::Context;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::QcOutput;
use super::Toolbox;
use crate::checks::checksum::Manifest;
use crate::metrics::QcTableLayout;

/// Name of the directory the per-file FastQC output is written to.
pub const FASTQC_WORKING_DIR: &str = "raw_fastqc_output";

/// Name given to the MultiQC report.
pub const MULTIQC_REPORT_NAME: &str = "raw_multiqc";

/// Runs each tool as a child process.
#[derive(Clone, Debug)]
pub struct ProcessToolbox {
    /// Program used to test gzip integrity.
    pub gzip: String,

    /// Program used to compute and verify MD5 digests.
    pub md5sum: String,

    /// Program used for per-file quality control.
    pub fastqc: String,

    /// Program used to aggregate per-file quality control.
    pub multiqc: String,
}

impl Default for ProcessToolbox {
    fn default() -> Self {
        ProcessToolbox {
            gzip: String::from("gzip"),
            md5sum: String::from("md5sum"),
            fastqc: String::from("fastqc"),
            multiqc: String::from("multiqc"),
        }
    }
}

impl Toolbox for ProcessToolbox {
    fn test_archive(&self, path: &Path) -> anyhow::Result<bool> {
        let output = Command::new(&self.gzip)
            .arg("-t")
            .arg(path)
            .output()
            .with_context(|| format!("running `{} -t` on {}", self.gzip, path.display()))?;

        if !output.status.success() {
            debug!(
                "  [*] {} -t {}: {}",
                self.gzip,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output.status.success())
    }

    fn digest(&self, path: &Path) -> anyhow::Result<String> {
        let output = Command::new(&self.md5sum)
            .arg(path)
            .output()
            .with_context(|| format!("running `{}` on {}", self.md5sum, path.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {} for {}: {}",
                self.md5sum,
                output.status,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_digest_output(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("parsing `{}` output for {}", self.md5sum, path.display()))
    }

    fn verify_manifest(&self, dir: &Path, manifest: &Manifest) -> anyhow::Result<String> {
        // The manifest goes through a file rather than stdin; `output()` then
        // drains stdout and stderr together, so large manifests cannot stall
        // on a full pipe.
        let mut listing = tempfile::Builder::new()
            .prefix("rawcheck-")
            .suffix(".md5")
            .tempfile()
            .context("creating temporary manifest")?;
        listing
            .write_all(manifest.to_string().as_bytes())
            .and_then(|_| listing.flush())
            .context("writing temporary manifest")?;

        // A nonzero exit only means that at least one entry failed; the
        // per-file verdicts are in the report itself.
        let output = Command::new(&self.md5sum)
            .arg("-c")
            .arg(listing.path())
            .current_dir(dir)
            .output()
            .with_context(|| format!("running `{} -c`", self.md5sum))?;
        debug!("  [*] {} -c exited with {}", self.md5sum, output.status);

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_qc(
        &self,
        files: &[PathBuf],
        out_dir: &Path,
        threads: usize,
        layout: &QcTableLayout,
    ) -> anyhow::Result<QcOutput> {
        let working_dir = out_dir.join(FASTQC_WORKING_DIR);
        fs::create_dir_all(&working_dir)
            .with_context(|| format!("creating {}", working_dir.display()))?;

        info!("Running {} on {} files.", self.fastqc, files.len());
        let status = Command::new(&self.fastqc)
            .arg("-q")
            .arg("-t")
            .arg(threads.to_string())
            .arg("-o")
            .arg(&working_dir)
            .args(files)
            .status()
            .with_context(|| format!("running `{}`", self.fastqc))?;
        if !status.success() {
            // One unreadable file fails the whole invocation; the reports for
            // the others are still aggregated.
            warn!(
                "{} exited with {}; files without a report will be missing from the QC output.",
                self.fastqc, status
            );
        }

        let report_dir = out_dir.join(format!("{}_output", MULTIQC_REPORT_NAME));
        info!("Running {} over {}.", self.multiqc, working_dir.display());
        let status = Command::new(&self.multiqc)
            .args(["-q", "-f", "--interactive", "-n", MULTIQC_REPORT_NAME, "-o"])
            .arg(&report_dir)
            .arg(&working_dir)
            .status()
            .with_context(|| format!("running `{}`", self.multiqc))?;
        if !status.success() {
            bail!("{} exited with {}", self.multiqc, status);
        }

        let data_dir = report_dir.join(format!("{}_data", MULTIQC_REPORT_NAME));
        Ok(QcOutput {
            counts_table: data_dir.join(&layout.counts_table),
            lengths_table: data_dir.join(&layout.lengths_table),
            report_dir,
            working_dir,
        })
    }
}

/// Pulls the digest out of `md5sum`-style output (`<digest>  <filename>`).
pub fn parse_digest_output(output: &str) -> anyhow::Result<String> {
    match output.split_whitespace().next() {
        Some(digest) if digest.chars().all(|c| c.is_ascii_hexdigit()) => {
            Ok(digest.to_lowercase())
        }
        Some(other) => bail!("not a hex digest: {}", other),
        None => bail!("no digest in output"),
    }
}
