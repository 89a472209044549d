//! A [`Toolbox`] that tests archives and computes digests in-process.
//!
//! Archive tests decode the whole (possibly multi-member) gzip stream with
//! `flate2`; digests are MD5 via the `md-5` crate. Reports are rendered in
//! exactly the format `md5sum -c` uses, so both toolboxes are
//! interchangeable. Quality control still has to be run externally and is
//! delegated to a [`ProcessToolbox`].

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use flate2::read::MultiGzDecoder;
use md5::Digest;
use md5::Md5;
use tracing::debug;

use super::ProcessToolbox;
use super::QcOutput;
use super::Toolbox;
use crate::checks::checksum::Manifest;
use crate::metrics::QcTableLayout;

const BUFFER_SIZE: usize = 64 * 1024;

/// Tests archives and computes digests without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct NativeToolbox {
    /// Used for the quality control step only.
    pub qc: ProcessToolbox,
}

impl Toolbox for NativeToolbox {
    fn test_archive(&self, path: &Path) -> anyhow::Result<bool> {
        match gzip_test(path) {
            Ok(passed) => Ok(passed),
            Err(e) => {
                debug!("  [*] gzip test of {} failed: {}", path.display(), e);
                Ok(false)
            }
        }
    }

    fn digest(&self, path: &Path) -> anyhow::Result<String> {
        md5_hex(path).with_context(|| format!("computing MD5 of {}", path.display()))
    }

    fn verify_manifest(&self, dir: &Path, manifest: &Manifest) -> anyhow::Result<String> {
        let mut report = String::new();

        for (filename, expected) in manifest.iter() {
            let status = match md5_hex(dir.join(filename)) {
                Ok(actual) if actual.eq_ignore_ascii_case(expected) => "OK",
                Ok(_) => "FAILED",
                Err(_) => "FAILED open or read",
            };
            report.push_str(&format!("{}: {}\n", filename, status));
        }

        Ok(report)
    }

    fn run_qc(
        &self,
        files: &[PathBuf],
        out_dir: &Path,
        threads: usize,
        layout: &QcTableLayout,
    ) -> anyhow::Result<QcOutput> {
        self.qc.run_qc(files, out_dir, threads, layout)
    }
}

/// Decodes the entire gzip stream, discarding the output. An empty file is
/// not a valid archive.
fn gzip_test(path: &Path) -> io::Result<bool> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }

    let mut decoder = MultiGzDecoder::new(BufReader::new(file));
    io::copy(&mut decoder, &mut io::sink())?;
    Ok(true)
}

/// Streams the file through MD5 and returns the lowercase hex digest.
pub fn md5_hex(path: impl AsRef<Path>) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
