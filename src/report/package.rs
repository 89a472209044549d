//! Packaging of the aggregate QC report.

use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use tracing::debug;
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

use crate::checks::checksum::Manifest;
use crate::tools::QcOutput;
use crate::tools::Toolbox;
use crate::utils::pathbuf::AppendExtension;

/// Name of the directory the aggregate report is moved into.
pub const REPORT_DIR: &str = "raw_multiqc_report";

/// The archive the report is compressed into.
pub fn archive_path(output_dir: &Path) -> PathBuf {
    output_dir.join(format!("{}.zip", REPORT_DIR))
}

/// Fails if packaging into `output_dir` would overwrite the report directory
/// or archive of an earlier run.
pub fn check_destinations(output_dir: &Path) -> anyhow::Result<()> {
    for path in [output_dir.join(REPORT_DIR), archive_path(output_dir)] {
        if path.exists() {
            bail!(
                "refusing to overwrite {} from an earlier run; move or remove it first",
                path.display()
            );
        }
    }

    Ok(())
}

/// Compresses `dir` into the archive at `zip_path`. Entries are stored
/// relative to the parent of `dir`, so the archive unpacks into a single
/// directory named like `dir`. The archive is written next to its final path
/// and moved into place once complete.
pub fn zip_directory(dir: &Path, zip_path: &Path) -> anyhow::Result<()> {
    let root = dir.parent().unwrap_or(dir);
    let tmp_path = zip_path.to_path_buf().append_extension("tmp")?;
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let file = File::create(&tmp_path)
        .with_context(|| format!("creating archive: {}", tmp_path.display()))?;
    let mut writer = ZipWriter::new(file);

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let path = entry.path();
        let name = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            debug!("  [*] Adding {}", name);
            writer.start_file(name, options)?;
            let mut reader =
                File::open(path).with_context(|| format!("opening {}", path.display()))?;
            io::copy(&mut reader, &mut writer)
                .with_context(|| format!("compressing {}", path.display()))?;
        }
    }

    writer
        .finish()
        .with_context(|| format!("finishing archive: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, zip_path)
        .with_context(|| format!("moving archive into place: {}", zip_path.display()))?;

    Ok(())
}

/// Moves the QC report into `<output_dir>/raw_multiqc_report`, compresses it,
/// and records the archive's digest in the run's manifest. Unless
/// `keep_intermediate` is set, the per-file QC output and the uncompressed
/// report are removed afterwards.
pub fn package_report<T>(
    qc: &QcOutput,
    output_dir: &Path,
    keep_intermediate: bool,
    tools: &T,
    manifest: &mut Manifest,
    manifest_path: &Path,
) -> anyhow::Result<PathBuf>
where
    T: Toolbox + ?Sized,
{
    // (1) Relocate the report.
    check_destinations(output_dir)?;
    let report_dir = output_dir.join(REPORT_DIR);
    fs::rename(&qc.report_dir, &report_dir).with_context(|| {
        format!(
            "moving {} to {}",
            qc.report_dir.display(),
            report_dir.display()
        )
    })?;

    // (2) Compress it.
    let zip_path = archive_path(output_dir);
    zip_directory(&report_dir, &zip_path)?;
    info!("Packaged the QC report as {}.", zip_path.display());

    // (3) Add it to the manifest.
    let digest = tools.digest(&zip_path)?;
    manifest.insert(format!("{}.zip", REPORT_DIR), digest);
    manifest.write(manifest_path)?;

    // (4) Clean up.
    if !keep_intermediate {
        for dir in [&report_dir, &qc.working_dir] {
            if dir.exists() {
                debug!("  [*] Removing {}", dir.display());
                fs::remove_dir_all(dir)
                    .with_context(|| format!("removing {}", dir.display()))?;
            }
        }
    }

    Ok(zip_path)
}
