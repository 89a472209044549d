//! Checksum manifests: validating a supplied one or generating a new one.
//!
//! A manifest is plain text, one `<digest><whitespace><filename>` entry per
//! line. Manifests are always written in the `md5sum` layout (two spaces
//! between digest and filename), so anything written here can be fed straight
//! back into `md5sum -c`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::bail;
use anyhow::Context;
use indexmap::IndexMap;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::samples::record::Field;
use crate::samples::record::ProblemFiles;
use crate::samples::record::SampleSet;
use crate::samples::record::SkipReason;
use crate::tools::Toolbox;
use crate::utils::display::file_progress;
use crate::utils::pathbuf::AppendExtension;

//==========//
// Manifest //
//==========//

/// An ordered mapping from filename to digest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: IndexMap<String, String>,
}

impl Manifest {
    /// Adds (or replaces) the digest for a filename.
    pub fn insert(&mut self, filename: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(filename.into(), digest.into());
    }

    /// The digest recorded for a filename.
    pub fn get(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(|d| d.as_str())
    }

    /// Whether the manifest has an entry for the filename.
    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(filename, digest)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    /// Reads a manifest from disk.
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Manifest> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading checksum manifest: {}", path.display()))?;
        contents
            .parse()
            .with_context(|| format!("parsing checksum manifest: {}", path.display()))
    }

    /// Writes the manifest to disk, replacing any existing file only once the
    /// new contents are completely written.
    pub fn write(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let tmp = PathBuf::from(path)
            .append_extension("tmp")
            .with_context(|| format!("constructing temporary path for {}", path.display()))?;

        fs::write(&tmp, self.to_string())
            .with_context(|| format!("writing checksum manifest: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("moving checksum manifest into place: {}", path.display()))?;

        Ok(())
    }
}

impl FromStr for Manifest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut manifest = Manifest::default();

        for (i, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (digest, filename) = match line.split_once(char::is_whitespace) {
                Some((d, f)) => (d, f.trim_start()),
                None => bail!("line {}: expected `<digest> <filename>`", i + 1),
            };

            if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                bail!("line {}: not a hex digest: {}", i + 1, digest);
            }

            // `md5sum -b` marks binary mode with a leading `*`, and manifests
            // are sometimes written from a parent directory.
            let filename = filename.strip_prefix('*').unwrap_or(filename);
            let filename = Path::new(filename)
                .file_name()
                .and_then(|f| f.to_str())
                .with_context(|| format!("line {}: no filename", i + 1))?;

            manifest.insert(filename, digest.to_lowercase());
        }

        Ok(manifest)
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (filename, digest) in &self.entries {
            writeln!(f, "{}  {}", digest, filename)?;
        }
        Ok(())
    }
}

//=====================//
// Verification report //
//=====================//

/// The per-file verdicts of a checksum verification run, parsed from
/// `<filename>: <OK|FAILED>` lines.
#[derive(Debug, Default)]
pub struct VerificationReport(HashMap<String, bool>);

impl VerificationReport {
    /// Parses a report. Lines not in the `<filename>: <status>` shape (e.g.,
    /// trailing warnings) are ignored.
    pub fn parse(report: &str) -> Self {
        let verdicts = report
            .lines()
            .filter_map(|line| line.rsplit_once(": "))
            .map(|(filename, status)| (filename.to_string(), status.trim() == "OK"))
            .collect();
        VerificationReport(verdicts)
    }

    /// Whether the file passed. A file missing from the report did not.
    pub fn passed(&self, filename: &str) -> bool {
        self.0.get(filename).copied().unwrap_or(false)
    }
}

//================//
// Reconciliation //
//================//

/// How checksums are obtained for this run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Validate the files against a supplied manifest.
    Validate(PathBuf),

    /// Compute new digests.
    Generate,
}

/// Records a checksum (or the reason for its absence) on every file, then
/// writes the run's manifest to `output` under the current filenames. Files
/// in `problems` are never digested or verified and never appear in the
/// written manifest.
pub fn reconcile<T>(
    dir: &Path,
    samples: &mut SampleSet,
    problems: &ProblemFiles,
    tools: &T,
    mode: &ChecksumMode,
    output: &Path,
) -> anyhow::Result<Manifest>
where
    T: Toolbox + ?Sized,
{
    let manifest = match mode {
        ChecksumMode::Validate(supplied) => validate(dir, samples, problems, tools, supplied)?,
        ChecksumMode::Generate => generate(dir, samples, problems, tools)?,
    };

    manifest.write(output)?;
    info!(
        "Wrote {} checksums to {}.",
        manifest.len(),
        output.display()
    );

    Ok(manifest)
}

fn validate<T>(
    dir: &Path,
    samples: &mut SampleSet,
    problems: &ProblemFiles,
    tools: &T,
    supplied: &Path,
) -> anyhow::Result<Manifest>
where
    T: Toolbox + ?Sized,
{
    info!("Validating checksums against {}.", supplied.display());
    let supplied = Manifest::read(supplied)?;

    // (1) Translate the supplied entries to the current filenames.
    let mut pending = Manifest::default();
    for file in samples.files_mut() {
        if problems.contains(&file.current_name) {
            file.checksum = Some(Field::Skipped(SkipReason::ChecksumMismatch));
            continue;
        }

        let digest = supplied
            .get(&file.record.filename)
            .or_else(|| supplied.get(&file.current_name));

        match digest {
            Some(d) => pending.insert(file.current_name.clone(), d),
            None => {
                warn!(
                    "{} has no entry in the supplied checksum manifest.",
                    file.record.filename
                );
                file.checksum = Some(Field::Skipped(SkipReason::MissingFromManifest));
            }
        }
    }

    // (2) Verify.
    let report = match pending.is_empty() {
        true => VerificationReport::default(),
        false => VerificationReport::parse(&tools.verify_manifest(dir, &pending)?),
    };

    // (3) Record the verdicts.
    for file in samples.files_mut() {
        if let Some(digest) = pending.get(&file.current_name) {
            file.checksum = Some(match report.passed(&file.current_name) {
                true => {
                    debug!("  [*] {}: OK", file.current_name);
                    Field::Value(digest.to_string())
                }
                false => {
                    warn!("{} failed the checksum check.", file.current_name);
                    Field::Skipped(SkipReason::ChecksumMismatch)
                }
            });
        }
    }

    Ok(pending)
}

fn generate<T>(
    dir: &Path,
    samples: &mut SampleSet,
    problems: &ProblemFiles,
    tools: &T,
) -> anyhow::Result<Manifest>
where
    T: Toolbox + ?Sized,
{
    info!("Generating checksums.");

    let mut manifest = Manifest::default();
    let pb = file_progress(samples.num_files() as u64, "Digesting");

    for file in samples.files_mut() {
        if problems.contains(&file.current_name) {
            debug!("  [*] {}: skipped, failed integrity test", file.current_name);
            file.checksum = Some(Field::Skipped(SkipReason::IntegrityFailure));
        } else {
            let digest = tools.digest(&dir.join(&file.current_name))?;
            manifest.insert(file.current_name.clone(), digest.clone());
            file.checksum = Some(Field::Value(digest));
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    use crate::samples::mapper::map_samples;
    use crate::samples::pattern::NamingConvention;
    use crate::tools::NativeToolbox;
    use crate::utils::args::ReadLayout;

    const NAMES: [&str; 4] = [
        "A_R1_raw.fastq.gz",
        "A_R2_raw.fastq.gz",
        "B_R1_raw.fastq.gz",
        "B_R2_raw.fastq.gz",
    ];

    fn setup() -> (TempDir, SampleSet) {
        let dir = TempDir::new().unwrap();
        for (i, name) in NAMES.iter().enumerate() {
            let file = fs::File::create(dir.path().join(name)).unwrap();
            let mut encoder = GzEncoder::new(file, Compression::default());
            writeln!(encoder, "@read{}\nACGT\n+\nIIII", i).unwrap();
            encoder.finish().unwrap();
        }

        let samples =
            map_samples(&NAMES, 2, ReadLayout::Paired, &NamingConvention::default()).unwrap();
        (dir, samples)
    }

    #[test]
    fn test_parse_manifest() {
        let manifest: Manifest = "\
            900150983CD24FB0D6963F7D28E17F72  A_R1.fastq.gz\n\
            \n\
            d41d8cd98f00b204e9800998ecf8427e *raw/A_R2.fastq.gz\n\
            0cc175b9c0f1b6a831c399e269772661\tB_R1.fastq.gz\n"
            .parse()
            .unwrap();

        assert_eq!(manifest.len(), 3);
        assert_eq!(
            manifest.get("A_R1.fastq.gz"),
            Some("900150983cd24fb0d6963f7d28e17f72")
        );
        assert_eq!(
            manifest.get("A_R2.fastq.gz"),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert!(manifest.contains("B_R1.fastq.gz"));
    }

    #[test]
    fn test_malformed_manifest() {
        assert!("justonetoken\n".parse::<Manifest>().is_err());
        assert!("not-hex A.fastq.gz\n".parse::<Manifest>().is_err());
    }

    #[test]
    fn test_manifest_written_in_md5sum_layout() {
        let mut manifest = Manifest::default();
        manifest.insert("A_R1_raw.fastq.gz", "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            manifest.to_string(),
            "900150983cd24fb0d6963f7d28e17f72  A_R1_raw.fastq.gz\n"
        );
    }

    #[test]
    fn test_verification_report() {
        let report = VerificationReport::parse(
            "A.fastq.gz: OK\nB.fastq.gz: FAILED\nC.fastq.gz: FAILED open or read\n\
             md5sum: WARNING: 1 computed checksum did NOT match\n",
        );
        assert!(report.passed("A.fastq.gz"));
        assert!(!report.passed("B.fastq.gz"));
        assert!(!report.passed("C.fastq.gz"));
        assert!(!report.passed("D.fastq.gz"));
    }

    #[test]
    fn test_generate_skips_problem_files() {
        let (dir, mut samples) = setup();
        let mut problems = ProblemFiles::default();
        problems.insert("B_R2_raw.fastq.gz");
        let output = dir.path().join("md5sums.txt");

        let manifest = reconcile(
            dir.path(),
            &mut samples,
            &problems,
            &NativeToolbox::default(),
            &ChecksumMode::Generate,
            &output,
        )
        .unwrap();

        assert_eq!(manifest.len(), 3);
        assert!(!manifest.contains("B_R2_raw.fastq.gz"));

        let written = Manifest::read(&output).unwrap();
        assert_eq!(written, manifest);

        let b = samples.get("B").unwrap();
        assert!(matches!(b.files[0].checksum, Some(Field::Value(_))));
        assert_eq!(
            b.files[1].checksum,
            Some(Field::Skipped(SkipReason::IntegrityFailure))
        );
    }

    #[test]
    fn test_checksum_round_trip() {
        let (dir, mut samples) = setup();
        let problems = ProblemFiles::default();
        let generated = dir.path().join("generated.txt");
        let tools = NativeToolbox::default();

        reconcile(
            dir.path(),
            &mut samples,
            &problems,
            &tools,
            &ChecksumMode::Generate,
            &generated,
        )
        .unwrap();

        let mut fresh = samples.clone();
        for file in fresh.files_mut() {
            file.checksum = None;
        }

        reconcile(
            dir.path(),
            &mut fresh,
            &problems,
            &tools,
            &ChecksumMode::Validate(generated.clone()),
            &dir.path().join("regenerated.txt"),
        )
        .unwrap();

        assert!(fresh
            .files()
            .all(|f| matches!(f.checksum, Some(Field::Value(_)))));
    }

    #[test]
    fn test_validate_records_failures() {
        let (dir, mut samples) = setup();
        let tools = NativeToolbox::default();

        let mut supplied = Manifest::default();
        for name in &NAMES[..3] {
            supplied.insert(*name, tools.digest(&dir.path().join(name)).unwrap());
        }
        supplied.insert("A_R2_raw.fastq.gz", "00000000000000000000000000000000");
        supplied.insert("B_R1_raw.fastq.gz", "00000000000000000000000000000000");
        let supplied_path = dir.path().join("supplied.txt");
        supplied.write(&supplied_path).unwrap();

        let mut problems = ProblemFiles::default();
        problems.insert("B_R1_raw.fastq.gz");
        let output = dir.path().join("regenerated.txt");

        let manifest = reconcile(
            dir.path(),
            &mut samples,
            &problems,
            &tools,
            &ChecksumMode::Validate(supplied_path),
            &output,
        )
        .unwrap();

        let checksums: Vec<String> = samples
            .files()
            .map(|f| f.checksum.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(checksums[0], supplied.get("A_R1_raw.fastq.gz").unwrap());
        assert_eq!(checksums[1], "failed-md5-check");
        assert_eq!(checksums[2], "failed-md5-check");
        assert_eq!(checksums[3], "missing-from-md5-file");

        assert!(!manifest.contains("B_R1_raw.fastq.gz"));
        assert!(manifest.contains("A_R2_raw.fastq.gz"));
    }

    #[test]
    fn test_validate_translates_original_names() {
        let dir = TempDir::new().unwrap();
        let tools = NativeToolbox::default();
        for name in ["C.fq.gz", "C_raw.fastq.gz"] {
            let file = fs::File::create(dir.path().join(name)).unwrap();
            let mut encoder = GzEncoder::new(file, Compression::default());
            writeln!(encoder, "@read\nACGT\n+\nIIII").unwrap();
            encoder.finish().unwrap();
        }

        let mut samples =
            map_samples(&["C.fq.gz"], 1, ReadLayout::Single, &NamingConvention::default())
                .unwrap();
        // Simulate the normalizer having renamed the file.
        fs::remove_file(dir.path().join("C.fq.gz")).unwrap();
        for file in samples.files_mut() {
            file.current_name = String::from("C_raw.fastq.gz");
        }

        let mut supplied = Manifest::default();
        supplied.insert(
            "C.fq.gz",
            tools.digest(&dir.path().join("C_raw.fastq.gz")).unwrap(),
        );
        let supplied_path = dir.path().join("supplied.txt");
        supplied.write(&supplied_path).unwrap();

        let manifest = reconcile(
            dir.path(),
            &mut samples,
            &ProblemFiles::default(),
            &tools,
            &ChecksumMode::Validate(supplied_path),
            &dir.path().join("out.txt"),
        )
        .unwrap();

        assert!(manifest.contains("C_raw.fastq.gz"));
        assert!(samples
            .files()
            .all(|f| matches!(f.checksum, Some(Field::Value(_)))));
    }
}
