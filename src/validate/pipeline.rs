//! The validation pipeline: every stage, in order, over one read directory.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use num_format::Locale;
use num_format::ToFormattedString;
use tracing::info;
use tracing::warn;

use super::config::Config;
use crate::checks::checksum::reconcile;
use crate::checks::checksum::ChecksumMode;
use crate::checks::integrity::check_integrity;
use crate::metrics::aggregate;
use crate::metrics::QcTable;
use crate::report::package::check_destinations;
use crate::report::package::package_report;
use crate::report::summary::write_summary;
use crate::report::summary::RunReport;
use crate::samples::mapper::map_samples;
use crate::samples::normalize::normalize;
use crate::samples::record::ProblemFiles;
use crate::samples::record::SampleSet;
use crate::tools::Toolbox;
use crate::utils::pathbuf::list_filenames;

/// Everything a finished run produced.
#[derive(Debug)]
pub struct PipelineResult {
    /// The fully annotated samples.
    pub samples: SampleSet,

    /// Files that failed the integrity test.
    pub problems: ProblemFiles,

    /// The report that was written alongside the summary table.
    pub report: RunReport,
}

/// Runs the whole pipeline. Any `Err` aborts the run; per-file failures are
/// recorded on the samples and reflected in the report's outcome instead.
pub fn run<T>(config: &Config, tools: &T) -> anyhow::Result<PipelineResult>
where
    T: Toolbox + ?Sized,
{
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;

    // (1) Infer the samples and make sure the report can be packaged.
    // Nothing has been touched if this fails.
    check_destinations(&config.output_dir)?;
    let filenames = list_filenames(&config.reads_dir)?;
    let mut samples = map_samples(
        &filenames,
        config.sample_count,
        config.layout,
        &config.convention,
    )?;
    info!(
        "Found {} {} samples ({} files).",
        samples.len().to_formatted_string(&Locale::en),
        config.layout,
        samples.num_files().to_formatted_string(&Locale::en)
    );

    // (2) Normalize the filenames.
    let renamed = normalize(&config.reads_dir, &mut samples, &config.suffixes)?;

    // (3) Test the archives.
    let mut problems = ProblemFiles::default();
    check_integrity(&config.reads_dir, &mut samples, &mut problems, tools)?;

    // (4) Reconcile checksums.
    let mode = match &config.manifest {
        Some(path) => ChecksumMode::Validate(path.clone()),
        None => ChecksumMode::Generate,
    };
    let manifest_path = config.manifest_path();
    let mut manifest = reconcile(
        &config.reads_dir,
        &mut samples,
        &problems,
        tools,
        &mode,
        &manifest_path,
    )?;

    // (5) Run QC over the files that can be read.
    let qc_files: Vec<PathBuf> = samples
        .files()
        .filter(|f| !problems.contains(&f.current_name))
        .map(|f| config.reads_dir.join(&f.current_name))
        .collect();

    let qc = match qc_files.is_empty() {
        true => {
            warn!("No file passed the integrity test; skipping QC.");
            None
        }
        false => match tools.run_qc(
            &qc_files,
            &config.output_dir,
            config.threads,
            &config.qc_layout,
        ) {
            Ok(qc) => Some(qc),
            Err(e) => {
                warn!("QC failed, continuing without QC metrics: {:#}", e);
                None
            }
        },
    };

    // (6) Merge the QC metrics back in.
    let (counts, lengths) = match &qc {
        Some(qc) => (read_table(&qc.counts_table)?, read_table(&qc.lengths_table)?),
        None => (QcTable::default(), QcTable::default()),
    };
    aggregate(
        &mut samples,
        &problems,
        &counts,
        &lengths,
        &config.qc_layout,
        config.convention.extensions(),
    )?;

    // (7) Package the QC report.
    let qc_archive = match &qc {
        Some(qc) if qc.report_dir.exists() => Some(package_report(
            qc,
            &config.output_dir,
            config.keep_intermediate,
            tools,
            &mut manifest,
            &manifest_path,
        )?),
        _ => None,
    };

    // (8) Write the summary and the report.
    let summary_path = config.summary_path();
    write_summary(&summary_path, &samples)?;
    info!("Wrote the summary table to {}.", summary_path.display());

    let report = RunReport::new(&samples, renamed, summary_path, manifest_path, qc_archive);
    let report_path = config.report_path();
    report.write(&report_path)?;
    info!("Wrote the run report to {}.", report_path.display());

    Ok(PipelineResult {
        samples,
        problems,
        report,
    })
}

/// Reads a QC table. A table the QC tool never wrote is treated as empty, so
/// every file it should have held is reported as missing.
fn read_table(path: &Path) -> anyhow::Result<QcTable> {
    match path.exists() {
        true => QcTable::read(path),
        false => {
            warn!("QC table not found: {}", path.display());
            Ok(QcTable::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    use crate::checks::checksum::Manifest;
    use crate::errors::ValidationError;
    use crate::metrics::QcTableLayout;
    use crate::report::summary::Outcome;
    use crate::samples::record::Field;
    use crate::samples::record::SkipReason;
    use crate::tools::native::md5_hex;
    use crate::tools::NativeToolbox;
    use crate::tools::QcOutput;
    use crate::utils::args::ReadLayout;

    /// Native archive and digest tools, plus a QC step that writes fixture
    /// tables with one row per file it was given (or fails outright).
    #[derive(Default)]
    struct FixtureQc {
        native: NativeToolbox,
        seen: RefCell<Vec<String>>,
        fail: bool,
    }

    impl Toolbox for FixtureQc {
        fn test_archive(&self, path: &Path) -> anyhow::Result<bool> {
            self.native.test_archive(path)
        }

        fn digest(&self, path: &Path) -> anyhow::Result<String> {
            self.native.digest(path)
        }

        fn verify_manifest(&self, dir: &Path, manifest: &Manifest) -> anyhow::Result<String> {
            self.native.verify_manifest(dir, manifest)
        }

        fn run_qc(
            &self,
            files: &[PathBuf],
            out_dir: &Path,
            _: usize,
            layout: &QcTableLayout,
        ) -> anyhow::Result<QcOutput> {
            if self.fail {
                anyhow::bail!("fastqc exited with exit status: 1");
            }

            let working_dir = out_dir.join("raw_fastqc_output");
            let report_dir = out_dir.join("raw_multiqc_output");
            let data_dir = report_dir.join("raw_multiqc_data");
            fs::create_dir_all(&working_dir)?;
            fs::create_dir_all(&data_dir)?;
            fs::write(report_dir.join("raw_multiqc.html"), "<html></html>")?;

            let mut counts = String::from("Sample\ta\tb\tc\td\ttotal_sequences\n");
            let mut lengths = String::from("Sample\ta\tb\tc\td\te\tSequence length\tf\tg\tavg\n");
            for file in files {
                let name = file.file_name().unwrap().to_str().unwrap();
                let stem = name.strip_suffix(".fastq.gz").unwrap();
                self.seen.borrow_mut().push(name.to_string());
                counts.push_str(&format!("{}\t0\t0\t0\t0\t1.0\n", stem));
                lengths.push_str(&format!("{}\t0\t0\t0\t0\t0\t4\t0\t0\t4.0\n", stem));
            }

            let counts_table = data_dir.join(&layout.counts_table);
            let lengths_table = data_dir.join(&layout.lengths_table);
            fs::write(&counts_table, counts)?;
            fs::write(&lengths_table, lengths)?;

            Ok(QcOutput {
                counts_table,
                lengths_table,
                report_dir,
                working_dir,
            })
        }
    }

    fn write_gz(dir: &Path, name: &str) {
        let file = File::create(dir.join(name)).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"@r1\nACGT\n+\nIIII\n").unwrap();
        encoder.finish().unwrap();
    }

    fn config(reads: &Path, out: &Path, samples: usize) -> Config {
        let mut config = Config::new(reads.to_path_buf(), samples, ReadLayout::Paired);
        config.output_dir = out.to_path_buf();
        config
    }

    #[test]
    fn test_mixed_naming() {
        let reads = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for name in [
            "Sample-1_R1_raw.fastq.gz",
            "Sample-1_R2_raw.fastq.gz",
            "Sample-2_R1.fastq.gz",
            "Sample-2_R2.fastq.gz",
        ] {
            write_gz(reads.path(), name);
        }

        let tools = FixtureQc::default();
        let result = run(&config(reads.path(), out.path(), 2), &tools).unwrap();

        assert_eq!(result.report.outcome, Outcome::Success);
        assert_eq!(result.samples.len(), 2);
        assert!(result.problems.is_empty());

        let not_renamed = result
            .report
            .renamed_files
            .iter()
            .filter(|e| e.renamed == "not-renamed")
            .count();
        assert_eq!(not_renamed, 2);
        assert!(reads.path().join("Sample-2_R1_raw.fastq.gz").is_file());
        assert!(!reads.path().join("Sample-2_R1.fastq.gz").exists());

        let sample = result.samples.get("Sample-1").unwrap();
        let comparison = sample.comparison.unwrap();
        assert!(comparison.counts_equal);
        assert!(comparison.lengths_equal);

        let manifest = Manifest::read(out.path().join("raw_md5sum.txt")).unwrap();
        assert_eq!(manifest.len(), 5);
        assert!(manifest.contains("Sample-2_R2_raw.fastq.gz"));
        assert!(manifest.contains("raw_multiqc_report.zip"));

        let summary = fs::read_to_string(out.path().join("raw-validation-summary.tsv")).unwrap();
        assert_eq!(summary.lines().count(), 3);
        assert!(out.path().join("raw-validation-report.json").is_file());
        assert!(!out.path().join("raw_fastqc_output").exists());
    }

    #[test]
    fn test_one_corrupt_file() {
        let reads = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for name in [
            "A_R1_raw.fastq.gz",
            "A_R2_raw.fastq.gz",
            "B_R1_raw.fastq.gz",
        ] {
            write_gz(reads.path(), name);
        }
        fs::write(reads.path().join("B_R2_raw.fastq.gz"), b"not gzip").unwrap();

        let tools = FixtureQc::default();
        let result = run(&config(reads.path(), out.path(), 2), &tools).unwrap();

        assert_eq!(result.report.outcome, Outcome::CompletedWithWarnings);
        assert_eq!(result.problems.len(), 1);
        assert!(result.problems.contains("B_R2_raw.fastq.gz"));
        assert_eq!(tools.seen.borrow().len(), 3);

        let b = result.samples.get("B").unwrap();
        assert_eq!(b.files[0].checksum.as_ref().unwrap().skipped(), None);
        assert_eq!(
            b.files[1].checksum,
            Some(Field::Skipped(SkipReason::IntegrityFailure))
        );
        assert_eq!(
            b.files[1].metrics.as_ref().unwrap().read_count,
            Field::Skipped(SkipReason::IntegrityFailure)
        );
        assert!(!b.comparison.unwrap().counts_equal);

        let a = result.samples.get("A").unwrap();
        assert!(a.files.iter().all(|f| f.failures().is_empty()));

        let manifest = Manifest::read(out.path().join("raw_md5sum.txt")).unwrap();
        assert!(!manifest.contains("B_R2_raw.fastq.gz"));
        assert_eq!(result.report.problem_files.len(), 1);
    }

    #[test]
    fn test_validation_against_supplied_manifest() {
        let reads = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let names = ["A_R1.fastq.gz", "A_R2.fastq.gz"];
        for name in names {
            write_gz(reads.path(), name);
        }

        let mut supplied = Manifest::default();
        supplied.insert(names[0], md5_hex(reads.path().join(names[0])).unwrap());
        supplied.insert(names[1], "0123456789abcdef0123456789abcdef");
        let supplied_path = out.path().join("supplied.md5");
        supplied.write(&supplied_path).unwrap();

        let mut config = config(reads.path(), out.path(), 1);
        config.manifest = Some(supplied_path);
        let result = run(&config, &FixtureQc::default()).unwrap();

        assert_eq!(result.report.outcome, Outcome::CompletedWithWarnings);
        let a = result.samples.get("A").unwrap();
        assert!(a.files[0].checksum.as_ref().unwrap().value().is_some());
        assert_eq!(
            a.files[1].checksum,
            Some(Field::Skipped(SkipReason::ChecksumMismatch))
        );
    }

    #[test]
    fn test_count_mismatch_touches_nothing() {
        let reads = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for name in ["A_R1.fastq.gz", "A_R2.fastq.gz"] {
            write_gz(reads.path(), name);
        }

        let err = run(&config(reads.path(), out.path(), 3), &FixtureQc::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::CountMismatch {
                what: String::from("matching read files"),
                expected: 6,
                found: 2,
            })
        );

        assert!(reads.path().join("A_R1.fastq.gz").is_file());
        assert!(!out.path().join("raw-validation-summary.tsv").exists());
    }

    #[test]
    fn test_all_files_corrupt_skips_qc() {
        let reads = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(reads.path().join("A_raw.fastq.gz"), b"").unwrap();

        let mut config = config(reads.path(), out.path(), 1);
        config.layout = ReadLayout::Single;
        let tools = FixtureQc::default();
        let result = run(&config, &tools).unwrap();

        assert!(tools.seen.borrow().is_empty());
        assert!(result.report.qc_archive.is_none());
        assert_eq!(result.report.outcome, Outcome::CompletedWithWarnings);
    }

    #[test]
    fn test_failed_qc_still_writes_summary() {
        let reads = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for name in ["A_R1.fastq.gz", "A_R2.fastq.gz"] {
            write_gz(reads.path(), name);
        }

        let tools = FixtureQc {
            fail: true,
            ..FixtureQc::default()
        };
        let result = run(&config(reads.path(), out.path(), 1), &tools).unwrap();

        assert_eq!(result.report.outcome, Outcome::CompletedWithWarnings);
        assert!(result.report.qc_archive.is_none());
        assert_eq!(result.report.problem_files.len(), 2);
        assert_eq!(
            result.report.problem_files[0].reasons,
            vec!["missing-from-qc-output"]
        );

        let a = result.samples.get("A").unwrap();
        assert!(a.files[0].checksum.as_ref().unwrap().value().is_some());
        assert!(out.path().join("raw-validation-summary.tsv").is_file());
        assert!(Manifest::read(out.path().join("raw_md5sum.txt"))
            .unwrap()
            .contains("A_R1_raw.fastq.gz"));
    }

    #[test]
    fn test_rerun_refuses_before_touching_files() {
        let reads = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for name in ["A_R1.fastq.gz", "A_R2.fastq.gz"] {
            write_gz(reads.path(), name);
        }

        let mut first = config(reads.path(), out.path(), 1);
        first.keep_intermediate = true;
        run(&first, &FixtureQc::default()).unwrap();
        assert!(out.path().join("raw_multiqc_report").is_dir());

        let more = TempDir::new().unwrap();
        for name in ["B_R1.fastq.gz", "B_R2.fastq.gz"] {
            write_gz(more.path(), name);
        }

        let mut second = config(more.path(), out.path(), 1);
        second.keep_intermediate = true;
        let tools = FixtureQc::default();
        let err = run(&second, &tools).unwrap_err();

        assert!(err.to_string().contains("raw_multiqc_report"));
        assert!(tools.seen.borrow().is_empty());
        assert!(more.path().join("B_R1.fastq.gz").is_file());
        assert!(!more.path().join("B_R1_raw.fastq.gz").exists());
    }
}
