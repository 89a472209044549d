//! The summary artifacts: a per-sample table and a JSON run report.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use csv::WriterBuilder;
use serde::Serialize;

use crate::samples::normalize::RenameEntry;
use crate::samples::record::MateRole;
use crate::samples::record::SampleFile;
use crate::samples::record::SampleRecord;
use crate::samples::record::SampleSet;
use crate::utils::args::ReadLayout;

//=========//
// Outcome //
//=========//

/// How a run that did not abort ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every file passed every check.
    Success,

    /// At least one file failed a check; the summary holds sentinels for it.
    CompletedWithWarnings,
}

impl Outcome {
    /// Derives the outcome from the failures recorded on the samples.
    pub fn of(samples: &SampleSet) -> Self {
        match samples.files().any(|f| !f.failures().is_empty()) {
            true => Outcome::CompletedWithWarnings,
            false => Outcome::Success,
        }
    }
}

//===============//
// Summary table //
//===============//

fn roles(layout: ReadLayout) -> &'static [MateRole] {
    match layout {
        ReadLayout::Paired => &[MateRole::Forward, MateRole::Reverse],
        ReadLayout::Single => &[MateRole::Single],
    }
}

/// The per-file columns, in the order they are grouped in the table.
const FILE_COLUMNS: &[&str] = &["gzip_test", "md5", "num_reads", "min_max_read_length", "mean_read_length"];

/// The header row for the given layout. `unique_ID` always comes first.
pub fn headers(layout: ReadLayout) -> Vec<String> {
    let roles = roles(layout);
    let mut headers = vec![String::from("unique_ID")];

    for role in roles {
        let prefix = role.column_prefix();
        headers.push(format!("{}original_filename", prefix));
        headers.push(format!("{}renamed_filename", prefix));
    }

    for column in FILE_COLUMNS {
        for role in roles {
            headers.push(format!("{}{}", role.column_prefix(), column));
        }
    }

    if layout == ReadLayout::Paired {
        headers.push(String::from("num_reads_equal"));
        headers.push(String::from("min_max_read_lengths_equal"));
    }

    headers
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn file_cells(file: Option<&SampleFile>) -> [String; 5] {
    let metrics = file.and_then(|f| f.metrics.as_ref());
    [
        optional(file.and_then(|f| f.integrity)),
        optional(file.and_then(|f| f.checksum.as_ref())),
        optional(metrics.map(|m| &m.read_count)),
        optional(metrics.map(|m| &m.length_range)),
        optional(metrics.map(|m| &m.average_length)),
    ]
}

/// The table row for a single sample, aligned with [`headers`].
pub fn row(sample: &SampleRecord, layout: ReadLayout) -> Vec<String> {
    let roles = roles(layout);
    let mut row = vec![sample.id.clone()];

    for role in roles {
        let file = sample.file(*role);
        row.push(optional(file.map(|f| &f.record.filename)));
        row.push(optional(file.and_then(|f| f.renamed.as_ref())));
    }

    let per_file: Vec<[String; 5]> = roles.iter().map(|r| file_cells(sample.file(*r))).collect();
    for i in 0..FILE_COLUMNS.len() {
        for cells in &per_file {
            row.push(cells[i].clone());
        }
    }

    if layout == ReadLayout::Paired {
        row.push(optional(sample.comparison.map(|c| c.counts_equal)));
        row.push(optional(sample.comparison.map(|c| c.lengths_equal)));
    }

    row
}

/// Writes the tab-delimited summary table, one row per sample.
pub fn write_summary(path: &Path, samples: &SampleSet) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating summary table: {}", path.display()))?;

    writer.write_record(headers(samples.layout))?;
    for sample in samples.iter() {
        writer.write_record(row(sample, samples.layout))?;
    }
    writer
        .flush()
        .with_context(|| format!("writing summary table: {}", path.display()))?;

    Ok(())
}

//============//
// Run report //
//============//

/// A file that failed at least one check.
#[derive(Debug, Serialize)]
pub struct ProblemEntry {
    /// The sample the file belongs to.
    pub sample_id: String,

    /// The file's current name.
    pub filename: String,

    /// Every failure recorded for the file, in pipeline order.
    pub reasons: Vec<&'static str>,
}

/// Struct holding the final results of a `rawcheck validate` run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: Outcome,

    /// Paired- or single-end.
    pub layout: ReadLayout,

    /// The number of samples (always the number of summary rows).
    pub num_samples: usize,

    /// The number of read files.
    pub num_files: usize,

    /// Every file that failed a check.
    pub problem_files: Vec<ProblemEntry>,

    /// The rename audit trail.
    pub renamed_files: Vec<RenameEntry>,

    /// The summary table.
    pub summary: PathBuf,

    /// The checksum manifest written by the run.
    pub manifest: PathBuf,

    /// The packaged QC report, if QC was run.
    pub qc_archive: Option<PathBuf>,
}

impl RunReport {
    /// Creates a new [`RunReport`].
    pub fn new(
        samples: &SampleSet,
        renamed_files: Vec<RenameEntry>,
        summary: PathBuf,
        manifest: PathBuf,
        qc_archive: Option<PathBuf>,
    ) -> Self {
        let problem_files = samples
            .iter()
            .flat_map(|s| {
                s.files.iter().filter_map(move |f| {
                    let reasons = f.failures();
                    match reasons.is_empty() {
                        true => None,
                        false => Some(ProblemEntry {
                            sample_id: s.id.clone(),
                            filename: f.current_name.clone(),
                            reasons: reasons.iter().map(|r| r.sentinel()).collect(),
                        }),
                    }
                })
            })
            .collect();

        RunReport {
            outcome: Outcome::of(samples),
            layout: samples.layout,
            num_samples: samples.len(),
            num_files: samples.num_files(),
            problem_files,
            renamed_files,
            summary,
            manifest,
            qc_archive,
        }
    }

    /// Writes the report as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let mut file = File::create(path)
            .with_context(|| format!("creating run report: {}", path.display()))?;
        let output = serde_json::to_string_pretty(&self)?;
        file.write_all(output.as_bytes())
            .with_context(|| format!("writing run report: {}", path.display()))?;
        Ok(())
    }
}
