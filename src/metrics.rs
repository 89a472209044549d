//! Merging the external QC tool's tables back into the per-sample records.
//!
//! The QC aggregation tool writes two tab-separated tables keyed (first
//! column) by file stem: the filename with its compressed extension stripped.
//! Fields are pulled out by fixed column position, as described by a
//! [`QcTableLayout`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use csv::ReaderBuilder;
use csv::StringRecord;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::samples::record::Field;
use crate::samples::record::ProblemFiles;
use crate::samples::record::SampleSet;
use crate::samples::record::SkipReason;
use crate::utils::args::ReadLayout;

//==============//
// Table layout //
//==============//

/// Where the QC tool puts each field we consume.
#[derive(Clone, Debug)]
pub struct QcTableLayout {
    /// Filename of the table holding read counts.
    pub counts_table: String,

    /// Column index of the read count in the counts table.
    pub count_column: usize,

    /// Filename of the table holding read lengths.
    pub lengths_table: String,

    /// Column index of the read-length range in the lengths table.
    pub length_range_column: usize,

    /// Column index of the average read length in the lengths table.
    pub average_length_column: usize,
}

impl Default for QcTableLayout {
    fn default() -> Self {
        QcTableLayout {
            counts_table: String::from("multiqc_general_stats.txt"),
            count_column: 5,
            lengths_table: String::from("multiqc_fastqc.txt"),
            length_range_column: 6,
            average_length_column: 9,
        }
    }
}

//==========//
// QC table //
//==========//

/// A tab-separated QC table indexed by its first column.
#[derive(Debug, Default)]
pub struct QcTable {
    rows: HashMap<String, StringRecord>,
}

impl QcTable {
    /// Reads a table from disk.
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<QcTable> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening QC table: {}", path.display()))?;
        QcTable::from_reader(file).with_context(|| format!("parsing QC table: {}", path.display()))
    }

    /// Reads a table from any reader. The first line is a header.
    pub fn from_reader<R: Read>(reader: R) -> anyhow::Result<QcTable> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut rows = HashMap::new();
        for result in reader.records() {
            let record = result?;
            if let Some(key) = record.get(0) {
                rows.insert(key.to_string(), record.clone());
            }
        }

        Ok(QcTable { rows })
    }

    /// The row for a file stem.
    pub fn get(&self, stem: &str) -> Option<&StringRecord> {
        self.rows.get(stem)
    }

    /// The number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn cell<'a>(row: &'a StringRecord, column: usize, stem: &str) -> anyhow::Result<&'a str> {
    match row.get(column) {
        Some(value) => Ok(value.trim()),
        None => bail!(
            "QC row for {} has {} columns, expected at least {}",
            stem,
            row.len(),
            column + 1
        ),
    }
}

//=========//
// Metrics //
//=========//

/// Read metrics for a single file.
#[derive(Clone, Debug, PartialEq)]
pub struct FileMetrics {
    /// Number of reads, rounded to the nearest integer.
    pub read_count: Field<u64>,

    /// The reported read-length range (e.g., `35-151`).
    pub length_range: Field<String>,

    /// The average read length.
    pub average_length: Field<f64>,
}

impl FileMetrics {
    /// Metrics for a file with no values at all.
    pub fn skipped(reason: SkipReason) -> Self {
        FileMetrics {
            read_count: Field::Skipped(reason),
            length_range: Field::Skipped(reason),
            average_length: Field::Skipped(reason),
        }
    }
}

/// Whether the two mates of a paired sample agree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MateComparison {
    /// Forward and reverse read counts are equal.
    pub counts_equal: bool,

    /// Forward and reverse length range and average length are both equal.
    pub lengths_equal: bool,
}

impl MateComparison {
    /// Compares two mates. A skipped value on either side is never equal.
    pub fn between(forward: &FileMetrics, reverse: &FileMetrics) -> Self {
        let counts_equal = both_equal(&forward.read_count, &reverse.read_count);
        let lengths_equal = both_equal(&forward.length_range, &reverse.length_range)
            && both_equal(&forward.average_length, &reverse.average_length);

        MateComparison {
            counts_equal,
            lengths_equal,
        }
    }
}

fn both_equal<T: PartialEq>(a: &Field<T>, b: &Field<T>) -> bool {
    match (a, b) {
        (Field::Value(a), Field::Value(b)) => a == b,
        _ => false,
    }
}

/// Pulls the metrics for one file out of the two tables.
pub fn lookup(
    stem: &str,
    counts: &QcTable,
    lengths: &QcTable,
    layout: &QcTableLayout,
) -> anyhow::Result<FileMetrics> {
    let read_count = match counts.get(stem) {
        Some(row) => {
            let raw = cell(row, layout.count_column, stem)?;
            let count: f64 = raw
                .parse()
                .with_context(|| format!("parsing read count {:?} for {}", raw, stem))?;
            if !(0.0..=u64::MAX as f64).contains(&count) {
                bail!("read count {:?} for {} is not a non-negative number", raw, stem);
            }
            Field::Value(count.round() as u64)
        }
        None => Field::Skipped(SkipReason::MissingFromQcOutput),
    };

    let (length_range, average_length) = match lengths.get(stem) {
        Some(row) => {
            let range = cell(row, layout.length_range_column, stem)?;
            let raw = cell(row, layout.average_length_column, stem)?;
            let average: f64 = raw
                .parse()
                .with_context(|| format!("parsing average read length {:?} for {}", raw, stem))?;
            if !average.is_finite() || average < 0.0 {
                bail!("average read length {:?} for {} is not a non-negative number", raw, stem);
            }
            (Field::Value(range.to_string()), Field::Value(average))
        }
        None => (
            Field::Skipped(SkipReason::MissingFromQcOutput),
            Field::Skipped(SkipReason::MissingFromQcOutput),
        ),
    };

    Ok(FileMetrics {
        read_count,
        length_range,
        average_length,
    })
}

/// Annotates every file with its metrics and every paired sample with its
/// mate comparison. Problem files are never looked up; the QC tool was never
/// run on them.
pub fn aggregate(
    samples: &mut SampleSet,
    problems: &ProblemFiles,
    counts: &QcTable,
    lengths: &QcTable,
    layout: &QcTableLayout,
    extensions: &[String],
) -> anyhow::Result<()> {
    info!(
        "Merging QC metrics ({} count rows, {} length rows).",
        counts.len(),
        lengths.len()
    );

    let paired = samples.layout == ReadLayout::Paired;

    for sample in samples.iter_mut() {
        for file in sample.files.iter_mut() {
            let metrics = match problems.contains(&file.current_name) {
                true => FileMetrics::skipped(SkipReason::IntegrityFailure),
                false => {
                    let stem = file.stem(extensions);
                    let metrics = lookup(stem, counts, lengths, layout)?;
                    if metrics.read_count.skipped().is_some()
                        || metrics.length_range.skipped().is_some()
                    {
                        warn!("{} is missing from the QC output.", file.current_name);
                    }
                    metrics
                }
            };
            file.metrics = Some(metrics);
        }

        if paired {
            if let [forward, reverse] = sample.files.as_slice() {
                if let (Some(f), Some(r)) = (&forward.metrics, &reverse.metrics) {
                    let comparison = MateComparison::between(f, r);
                    if !comparison.counts_equal {
                        warn!("{}: forward and reverse read counts differ.", sample.id);
                    }
                    if !comparison.lengths_equal {
                        warn!("{}: forward and reverse read lengths differ.", sample.id);
                    }
                    sample.comparison = Some(comparison);
                }
            }
        }
    }

    Ok(())
}
