//! The per-sample record set that every pipeline stage extends.
//!
//! The mapping is created once by the sample mapper and then annotated in
//! place by each later stage. Per-file outcomes are stored as [`Field`]s, so a
//! file that failed an earlier stage carries an explicit [`SkipReason`] rather
//! than a missing value.

use std::fmt;

use indexmap::IndexMap;
use indexmap::IndexSet;
use serde::Serialize;

use crate::checks::integrity::IntegrityStatus;
use crate::metrics::FileMetrics;
use crate::metrics::MateComparison;
use crate::utils::args::ReadLayout;

//===========//
// Mate role //
//===========//

/// The role a read file plays within its sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MateRole {
    /// The forward (R1) mate of a paired-end sample.
    Forward,

    /// The reverse (R2) mate of a paired-end sample.
    Reverse,

    /// The only file of a single-end sample.
    Single,
}

impl MateRole {
    /// The column prefix used for this role in the summary table.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            MateRole::Forward => "R1_",
            MateRole::Reverse => "R2_",
            MateRole::Single => "",
        }
    }
}

impl fmt::Display for MateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MateRole::Forward => write!(f, "forward (R1)"),
            MateRole::Reverse => write!(f, "reverse (R2)"),
            MateRole::Single => write!(f, "single-end"),
        }
    }
}

//=================//
// Skipped fields  //
//=================//

/// Why a per-file field holds no computed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The file failed the archive integrity test.
    IntegrityFailure,

    /// The file failed checksum verification.
    ChecksumMismatch,

    /// The supplied checksum manifest has no entry for the file.
    MissingFromManifest,

    /// The QC tables have no row for the file.
    MissingFromQcOutput,

    /// The file already carried its canonical name.
    NotRenamed,
}

impl SkipReason {
    /// The sentinel written to the summary table in place of a value.
    pub fn sentinel(&self) -> &'static str {
        match self {
            SkipReason::IntegrityFailure => "failed-gzip-test",
            SkipReason::ChecksumMismatch => "failed-md5-check",
            SkipReason::MissingFromManifest => "missing-from-md5-file",
            SkipReason::MissingFromQcOutput => "missing-from-qc-output",
            SkipReason::NotRenamed => "not-renamed",
        }
    }

    /// Whether this reason represents a failure (as opposed to a benign
    /// "nothing to do" outcome).
    pub fn is_failure(&self) -> bool {
        !matches!(self, SkipReason::NotRenamed)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sentinel())
    }
}

/// A per-file value that is either computed or explicitly skipped.
#[derive(Clone, Debug, PartialEq)]
pub enum Field<T> {
    /// The computed value.
    Value(T),

    /// No value, and the reason why.
    Skipped(SkipReason),
}

impl<T> Field<T> {
    /// Returns the value, if one was computed.
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            Field::Skipped(_) => None,
        }
    }

    /// Returns the skip reason, if the field was skipped.
    pub fn skipped(&self) -> Option<SkipReason> {
        match self {
            Field::Value(_) => None,
            Field::Skipped(reason) => Some(*reason),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(v) => write!(f, "{}", v),
            Field::Skipped(reason) => write!(f, "{}", reason),
        }
    }
}

//===========//
// Read file //
//===========//

/// A classified read file. Immutable once the pattern matcher has produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadFileRecord {
    /// The filename as found in the input directory.
    pub filename: String,

    /// The inferred mate role.
    pub role: MateRole,

    /// The designator that determined the role, if paired.
    pub designator: Option<String>,

    /// The compressed-sequence extension the filename ends with.
    pub extension: String,
}

/// A read file plus everything the pipeline learns about it.
#[derive(Clone, Debug)]
pub struct SampleFile {
    /// The classified file as originally found.
    pub record: ReadFileRecord,

    /// The name the file currently carries on disk.
    pub current_name: String,

    /// The outcome of normalization (the new name, or not renamed).
    pub renamed: Option<Field<String>>,

    /// The outcome of the integrity test.
    pub integrity: Option<IntegrityStatus>,

    /// The digest, or why there is none.
    pub checksum: Option<Field<String>>,

    /// Read metrics pulled from the QC tables.
    pub metrics: Option<FileMetrics>,
}

impl SampleFile {
    /// Wraps a freshly classified file.
    pub fn new(record: ReadFileRecord) -> Self {
        let current_name = record.filename.clone();
        SampleFile {
            record,
            current_name,
            renamed: None,
            integrity: None,
            checksum: None,
            metrics: None,
        }
    }

    /// The mate role of this file.
    pub fn role(&self) -> MateRole {
        self.record.role
    }

    /// The QC identifier for this file: its current name with the first
    /// matching compressed extension stripped.
    pub fn stem(&self, extensions: &[String]) -> &str {
        extensions
            .iter()
            .find_map(|ext| self.current_name.strip_suffix(ext.as_str()))
            .unwrap_or(&self.current_name)
    }

    /// Every failure recorded for this file, in pipeline order.
    pub fn failures(&self) -> Vec<SkipReason> {
        let mut reasons = Vec::new();

        if let Some(IntegrityStatus::Fail) = self.integrity {
            reasons.push(SkipReason::IntegrityFailure);
        }

        if let Some(Field::Skipped(reason)) = &self.checksum {
            if reason.is_failure() && !reasons.contains(reason) {
                reasons.push(*reason);
            }
        }

        if let Some(metrics) = &self.metrics {
            let skipped = [
                metrics.read_count.skipped(),
                metrics.length_range.skipped(),
                metrics.average_length.skipped(),
            ];
            for reason in skipped.into_iter().flatten() {
                if !reasons.contains(&reason) {
                    reasons.push(reason);
                }
            }
        }

        reasons
    }
}

//========//
// Sample //
//========//

/// A sample and its one (single-end) or two (paired-end) read files. In the
/// paired layout the forward file always comes first.
#[derive(Clone, Debug)]
pub struct SampleRecord {
    /// The unique sample ID derived from the filenames.
    pub id: String,

    /// The sample's read files.
    pub files: Vec<SampleFile>,

    /// Cross-mate comparison, paired layout only.
    pub comparison: Option<MateComparison>,
}

impl SampleRecord {
    /// Creates a new [`SampleRecord`].
    pub fn new(id: String, files: Vec<SampleFile>) -> Self {
        SampleRecord {
            id,
            files,
            comparison: None,
        }
    }

    /// Returns the file with the given role, if present.
    pub fn file(&self, role: MateRole) -> Option<&SampleFile> {
        self.files.iter().find(|f| f.role() == role)
    }
}

/// The full, ordered mapping from sample ID to [`SampleRecord`].
#[derive(Clone, Debug)]
pub struct SampleSet {
    /// Whether the samples are paired- or single-end.
    pub layout: ReadLayout,

    samples: IndexMap<String, SampleRecord>,
}

impl SampleSet {
    /// Creates an empty [`SampleSet`].
    pub fn new(layout: ReadLayout) -> Self {
        SampleSet {
            layout,
            samples: IndexMap::new(),
        }
    }

    /// Adds a sample, keyed by its ID.
    pub fn insert(&mut self, sample: SampleRecord) {
        self.samples.insert(sample.id.clone(), sample);
    }

    /// Looks up a sample by ID.
    pub fn get(&self, id: &str) -> Option<&SampleRecord> {
        self.samples.get(id)
    }

    /// The number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterates over the samples in order.
    pub fn iter(&self) -> impl Iterator<Item = &SampleRecord> {
        self.samples.values()
    }

    /// Iterates mutably over the samples in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SampleRecord> {
        self.samples.values_mut()
    }

    /// Iterates over every file of every sample in order.
    pub fn files(&self) -> impl Iterator<Item = &SampleFile> {
        self.samples.values().flat_map(|s| s.files.iter())
    }

    /// Iterates mutably over every file of every sample in order.
    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut SampleFile> {
        self.samples.values_mut().flat_map(|s| s.files.iter_mut())
    }

    /// The total number of files across all samples.
    pub fn num_files(&self) -> usize {
        self.samples.values().map(|s| s.files.len()).sum()
    }
}

//===============//
// Problem files //
//===============//

/// The run-scoped set of files that failed the integrity test. Every stage
/// after the integrity checker consults this before touching a file.
#[derive(Debug, Default)]
pub struct ProblemFiles(IndexSet<String>);

impl ProblemFiles {
    /// Records a problem file by its current name.
    pub fn insert(&mut self, filename: impl Into<String>) {
        self.0.insert(filename.into());
    }

    /// Whether the file is a problem file.
    pub fn contains(&self, filename: &str) -> bool {
        self.0.contains(filename)
    }

    /// The number of problem files.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no problem files.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the problem files in the order they were found.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}
