//! The resolved configuration for a validation run.

use std::path::PathBuf;

use crate::metrics::QcTableLayout;
use crate::samples::normalize::CanonicalSuffixes;
use crate::samples::pattern::NamingConvention;
use crate::utils::args::ReadLayout;

/// Everything [`run`](super::pipeline::run) needs, resolved once from the
/// command line.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the read files. Files are renamed in place.
    pub reads_dir: PathBuf,

    /// The number of samples expected in `reads_dir`.
    pub sample_count: usize,

    /// Paired- or single-end.
    pub layout: ReadLayout,

    /// A checksum manifest to validate against. Digests are generated when
    /// this is `None`.
    pub manifest: Option<PathBuf>,

    /// Keep the per-file QC output and the uncompressed report.
    pub keep_intermediate: bool,

    /// How read files are named.
    pub convention: NamingConvention,

    /// The filename endings enforced by normalization.
    pub suffixes: CanonicalSuffixes,

    /// Where the QC tool puts the fields we consume.
    pub qc_layout: QcTableLayout,

    /// Directory all run artifacts are written to.
    pub output_dir: PathBuf,

    /// Prefix for the names of the summary, report and manifest.
    pub output_prefix: String,

    /// Threads handed to the QC tool.
    pub threads: usize,
}

impl Config {
    /// Creates a [`Config`] with default conventions, writing next to the
    /// reads.
    pub fn new(reads_dir: PathBuf, sample_count: usize, layout: ReadLayout) -> Self {
        Config {
            output_dir: reads_dir.clone(),
            reads_dir,
            sample_count,
            layout,
            manifest: None,
            keep_intermediate: false,
            convention: NamingConvention::default(),
            suffixes: CanonicalSuffixes::default(),
            qc_layout: QcTableLayout::default(),
            output_prefix: String::new(),
            threads: 4,
        }
    }

    fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{}", self.output_prefix, name))
    }

    /// Where the run's checksum manifest is written.
    pub fn manifest_path(&self) -> PathBuf {
        self.output_path("raw_md5sum.txt")
    }

    /// Where the per-sample summary table is written.
    pub fn summary_path(&self) -> PathBuf {
        self.output_path("raw-validation-summary.tsv")
    }

    /// Where the JSON run report is written.
    pub fn report_path(&self) -> PathBuf {
        self.output_path("raw-validation-report.json")
    }
}
