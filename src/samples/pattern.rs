//! Classifies read filenames by mate role and infers sample IDs from them.
//!
//! Filename-based inference is the one place in `rawcheck` where a wrong guess
//! silently corrupts every downstream record, so the logic lives here, in pure
//! functions, and nowhere else.
//!
//! # Conventions
//!
//! A [`NamingConvention`] holds three ordered lists: forward designators,
//! reverse designators and compressed-sequence extensions. For each mate role,
//! the first designator (in list order) that occurs in the filename is taken.
//! A paired-end filename must match exactly one role. Every filename must end
//! with exactly one recognized extension.

use crate::errors::ValidationError;
use crate::samples::record::MateRole;
use crate::samples::record::ReadFileRecord;
use crate::utils::args::ReadLayout;

/// Suffix stripped from single-end sample IDs so it is not doubled when the
/// canonical suffix is applied.
const RAW_SUFFIX: &str = "_raw";

/// The ordered designator and extension lists used to classify filenames.
#[derive(Clone, Debug)]
pub struct NamingConvention {
    forward: Vec<String>,
    reverse: Vec<String>,
    extensions: Vec<String>,
}

impl NamingConvention {
    /// Default forward designators.
    pub const DEFAULT_FORWARD: &'static [&'static str] = &["_R1_", "_R1.", "_1."];

    /// Default reverse designators.
    pub const DEFAULT_REVERSE: &'static [&'static str] = &["_R2_", "_R2.", "_2."];

    /// Default compressed-sequence extensions.
    pub const DEFAULT_EXTENSIONS: &'static [&'static str] = &[".fastq.gz", ".fq.gz"];

    /// Creates a new [`NamingConvention`].
    pub fn new(forward: Vec<String>, reverse: Vec<String>, extensions: Vec<String>) -> Self {
        NamingConvention {
            forward,
            reverse,
            extensions,
        }
    }

    /// The recognized extensions, in order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether the filename ends with a recognized compressed-sequence
    /// extension. Only candidates are considered by the sample mapper.
    pub fn is_candidate(&self, filename: &str) -> bool {
        self.extensions.iter().any(|ext| filename.ends_with(ext.as_str()))
    }

    /// Classifies a single filename under the given layout.
    pub fn classify(
        &self,
        filename: &str,
        layout: ReadLayout,
    ) -> Result<ReadFileRecord, ValidationError> {
        let extension = self.match_extension(filename)?;

        let (role, designator) = match layout {
            ReadLayout::Single => (MateRole::Single, None),
            ReadLayout::Paired => {
                let forward = first_designator(&self.forward, filename);
                let reverse = first_designator(&self.reverse, filename);

                match (forward, reverse) {
                    (Some(d), None) => (MateRole::Forward, Some(d.to_string())),
                    (None, Some(d)) => (MateRole::Reverse, Some(d.to_string())),
                    (Some(f), Some(r)) => {
                        return Err(ambiguous(
                            filename,
                            format!(
                                "matches both forward designator {:?} and reverse \
                                 designator {:?}",
                                f, r
                            ),
                        ))
                    }
                    (None, None) => {
                        return Err(ambiguous(
                            filename,
                            format!(
                                "matches none of the forward ({}) or reverse ({}) \
                                 designators",
                                self.forward.join(", "),
                                self.reverse.join(", ")
                            ),
                        ))
                    }
                }
            }
        };

        Ok(ReadFileRecord {
            filename: filename.to_string(),
            role,
            designator,
            extension: extension.to_string(),
        })
    }

    fn match_extension<'a>(&'a self, filename: &str) -> Result<&'a str, ValidationError> {
        let matches: Vec<&String> = self
            .extensions
            .iter()
            .filter(|ext| filename.ends_with(ext.as_str()))
            .collect();

        match matches.as_slice() {
            [ext] => Ok(ext.as_str()),
            [] => Err(ambiguous(
                filename,
                format!(
                    "does not end with any recognized extension ({})",
                    self.extensions.join(", ")
                ),
            )),
            many => Err(ambiguous(
                filename,
                format!(
                    "ends with more than one recognized extension ({})",
                    many.iter().map(|e| e.as_str()).collect::<Vec<_>>().join(", ")
                ),
            )),
        }
    }
}

impl Default for NamingConvention {
    fn default() -> Self {
        NamingConvention::new(
            to_strings(Self::DEFAULT_FORWARD),
            to_strings(Self::DEFAULT_REVERSE),
            to_strings(Self::DEFAULT_EXTENSIONS),
        )
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn first_designator<'a>(designators: &'a [String], filename: &str) -> Option<&'a str> {
    designators
        .iter()
        .find(|d| filename.contains(d.as_str()))
        .map(|d| d.as_str())
}

fn ambiguous(filename: &str, reason: String) -> ValidationError {
    ValidationError::AmbiguousNaming {
        filename: filename.to_string(),
        reason,
    }
}

/// Infers the sample ID for a classified file.
///
/// * Paired-end: everything before the first occurrence of the matched
///   designator, so the designator and everything after it is dropped.
/// * Single-end: the filename without its extension and without a trailing
///   `_raw`.
pub fn infer_sample_id(record: &ReadFileRecord) -> Result<String, ValidationError> {
    let filename = record.filename.as_str();

    let id = match &record.designator {
        Some(designator) => match filename.find(designator.as_str()) {
            Some(pos) => &filename[..pos],
            None => {
                return Err(ambiguous(
                    filename,
                    format!("designator {:?} not found in filename", designator),
                ))
            }
        },
        None => {
            let stem = filename
                .strip_suffix(record.extension.as_str())
                .unwrap_or(filename);
            stem.strip_suffix(RAW_SUFFIX).unwrap_or(stem)
        }
    };

    if id.is_empty() {
        return Err(ambiguous(
            filename,
            String::from("no sample ID remains once the naming convention is stripped"),
        ));
    }

    Ok(id.to_string())
}
