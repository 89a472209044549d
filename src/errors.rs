//! Errors and exit codes shared across the `rawcheck` subcommands.

use std::error;
use std::fmt;

use tracing::error;

use crate::samples::record::MateRole;

//============//
// Exit codes //
//============//

/// The process exit codes used by `rawcheck`.
pub enum ExitCode {
    /// Indicates that the input directory did not match the operator's
    /// expectations and the run was aborted before any summary was written.
    InvalidInputData = 1,

    /// Indicates that the run finished and wrote a complete summary, but at
    /// least one file failed an integrity, checksum or metrics lookup.
    CompletedWithWarnings = 2,
}

/// Logs the message and exits the process with the given code.
pub fn exit<I>(message: I, code: ExitCode) -> !
where
    I: tracing::Value,
{
    error!(message);
    std::process::exit(code as i32);
}

//==================//
// Validation Error //
//==================//

/// Run-aborting errors raised while building the sample mapping. None of these
/// are recoverable: the directory contents do not match what the operator
/// asked for, so no file is touched once one of these is raised.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// The number of matching files did not match the expected sample count.
    CountMismatch {
        /// What was being counted (e.g., "matching files", "R1 files").
        what: String,
        /// The number expected from the sample count and layout.
        expected: usize,
        /// The number actually found.
        found: usize,
    },

    /// A filename matched zero or more than one naming convention.
    AmbiguousNaming {
        /// The offending filename.
        filename: String,
        /// A short description of what went wrong.
        reason: String,
    },

    /// A sample ID was derived from only one mate of a paired layout.
    UnpairedSample {
        /// The derived sample ID.
        sample_id: String,
        /// The mate role that was found.
        found: MateRole,
    },

    /// Two files derived the same sample ID for the same mate role.
    DuplicateSample {
        /// The derived sample ID.
        sample_id: String,
        /// The first filename that derived this ID.
        first: String,
        /// The second filename that derived this ID.
        second: String,
    },

    /// Normalizing a filename would clobber a different, existing file.
    RefusingToOverwrite {
        /// The file that would be renamed.
        from: String,
        /// The existing file at the destination.
        to: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CountMismatch {
                what,
                expected,
                found,
            } => write!(
                f,
                "count mismatch: expected {} {}, found {}",
                expected, what, found
            ),
            ValidationError::AmbiguousNaming { filename, reason } => {
                write!(f, "ambiguous naming for {}: {}", filename, reason)
            }
            ValidationError::UnpairedSample { sample_id, found } => write!(
                f,
                "sample {} only has a {} file, its mate could not be found",
                sample_id, found
            ),
            ValidationError::DuplicateSample {
                sample_id,
                first,
                second,
            } => write!(
                f,
                "sample {} was derived from both {} and {}",
                sample_id, first, second
            ),
            ValidationError::RefusingToOverwrite { from, to } => write!(
                f,
                "refusing to rename {} over existing file {}. Please resolve \
                 the conflict and rerun.",
                from, to
            ),
        }
    }
}

impl error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_mismatch_message() {
        let err = ValidationError::CountMismatch {
            what: String::from("matching files"),
            expected: 6,
            found: 5,
        };
        assert_eq!(
            err.to_string(),
            "count mismatch: expected 6 matching files, found 5"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = ValidationError::UnpairedSample {
            sample_id: String::from("A"),
            found: MateRole::Forward,
        }
        .into();
        assert!(err.downcast_ref::<ValidationError>().is_some());
    }
}
