//! `rawcheck` is a command line tool that validates and normalizes batches of
//! raw Illumina read files before downstream processing. This package is
//! composed of both a library crate, as well as a binary crate.
//!
//! A run infers sample identities from filenames, renames files to a
//! canonical convention, tests every archive, validates or generates
//! checksums and merges external QC metrics into a per-sample summary. A file
//! that fails a check is carried through the rest of the run with an explicit
//! skip reason instead of aborting it.
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]

pub mod checks;
pub mod errors;
pub mod infer;
pub mod metrics;
pub mod report;
pub mod samples;
pub mod tools;
pub mod utils;
pub mod validate;
