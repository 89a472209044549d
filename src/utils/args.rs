//! Utilities related to the parsing of arguments.

use std::fmt::Display;

use clap::Args;
use serde::Serialize;

use crate::samples::normalize::CanonicalSuffixes;
use crate::samples::pattern::NamingConvention;

//=============//
// Read layout //
//=============//

/// Whether samples were sequenced paired-end or single-end.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadLayout {
    /// Two read files (R1 and R2) per sample.
    Paired,

    /// One read file per sample.
    Single,
}

impl ReadLayout {
    /// The number of read files each sample is expected to have.
    pub fn files_per_sample(&self) -> usize {
        match self {
            ReadLayout::Paired => 2,
            ReadLayout::Single => 1,
        }
    }
}

impl Display for ReadLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paired => write!(f, "paired"),
            Self::Single => write!(f, "single"),
        }
    }
}

//==============//
// Sample count //
//==============//

/// Utility method to parse the expected number of samples passed in on the
/// command line and ensure it is a positive, non-zero integer.
pub fn positive_count(raw: &str) -> Result<usize, String> {
    let count: usize = raw
        .parse()
        .map_err(|_| format!("{} isn't a positive integer", raw))?;

    match count {
        0 => Err(String::from("the number of samples must be greater than zero")),
        n => Ok(n),
    }
}

//========================//
// Naming convention args //
//========================//

/// Arguments describing how read files are named. Shared by every subcommand
/// that needs to infer samples from filenames.
#[derive(Args, Clone, Debug)]
pub struct NamingArgs {
    /// Number of samples expected in the directory.
    #[arg(short = 'n', long, value_name = "USIZE", value_parser = positive_count)]
    pub num_samples: usize,

    /// Whether the reads are paired-end or single-end.
    #[arg(short, long, value_enum, default_value_t = ReadLayout::Paired)]
    pub layout: ReadLayout,

    /// Substrings identifying a forward (R1) read file, checked in order.
    #[arg(long, value_name = "STRING", value_delimiter = ',', default_values_t = default_list(NamingConvention::DEFAULT_FORWARD))]
    pub forward_designators: Vec<String>,

    /// Substrings identifying a reverse (R2) read file, checked in order.
    #[arg(long, value_name = "STRING", value_delimiter = ',', default_values_t = default_list(NamingConvention::DEFAULT_REVERSE))]
    pub reverse_designators: Vec<String>,

    /// Recognized compressed-sequence extensions, checked in order.
    #[arg(long, value_name = "STRING", value_delimiter = ',', default_values_t = default_list(NamingConvention::DEFAULT_EXTENSIONS))]
    pub extensions: Vec<String>,
}

impl NamingArgs {
    /// Builds the [`NamingConvention`] described by these arguments.
    pub fn convention(&self) -> NamingConvention {
        NamingConvention::new(
            self.forward_designators.clone(),
            self.reverse_designators.clone(),
            self.extensions.clone(),
        )
    }
}

//=======================//
// Canonical suffix args //
//=======================//

/// The filename endings files are normalized to. Shared by `validate`, which
/// renames files, and `infer`, which only reports the planned renames.
#[derive(Args, Clone, Debug)]
pub struct SuffixArgs {
    /// Canonical filename ending for forward (R1) files.
    #[arg(long, value_name = "STRING", default_value = "_R1_raw.fastq.gz")]
    pub forward_suffix: String,

    /// Canonical filename ending for reverse (R2) files.
    #[arg(long, value_name = "STRING", default_value = "_R2_raw.fastq.gz")]
    pub reverse_suffix: String,

    /// Canonical filename ending for single-end files.
    #[arg(long, value_name = "STRING", default_value = "_raw.fastq.gz")]
    pub single_suffix: String,
}

impl SuffixArgs {
    /// Builds the [`CanonicalSuffixes`] described by these arguments.
    pub fn suffixes(&self) -> CanonicalSuffixes {
        CanonicalSuffixes {
            forward: self.forward_suffix.clone(),
            reverse: self.reverse_suffix.clone(),
            single: self.single_suffix.clone(),
        }
    }
}

fn default_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
