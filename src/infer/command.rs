//! Functionality related to the `rawcheck infer` command itself.

use std::path::PathBuf;

use clap::Args;
use prettytable::row;
use prettytable::Table;
use tracing::debug;
use tracing::info;

use crate::samples::mapper::map_samples;
use crate::samples::normalize::CanonicalSuffixes;
use crate::samples::record::SampleSet;
use crate::utils::args::NamingArgs;
use crate::utils::args::SuffixArgs;
use crate::utils::pathbuf::list_filenames;

//========================//
// Command line arguments //
//========================//

/// Clap arguments for the `rawcheck infer` subcommand.
#[derive(Args)]
pub struct InferArgs {
    /// Directory holding the raw read files. Nothing is modified.
    #[arg(value_name = "DIR")]
    reads_dir: PathBuf,

    #[command(flatten)]
    naming: NamingArgs,

    #[command(flatten)]
    suffixes: SuffixArgs,
}

/// Lays out the inferred samples as a table: one row per file, with the name
/// normalization would give it (or `-` if it is already canonical).
pub fn sample_table(samples: &SampleSet, suffixes: &CanonicalSuffixes) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Sample", "Role", "File", "Renamed to"]);

    for sample in samples.iter() {
        for file in &sample.files {
            let suffix = suffixes.for_role(file.role());
            let target = match file.current_name.ends_with(suffix) {
                true => String::from("-"),
                false => format!("{}{}", sample.id, suffix),
            };
            table.add_row(row![sample.id, file.role(), file.current_name, target]);
        }
    }

    table
}

//==============//
// Main command //
//==============//

/// Main method for the `rawcheck infer` subcommand.
pub fn infer(args: InferArgs) -> anyhow::Result<()> {
    info!("Starting infer command...");
    debug!("  [*] Reads directory: {}", args.reads_dir.display());

    let filenames = list_filenames(&args.reads_dir)?;
    let samples = map_samples(
        &filenames,
        args.naming.num_samples,
        args.naming.layout,
        &args.naming.convention(),
    )?;

    info!(
        "Inferred {} {} samples from {} files.",
        samples.len(),
        samples.layout,
        samples.num_files()
    );
    sample_table(&samples, &args.suffixes.suffixes()).printstd();

    Ok(())
}
