//! Functionality related to the `rawcheck validate` command itself.

use std::path::PathBuf;

use clap::Args;
use itertools::Itertools;
use prettytable::row;
use prettytable::Table;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::config::Config;
use super::pipeline;
use crate::metrics::QcTableLayout;
use crate::report::summary::Outcome;
use crate::tools::NativeToolbox;
use crate::tools::ProcessToolbox;
use crate::tools::Toolbox;
use crate::utils::args::NamingArgs;
use crate::utils::args::SuffixArgs;

//========================//
// Command line arguments //
//========================//

/// Clap arguments for the `rawcheck validate` subcommand.
#[derive(Args)]
pub struct ValidateArgs {
    /// Directory holding the raw read files. Files are renamed in place.
    #[arg(value_name = "DIR")]
    reads_dir: PathBuf,

    #[command(flatten)]
    naming: NamingArgs,

    /// Checksum manifest to validate the reads against. Checksums are
    /// generated when this is not given.
    #[arg(short = 'm', long, value_name = "PATH")]
    md5_file: Option<PathBuf>,

    /// Keep the per-file QC output and the uncompressed QC report.
    #[arg(short = 'k', long)]
    keep_intermediate: bool,

    /// Directory to output files to. Defaults to the reads directory.
    #[arg(short = 'o', long, value_name = "PATH")]
    output_directory: Option<PathBuf>,

    /// Output prefix for the files that will be created.
    #[arg(short = 'p', long, value_name = "STRING", default_value = "")]
    output_prefix: String,

    /// Number of threads handed to the QC tool.
    #[arg(short = 't', long, value_name = "USIZE", default_value_t = 4)]
    threads: usize,

    /// Test archives and compute checksums in-process instead of running
    /// `gzip` and `md5sum`.
    #[arg(long)]
    native_tools: bool,

    #[command(flatten)]
    suffixes: SuffixArgs,
}

//====================================//
// Prepares the `validate` subcommand //
//====================================//

/// Main method for the `rawcheck validate` subcommand.
pub fn validate(args: ValidateArgs) -> anyhow::Result<Outcome> {
    info!("Starting validate command...");
    debug!("Arguments:");

    //=================//
    // Reads directory //
    //=================//

    let reads_dir = args.reads_dir;
    debug!("  [*] Reads directory: {}", reads_dir.display());

    //========//
    // Naming //
    //========//

    let naming = args.naming;
    debug!("  [*] Number of samples: {}", naming.num_samples);
    debug!("  [*] Layout: {}", naming.layout);
    debug!("  [*] Forward designators: {}", naming.forward_designators.iter().join(", "));
    debug!("  [*] Reverse designators: {}", naming.reverse_designators.iter().join(", "));
    debug!("  [*] Extensions: {}", naming.extensions.iter().join(", "));

    let suffixes = args.suffixes.suffixes();
    debug!("  [*] Canonical suffixes: {:?}", suffixes);

    //===========//
    // Checksums //
    //===========//

    let manifest = args.md5_file;
    match &manifest {
        Some(path) => debug!("  [*] Checksum manifest: {}", path.display()),
        None => debug!("  [*] Checksum manifest: none, generating"),
    }

    //========//
    // Output //
    //========//

    let output_dir = args.output_directory.unwrap_or_else(|| reads_dir.clone());
    debug!("  [*] Output directory: {}", output_dir.display());
    debug!("  [*] Output prefix: {:?}", args.output_prefix);
    debug!("  [*] Keep intermediate: {}", args.keep_intermediate);
    debug!("  [*] Threads: {}", args.threads);
    debug!("  [*] Native tools: {}", args.native_tools);

    let config = Config {
        reads_dir,
        sample_count: naming.num_samples,
        layout: naming.layout,
        manifest,
        keep_intermediate: args.keep_intermediate,
        convention: naming.convention(),
        suffixes,
        qc_layout: QcTableLayout::default(),
        output_dir,
        output_prefix: args.output_prefix,
        threads: args.threads,
    };

    let tools: Box<dyn Toolbox> = match args.native_tools {
        true => Box::new(NativeToolbox::default()),
        false => Box::new(ProcessToolbox::default()),
    };

    //==================//
    // Run the pipeline //
    //==================//

    let result = pipeline::run(&config, tools.as_ref())?;

    if !result.report.problem_files.is_empty() {
        let mut table = Table::new();
        table.add_row(row!["Sample", "File", "Reasons"]);
        for problem in &result.report.problem_files {
            table.add_row(row![
                problem.sample_id,
                problem.filename,
                problem.reasons.iter().join(", ")
            ]);
        }

        warn!(
            "{} of {} files failed a check.",
            result.report.problem_files.len(),
            result.report.num_files
        );
        table.printstd();
    }

    info!("Done. Outcome: {:?}.", result.report.outcome);
    Ok(result.report.outcome)
}
