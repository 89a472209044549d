use clap::Parser;
use clap::Subcommand;
use git_testament::git_testament;
use git_testament::render_testament;

use rawcheck::errors::exit;
use rawcheck::errors::ExitCode;
use rawcheck::infer;
use rawcheck::report::summary::Outcome;
use rawcheck::validate;

git_testament!(TESTAMENT);

#[derive(Subcommand)]
pub enum Subcommands {
    /// Validates and normalizes a directory of raw read files.
    Validate(validate::command::ValidateArgs),

    /// Infers samples from filenames without touching anything.
    Infer(infer::command::InferArgs),
}

#[derive(Parser)]
#[command(
    author,
    version = render_testament!(TESTAMENT),
    propagate_version = true,
    about
)]
struct Cli {
    #[command(subcommand)]
    pub command: Subcommands,

    /// Only errors are printed to the stderr stream.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// All available information, including debug information, is printed
    /// to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut level = tracing::Level::INFO;
    if cli.quiet {
        level = tracing::Level::ERROR;
    } else if cli.verbose {
        level = tracing::Level::DEBUG;
    }

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Subcommands::Validate(args) => match validate::command::validate(args) {
            Ok(Outcome::Success) => Ok(()),
            Ok(Outcome::CompletedWithWarnings) => exit(
                "validation completed with warnings; see the summary for details",
                ExitCode::CompletedWithWarnings,
            ),
            Err(e) => {
                let message = format!("{:#}", e);
                exit(message.as_str(), ExitCode::InvalidInputData)
            }
        },
        Subcommands::Infer(args) => infer::command::infer(args),
    }
}
