//! Archive integrity testing.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::samples::record::ProblemFiles;
use crate::samples::record::SampleSet;
use crate::tools::Toolbox;
use crate::utils::display::file_progress;
use crate::utils::display::PercentageFormat;

/// The result of testing a single archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum IntegrityStatus {
    /// The archive decompressed cleanly.
    Pass,

    /// The archive is corrupt or truncated.
    Fail,
}

impl fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityStatus::Pass => write!(f, "passed"),
            IntegrityStatus::Fail => write!(f, "failed-gzip-test"),
        }
    }
}

/// Tests every file in the mapping. A failing file is recorded in `problems`
/// and the run carries on; only a tool that cannot be run at all is an error.
pub fn check_integrity<T>(
    dir: &Path,
    samples: &mut SampleSet,
    problems: &mut ProblemFiles,
    tools: &T,
) -> anyhow::Result<()>
where
    T: Toolbox + ?Sized,
{
    info!("Testing the integrity of {} files.", samples.num_files());

    let total = samples.num_files();
    let pb = file_progress(total as u64, "Testing");

    for file in samples.files_mut() {
        let passed = tools.test_archive(&dir.join(&file.current_name))?;

        file.integrity = Some(match passed {
            true => IntegrityStatus::Pass,
            false => {
                warn!("{} failed the integrity test.", file.current_name);
                problems.insert(file.current_name.clone());
                IntegrityStatus::Fail
            }
        });

        pb.inc(1);
    }
    pb.finish_and_clear();

    let passed = total - problems.len();
    info!(
        "{} of {} files passed the integrity test ({}).",
        passed,
        total,
        PercentageFormat(passed as u64, total as u64)
    );

    Ok(())
}
