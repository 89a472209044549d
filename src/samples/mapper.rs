//! Builds the canonical mapping from sample ID to read files.

use std::collections::BTreeMap;

use tracing::debug;
use tracing::info;

use crate::errors::ValidationError;
use crate::samples::pattern::infer_sample_id;
use crate::samples::pattern::NamingConvention;
use crate::samples::record::MateRole;
use crate::samples::record::ReadFileRecord;
use crate::samples::record::SampleFile;
use crate::samples::record::SampleRecord;
use crate::samples::record::SampleSet;
use crate::utils::args::ReadLayout;

/// Maps the filenames in a directory listing to samples.
///
/// Non-candidate filenames (those without a recognized extension) are ignored.
/// Every check that can abort the run happens here, before any file is
/// touched: the total count, per-role counts, ambiguous names, duplicate IDs
/// and unpaired IDs.
pub fn map_samples<S>(
    filenames: &[S],
    expected_samples: usize,
    layout: ReadLayout,
    convention: &NamingConvention,
) -> Result<SampleSet, ValidationError>
where
    S: AsRef<str>,
{
    let mut candidates: Vec<&str> = filenames
        .iter()
        .map(|f| f.as_ref())
        .filter(|f| {
            let keep = convention.is_candidate(f);
            if !keep {
                debug!("  [*] Ignoring non-read file: {}", f);
            }
            keep
        })
        .collect();
    candidates.sort_unstable();

    // (1) Check the total count before classifying anything.
    let expected_files = expected_samples * layout.files_per_sample();
    if candidates.len() != expected_files {
        return Err(ValidationError::CountMismatch {
            what: String::from("matching read files"),
            expected: expected_files,
            found: candidates.len(),
        });
    }

    // (2) Classify every candidate.
    let records = candidates
        .iter()
        .map(|f| convention.classify(f, layout))
        .collect::<Result<Vec<_>, _>>()?;

    // (3) Check the per-role counts.
    if layout == ReadLayout::Paired {
        for (role, label) in [
            (MateRole::Forward, "forward (R1) files"),
            (MateRole::Reverse, "reverse (R2) files"),
        ] {
            let found = records.iter().filter(|r| r.role == role).count();
            if found != expected_samples {
                return Err(ValidationError::CountMismatch {
                    what: String::from(label),
                    expected: expected_samples,
                    found,
                });
            }
        }
    }

    // (4) Group by derived sample ID.
    let mut groups: BTreeMap<String, Vec<ReadFileRecord>> = BTreeMap::new();
    for record in records {
        let id = infer_sample_id(&record)?;
        debug!("  [*] {} -> sample {} ({})", record.filename, id, record.role);

        let group = groups.entry(id.clone()).or_default();
        if let Some(existing) = group.iter().find(|r| r.role == record.role) {
            return Err(ValidationError::DuplicateSample {
                sample_id: id,
                first: existing.filename.clone(),
                second: record.filename,
            });
        }
        group.push(record);
    }

    // (5) Every paired sample must have both mates.
    let mut samples = SampleSet::new(layout);
    for (id, mut group) in groups {
        if layout == ReadLayout::Paired && group.len() != 2 {
            return Err(ValidationError::UnpairedSample {
                sample_id: id,
                found: group[0].role,
            });
        }

        group.sort_by_key(|r| r.role);
        let files = group.into_iter().map(SampleFile::new).collect();
        samples.insert(SampleRecord::new(id, files));
    }

    info!(
        "Mapped {} {} files to {} samples.",
        expected_files,
        layout,
        samples.len()
    );

    Ok(samples)
}
