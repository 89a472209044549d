//! Renames read files to their canonical suffixes.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use crate::errors::ValidationError;
use crate::samples::record::Field;
use crate::samples::record::MateRole;
use crate::samples::record::SampleSet;
use crate::samples::record::SkipReason;

/// The canonical filename suffix for each mate role.
#[derive(Clone, Debug)]
pub struct CanonicalSuffixes {
    /// Suffix for forward (R1) files.
    pub forward: String,

    /// Suffix for reverse (R2) files.
    pub reverse: String,

    /// Suffix for single-end files.
    pub single: String,
}

impl CanonicalSuffixes {
    /// The suffix for the given role.
    pub fn for_role(&self, role: MateRole) -> &str {
        match role {
            MateRole::Forward => &self.forward,
            MateRole::Reverse => &self.reverse,
            MateRole::Single => &self.single,
        }
    }
}

impl Default for CanonicalSuffixes {
    fn default() -> Self {
        CanonicalSuffixes {
            forward: String::from("_R1_raw.fastq.gz"),
            reverse: String::from("_R2_raw.fastq.gz"),
            single: String::from("_raw.fastq.gz"),
        }
    }
}

/// One line of the rename audit trail.
#[derive(Clone, Debug, Serialize)]
pub struct RenameEntry {
    /// The sample the file belongs to.
    pub sample_id: String,

    /// The filename before normalization.
    pub original: String,

    /// The filename after normalization, or `not-renamed`.
    pub renamed: String,
}

/// Renames every file in `dir` that does not already end with its canonical
/// suffix to `<sample ID><suffix>`.
///
/// All destinations are checked before the first rename so that a conflict
/// leaves the directory untouched. Each rename updates the in-memory record
/// immediately, so later stages only ever see the new name.
pub fn normalize(
    dir: &Path,
    samples: &mut SampleSet,
    suffixes: &CanonicalSuffixes,
) -> anyhow::Result<Vec<RenameEntry>> {
    info!("Normalizing filenames to the canonical convention.");

    // (1) Plan every rename and check that none clobbers another file.
    for sample in samples.iter() {
        for file in &sample.files {
            let suffix = suffixes.for_role(file.role());
            if file.current_name.ends_with(suffix) {
                continue;
            }

            let target = format!("{}{}", sample.id, suffix);
            if dir.join(&target).exists() {
                return Err(ValidationError::RefusingToOverwrite {
                    from: file.current_name.clone(),
                    to: target,
                }
                .into());
            }
        }
    }

    // (2) Rename.
    let mut audit = Vec::with_capacity(samples.num_files());
    let mut renamed = 0;

    for sample in samples.iter_mut() {
        for file in sample.files.iter_mut() {
            let suffix = suffixes.for_role(file.role());
            let original = file.current_name.clone();

            if original.ends_with(suffix) {
                debug!("  [*] {} already canonical.", original);
                file.renamed = Some(Field::Skipped(SkipReason::NotRenamed));
            } else {
                let target = format!("{}{}", sample.id, suffix);
                fs::rename(dir.join(&original), dir.join(&target))
                    .with_context(|| format!("renaming {} to {}", original, target))?;
                info!("  [*] Renamed {} -> {}", original, target);

                file.current_name = target.clone();
                file.renamed = Some(Field::Value(target));
                renamed += 1;
            }

            audit.push(RenameEntry {
                sample_id: sample.id.clone(),
                original,
                renamed: file
                    .renamed
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
            });
        }
    }

    info!("Renamed {} of {} files.", renamed, audit.len());
    Ok(audit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    use tempfile::TempDir;

    use crate::samples::mapper::map_samples;
    use crate::samples::pattern::NamingConvention;
    use crate::utils::args::ReadLayout;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            File::create(dir.join(name)).unwrap();
        }
    }

    fn mapped(names: &[&str], n: usize, layout: ReadLayout) -> SampleSet {
        map_samples(names, n, layout, &NamingConvention::default()).unwrap()
    }

    #[test]
    fn test_mixed_directory() {
        let dir = TempDir::new().unwrap();
        let names = [
            "A_R1_raw.fastq.gz",
            "A_R2_raw.fastq.gz",
            "B_R1.fastq.gz",
            "B_R2.fastq.gz",
        ];
        touch(dir.path(), &names);

        let mut samples = mapped(&names, 2, ReadLayout::Paired);
        let audit = normalize(dir.path(), &mut samples, &CanonicalSuffixes::default()).unwrap();

        let renamed: Vec<(&str, &str)> = audit
            .iter()
            .map(|e| (e.original.as_str(), e.renamed.as_str()))
            .collect();
        assert_eq!(
            renamed,
            vec![
                ("A_R1_raw.fastq.gz", "not-renamed"),
                ("A_R2_raw.fastq.gz", "not-renamed"),
                ("B_R1.fastq.gz", "B_R1_raw.fastq.gz"),
                ("B_R2.fastq.gz", "B_R2_raw.fastq.gz"),
            ]
        );

        assert!(dir.path().join("B_R1_raw.fastq.gz").exists());
        assert!(!dir.path().join("B_R1.fastq.gz").exists());

        let b = samples.get("B").unwrap();
        assert_eq!(b.files[0].current_name, "B_R1_raw.fastq.gz");
        assert_eq!(b.files[0].record.filename, "B_R1.fastq.gz");
    }

    #[test]
    fn test_normalizing_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let names = ["B_1.fq.gz", "B_2.fq.gz"];
        touch(dir.path(), &names);

        let mut samples = mapped(&names, 1, ReadLayout::Paired);
        normalize(dir.path(), &mut samples, &CanonicalSuffixes::default()).unwrap();

        let listing: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        let mut again = mapped(
            &listing.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            1,
            ReadLayout::Paired,
        );
        let audit = normalize(dir.path(), &mut again, &CanonicalSuffixes::default()).unwrap();

        assert_eq!(audit.len(), 2);
        assert!(audit.iter().all(|e| e.renamed == "not-renamed"));
    }

    #[test]
    fn test_single_end_suffix() {
        let dir = TempDir::new().unwrap();
        let names = ["C.fq.gz", "D_raw.fastq.gz"];
        touch(dir.path(), &names);

        let mut samples = mapped(&names, 2, ReadLayout::Single);
        let audit = normalize(dir.path(), &mut samples, &CanonicalSuffixes::default()).unwrap();

        assert_eq!(audit[0].renamed, "C_raw.fastq.gz");
        assert_eq!(audit[1].renamed, "not-renamed");
        assert!(dir.path().join("C_raw.fastq.gz").exists());
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let names = ["E.fastq.gz"];
        touch(dir.path(), &names);

        let mut samples = mapped(&names, 1, ReadLayout::Single);
        touch(dir.path(), &["E_raw.fastq.gz"]);

        let err = normalize(dir.path(), &mut samples, &CanonicalSuffixes::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::RefusingToOverwrite { .. })
        ));
        assert!(dir.path().join("E.fastq.gz").exists());
    }
}
