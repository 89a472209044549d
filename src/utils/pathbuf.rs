//! Extensions to and utilities concerning [`PathBuf`]s.
//!
//! # Overview
//!
//! Read directories are handled by filename throughout `rawcheck`, and every
//! file written next to them (manifests, archives) is written to a temporary
//! sibling first and moved into place. This module holds the small path
//! helpers both of those need.
//!
//! ```
//! use std::path::PathBuf;
//! // Trait must be in scope to use it.
//! use rawcheck::utils::pathbuf::AppendExtension;
//!
//! assert_eq!(
//!     PathBuf::from("raw-md5sums.txt")
//!         .append_extension("tmp")
//!         .unwrap(),
//!     PathBuf::from("raw-md5sums.txt.tmp"))
//! ```

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;

/// A trait that adds an [`append_extension`][AppendExtension::append_extension]
/// method to [`PathBuf`], for building sibling paths such as the temporary
/// file a manifest is written to before it is moved into place.
pub trait AppendExtension {
    /// Appends a further extension to the existing one.
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use rawcheck::utils::pathbuf::AppendExtension;
    ///
    /// let zip = PathBuf::from("raw_multiqc_report.zip");
    /// let tmp = zip.append_extension("tmp").unwrap();
    /// assert_eq!(tmp.file_name().unwrap(), "raw_multiqc_report.zip.tmp");
    /// ```
    fn append_extension<P>(self, ext: P) -> anyhow::Result<Self>
    where
        Self: Sized,
        P: AsRef<OsStr>;
}

impl AppendExtension for PathBuf {
    fn append_extension<P>(mut self, ext: P) -> anyhow::Result<Self>
    where
        P: AsRef<OsStr>,
    {
        let mut new_ext = match self.extension() {
            Some(ext) => ext.to_os_string(),
            None => bail!("path did not have an extension: {}", self.display()),
        };

        new_ext.push(".");
        new_ext.push(ext);

        self.set_extension(new_ext);
        Ok(self)
    }
}

/// Lists the names of the regular files directly inside `dir`, sorted.
/// Filenames that are not valid UTF-8 cannot be matched against a naming
/// convention and are an error.
pub fn list_filenames(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => bail!(
                "filename is not valid UTF-8: {}",
                Path::new(&name).display()
            ),
        }
    }

    names.sort();
    Ok(names)
}
