use crate::{error::Result, ignore_set::IgnoreSet};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

/// Walks a directory tree and collects the files eligible for flattening.
pub(crate) struct Walker<'a> {
    root: PathBuf,
    ignore_set: &'a IgnoreSet,
}

impl<'a> Walker<'a> {
    /// Creates a walker rooted at `root`.
    pub(crate) fn new(root: impl Into<PathBuf>, ignore_set: &'a IgnoreSet) -> Self {
        Self {
            root: root.into(),
            ignore_set,
        }
    }

    /// Returns every non-ignored regular file under the root.
    ///
    /// Paths are root-relative with `/` separators, in directory-entry
    /// pre-order. Ignored directories are pruned, never descended into.
    /// Symbolic links are not followed and, like other non-regular entries,
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be read.
    pub(crate) fn walk(&self) -> Result<Vec<String>> {
        debug!("Walking {}", self.root.display());

        let entries = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !self.is_ignored(entry));

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                continue;
            }

            let relative_path = relative_path(&self.root, entry.path());
            if file_type.is_file() {
                trace!("Collected {}", relative_path);
                files.push(relative_path);
            } else {
                debug!("Skipping non-regular file: {}", relative_path);
            }
        }

        debug!("Walk complete: {} files", files.len());
        Ok(files)
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        let relative_path = relative_path(&self.root, entry.path());
        let ignored = self
            .ignore_set
            .is_ignored(&relative_path, entry.file_type().is_dir());

        if ignored {
            trace!("Ignoring {}", relative_path);
        }
        ignored
    }
}

/// Computes the `/`-separated path of `path` relative to `root`.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
