//! Repository detection.

use crate::error::{Error, Result};
use git2::Repository;
use std::path::Path;
use tracing::debug;

/// Fails unless `path` is inside a git repository.
///
/// Parent directories are searched, so any subdirectory of a work tree
/// qualifies.
///
/// # Errors
///
/// Returns [`Error::NotARepository`] if no repository is found.
pub fn ensure_repository(path: &Path) -> Result<()> {
    match Repository::discover(path) {
        Ok(repo) => {
            debug!("Found git repository at {}", repo.path().display());
            Ok(())
        }
        Err(e) => {
            debug!("Repository discovery failed for {}: {}", path.display(), e);
            Err(Error::not_a_repository(path))
        }
    }
}
