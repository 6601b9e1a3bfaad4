//! Ignore rules applied while walking the repository.
//!
//! The set starts from a built-in exclusion list and then layers the
//! project's root `.gitignore` on top, with gitignore semantics (later
//! patterns win, `!` re-includes).

use crate::error::Result;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;
use tracing::{debug, warn};

/// Name of the project ignore file read from the root directory.
pub const IGNORE_FILE: &str = ".gitignore";

/// Patterns excluded from every walk, in gitignore syntax.
pub const BUILTIN_EXCLUDES: &[&str] = &[
    // version control
    ".git",
    ".svn",
    ".hg",
    // dependencies
    "node_modules/",
    "bower_components/",
    ".venv/",
    "venv/",
    "__pycache__/",
    // build output
    "dist/",
    "build/",
    "out/",
    "target/",
    "coverage/",
    ".next/",
    ".nuxt/",
    ".turbo/",
    ".cache/",
    // editors and OS noise
    ".idea/",
    ".vscode/",
    ".DS_Store",
    // secrets
    ".env",
    ".env.*",
    // lock files
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "*.log",
    // binary assets
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.webp",
    "*.bmp",
    "*.pdf",
    "*.zip",
    "*.tar",
    "*.gz",
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.otf",
    "*.mp3",
    "*.mp4",
    "*.exe",
    "*.dll",
    "*.so",
    "*.dylib",
    "*.wasm",
];

/// Immutable predicate deciding which root-relative paths are skipped.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    matcher: Gitignore,
}

impl IgnoreSet {
    /// Builds the ignore set for `root`.
    ///
    /// `extra` patterns are added after the built-in list and before the
    /// project ignore file. A missing ignore file is not an error; an
    /// unreadable one is. Invalid individual lines are skipped with a
    /// warning, the way git itself treats them.
    ///
    /// # Errors
    ///
    /// Returns an error if an extra pattern is invalid or the project ignore
    /// file exists but cannot be read.
    pub fn build(root: &Path, extra: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);

        for pattern in BUILTIN_EXCLUDES {
            builder.add_line(None, pattern)?;
        }

        for pattern in extra {
            builder.add_line(None, pattern)?;
        }

        let ignore_file = root.join(IGNORE_FILE);
        if ignore_file.is_file() {
            if let Some(err) = builder.add(&ignore_file) {
                if err.is_io() {
                    return Err(err.into());
                }
                warn!("Skipping invalid lines in {}: {}", ignore_file.display(), err);
            }
            debug!("Loaded ignore rules from {}", ignore_file.display());
        } else {
            debug!("No {} found in {}", IGNORE_FILE, root.display());
        }

        let matcher = builder.build()?;
        debug!("Ignore set built with {} patterns", matcher.num_ignores());

        Ok(Self { matcher })
    }

    /// Returns true if `relative_path` (or any of its parents) is excluded.
    ///
    /// `relative_path` uses `/` separators and is relative to the root the
    /// set was built for.
    #[must_use]
    pub fn is_ignored(&self, relative_path: &str, is_dir: bool) -> bool {
        if relative_path.is_empty() {
            return false;
        }

        self.matcher
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }
}
