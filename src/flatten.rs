//! Serializes the collected files into a single annotated listing.

use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

const HEADER_PREFIX: &str = "--- FILE: ";
const HEADER_SUFFIX: &str = " ---";

/// Returns the header line (without newline) that introduces `relative_path`.
#[must_use]
pub fn file_header(relative_path: &str) -> String {
    format!("{HEADER_PREFIX}{relative_path}{HEADER_SUFFIX}")
}

/// Builds the flattened text for a list of root-relative files.
pub(crate) struct Flattener {
    root: PathBuf,
}

impl Flattener {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads every file in order and concatenates them.
    ///
    /// Each file contributes its header line, its raw content and a blank
    /// line. No size limit is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or is not valid UTF-8.
    pub(crate) fn flatten(&self, files: &[String]) -> Result<String> {
        let mut output = String::new();

        for relative_path in files {
            let path = self.root.join(relative_path);
            let content = read_text(&path)?;

            trace!("Flattening {} ({} bytes)", relative_path, content.len());
            push_file(&mut output, relative_path, &content);
        }

        Ok(output)
    }
}

fn push_file(output: &mut String, relative_path: &str, content: &str) {
    output.reserve(HEADER_PREFIX.len() + relative_path.len() + content.len() + 8);
    output.push_str(&file_header(relative_path));
    output.push('\n');
    output.push_str(content);
    output.push_str("\n\n");
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::InvalidData {
            Error::invalid_utf8(path)
        } else {
            Error::io(path, e)
        }
    })
}
