use crate::{
    config::Config,
    error::{Error, Result},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::debug;

/// Writes the audit file and the generated artifacts.
pub(crate) struct Writer {
    output_dir: PathBuf,
    backup_existing: bool,
}

impl Writer {
    /// Creates a new writer from configuration.
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir_path(),
            backup_existing: config.backup_existing,
        }
    }

    /// Writes the flattened request text verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be written.
    pub(crate) fn write_audit(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        Self::write_file_atomic(path, text)?;
        debug!("Wrote audit file {} ({} bytes)", path.display(), text.len());
        Ok(())
    }

    /// Creates the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub(crate) fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))
    }

    /// Writes one artifact, backing up an existing file first if enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup or the write fails.
    pub(crate) fn write_artifact(&self, path: &Path, content: &str) -> Result<()> {
        if self.backup_existing && path.exists() {
            Self::backup_file(path)?;
        }

        Self::write_file_atomic(path, content)?;
        debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    /// Writes a file atomically.
    ///
    /// Content goes to a sibling temporary file which is synced and then
    /// renamed over the target.
    fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
        let temp_path = temp_path_for(path);
        let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(&temp_path, e))?;

        temp_file
            .sync_all()
            .map_err(|e| Error::io(&temp_path, e))?;

        drop(temp_file);

        fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

        Ok(())
    }

    /// Creates a timestamped backup of an existing file.
    fn backup_file(path: &Path) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_nanos();

        let filename = path
            .file_name()
            .ok_or_else(|| Error::config("Invalid file path"))?
            .to_string_lossy();

        let backup_name = format!("{filename}.backup.{timestamp}");
        let backup_path = path
            .parent()
            .ok_or_else(|| Error::config("Invalid file path"))?
            .join(backup_name);

        fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

        debug!("Created backup: {}", backup_path.display());
        Ok(())
    }
}

// `rules` has no extension, so append instead of `with_extension`.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
