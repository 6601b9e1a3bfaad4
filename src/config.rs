use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the completion API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the completion API base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
/// Environment variable overriding the model identifier.
pub const MODEL_ENV: &str = "OPENAI_MODEL";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_OUTPUT_DIR: &str = ".cursor";
const DEFAULT_RULES_FILE: &str = "rules";
const DEFAULT_MISSING_FEATURES_FILE: &str = "missing-features.md";
const DEFAULT_AUDIT_FILE: &str = "request.txt";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Configuration for a generation run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to scan for files
    pub root_dir: PathBuf,

    /// Output directory for the generated files, relative to `root_dir`
    pub output_dir: PathBuf,

    /// File name of the rules artifact inside `output_dir`
    pub rules_file: String,

    /// File name of the missing-features artifact inside `output_dir`
    pub missing_features_file: String,

    /// File receiving the flattened request text, relative to `root_dir`
    pub audit_file: PathBuf,

    /// Completion API key
    pub api_key: String,

    /// Completion API base URL
    pub base_url: String,

    /// Model identifier sent with the request
    pub model: String,

    /// Timeout for the completion request
    pub request_timeout: Duration,

    /// Additional gitignore-syntax patterns to exclude
    pub extra_ignores: Vec<String>,

    /// Path to an external user prompt template
    pub template_path: Option<PathBuf>,

    /// Fail instead of degrading when the reply lacks the second section
    pub strict_response: bool,

    /// Flatten and write the audit file, but skip the request and outputs
    pub dry_run: bool,

    /// Back up existing output files before overwriting them
    pub backup_existing: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("root_dir", &self.root_dir)
            .field("output_dir", &self.output_dir)
            .field("rules_file", &self.rules_file)
            .field("missing_features_file", &self.missing_features_file)
            .field("audit_file", &self.audit_file)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("extra_ignores", &self.extra_ignores)
            .field("template_path", &self.template_path)
            .field("strict_response", &self.strict_response)
            .field("dry_run", &self.dry_run)
            .field("backup_existing", &self.backup_existing)
            .finish()
    }
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use cursor_rulegen::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir(".")
    ///     .api_key("sk-test")
    ///     .build()
    ///     .expect("valid configuration");
    /// assert_eq!(config.model, "gpt-4o");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - The API key is missing (unless in dry run mode)
    /// - The base URL is not http(s)
    /// - An output file name is empty or contains a path separator
    /// - The custom template is invalid
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.api_key.trim().is_empty() && !self.dry_run {
            return Err(Error::missing_credential(API_KEY_ENV));
        }

        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(Error::config(format!(
                "Base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }

        for (label, name) in [
            ("rules_file", &self.rules_file),
            ("missing_features_file", &self.missing_features_file),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(Error::config(format!(
                    "{label} must be a plain file name, got '{name}'"
                )));
            }
        }

        if self.rules_file == self.missing_features_file {
            return Err(Error::config(
                "rules_file and missing_features_file must differ",
            ));
        }

        if self.audit_file.as_os_str().is_empty() {
            return Err(Error::config("audit_file must not be empty"));
        }

        if let Some(ref template_path) = self.template_path {
            crate::template::validate_user_template(template_path)?;
        }

        Ok(())
    }

    /// Absolute-or-root-relative path of the output directory.
    #[must_use]
    pub fn output_dir_path(&self) -> PathBuf {
        self.root_dir.join(&self.output_dir)
    }

    /// Path of the rules artifact.
    #[must_use]
    pub fn rules_path(&self) -> PathBuf {
        self.output_dir_path().join(&self.rules_file)
    }

    /// Path of the missing-features artifact.
    #[must_use]
    pub fn missing_features_path(&self) -> PathBuf {
        self.output_dir_path().join(&self.missing_features_file)
    }

    /// Path of the audit file.
    #[must_use]
    pub fn audit_path(&self) -> PathBuf {
        self.root_dir.join(&self.audit_file)
    }

    /// Display label for the rules artifact, e.g. `.cursor/rules`.
    ///
    /// The labels are what the prompt asks the model to emit, so they are
    /// also the markers used to split its reply.
    #[must_use]
    pub fn rules_label(&self) -> String {
        display_label(&self.output_dir, &self.rules_file)
    }

    /// Display label for the missing-features artifact.
    #[must_use]
    pub fn missing_features_label(&self) -> String {
        display_label(&self.output_dir, &self.missing_features_file)
    }

    /// Patterns excluding this run's own artifacts from the walk.
    #[must_use]
    pub(crate) fn artifact_ignores(&self) -> Vec<String> {
        let mut patterns = Vec::with_capacity(2);
        for path in [&self.output_dir, &self.audit_file] {
            let rel = path.to_string_lossy().replace('\\', "/");
            let rel = rel.trim_start_matches("./").trim_end_matches('/');
            if !rel.is_empty() && !Path::new(rel).is_absolute() {
                patterns.push(format!("/{rel}"));
            }
        }
        patterns
    }
}

fn display_label(dir: &Path, file: &str) -> String {
    let dir = dir.to_string_lossy().replace('\\', "/");
    let dir = dir.trim_start_matches("./").trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            rules_file: DEFAULT_RULES_FILE.to_string(),
            missing_features_file: DEFAULT_MISSING_FEATURES_FILE.to_string(),
            audit_file: PathBuf::from(DEFAULT_AUDIT_FILE),
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            extra_ignores: Vec::new(),
            template_path: None,
            strict_response: false,
            dry_run: false,
            backup_existing: false,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    rules_file: Option<String>,
    missing_features_file: Option<String>,
    audit_file: Option<PathBuf>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    request_timeout: Option<Duration>,
    extra_ignores: Vec<String>,
    template_path: Option<PathBuf>,
    strict_response: bool,
    dry_run: bool,
    backup_existing: bool,
}

impl ConfigBuilder {
    /// Creates a builder seeded from the process environment.
    ///
    /// Reads [`API_KEY_ENV`], [`BASE_URL_ENV`] and [`MODEL_ENV`]. Unset or
    /// empty variables leave the corresponding field at its default; a
    /// missing API key is reported by [`ConfigBuilder::build`].
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            api_key: var(API_KEY_ENV),
            base_url: var(BASE_URL_ENV),
            model: var(MODEL_ENV),
            ..Self::default()
        }
    }

    /// Sets the root directory to scan.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the output directory, relative to the root directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the rules artifact file name.
    #[must_use]
    pub fn rules_file(mut self, name: impl Into<String>) -> Self {
        self.rules_file = Some(name.into());
        self
    }

    /// Sets the missing-features artifact file name.
    #[must_use]
    pub fn missing_features_file(mut self, name: impl Into<String>) -> Self {
        self.missing_features_file = Some(name.into());
        self
    }

    /// Sets the audit file path, relative to the root directory.
    #[must_use]
    pub fn audit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_file = Some(path.into());
        self
    }

    /// Sets the completion API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the completion API base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the completion request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Adds gitignore-syntax patterns excluded on top of the built-in list.
    #[must_use]
    pub fn extra_ignores(mut self, patterns: Vec<String>) -> Self {
        self.extra_ignores = patterns;
        self
    }

    /// Sets the path to an external user prompt template.
    ///
    /// The template must exist, compile with Tera and reference `listing`.
    #[must_use]
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Rejects replies that lack the missing-features section.
    #[must_use]
    pub fn strict_response(mut self, enabled: bool) -> Self {
        self.strict_response = enabled;
        self
    }

    /// Enables dry run mode (no request, no output files).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables backup creation.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();
        let config = Config {
            root_dir: self.root_dir.unwrap_or(defaults.root_dir),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            rules_file: self.rules_file.unwrap_or(defaults.rules_file),
            missing_features_file: self
                .missing_features_file
                .unwrap_or(defaults.missing_features_file),
            audit_file: self.audit_file.unwrap_or(defaults.audit_file),
            api_key: self.api_key.unwrap_or(defaults.api_key),
            base_url: self
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: self.model.unwrap_or(defaults.model),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            extra_ignores: self.extra_ignores,
            template_path: self.template_path,
            strict_response: self.strict_response,
            dry_run: self.dry_run,
            backup_existing: self.backup_existing,
        };

        config.validate()?;
        Ok(config)
    }
}
