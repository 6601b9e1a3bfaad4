use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cursor-rulegen library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The root directory is not inside a git repository.
    #[error("'{path}' is not a git repository")]
    NotARepository {
        /// Directory that was checked
        path: PathBuf,
    },

    /// A required credential was not provided.
    #[error("{variable} is not set")]
    MissingCredential {
        /// Name of the environment variable holding the credential
        variable: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Invalid ignore pattern or unreadable ignore file.
    #[error("Invalid ignore rules: {message}")]
    Ignore {
        /// Error message
        message: String,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Prompt template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Custom template failed validation.
    #[error("Template validation failed for '{path}': {reason}")]
    TemplateValidation {
        /// Template path
        path: String,
        /// Why the template was rejected
        reason: String,
    },

    /// Transport-level failure talking to the completion endpoint.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message
        message: String,
    },

    /// The completion endpoint answered with an error.
    #[error("Completion API error (status {status}): {message}")]
    Api {
        /// HTTP status code, 0 when the body itself was unusable
        status: u16,
        /// Error message or response body
        message: String,
    },

    /// The model reply did not contain the expected sections.
    #[error("Malformed model response: missing '{marker}' section")]
    MalformedResponse {
        /// Marker that was expected in the reply
        marker: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// System time error.
    #[error("System time error: {message}")]
    SystemTime {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        // tera keeps the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(&source);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a template validation error.
    #[must_use]
    pub fn template_validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TemplateValidation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a not-a-repository error.
    #[must_use]
    pub fn not_a_repository(path: impl Into<PathBuf>) -> Self {
        Self::NotARepository { path: path.into() }
    }

    /// Creates a missing credential error.
    #[must_use]
    pub fn missing_credential(variable: impl Into<String>) -> Self {
        Self::MissingCredential {
            variable: variable.into(),
        }
    }

    /// Creates an API error.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed_response(marker: impl Into<String>) -> Self {
        Self::MalformedResponse {
            marker: marker.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if a precondition for running was not met.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotARepository { .. } | Self::MissingCredential { .. }
        )
    }

    /// Returns true if the error came from the completion endpoint.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Api { .. })
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(e: std::time::SystemTimeError) -> Self {
        Self::SystemTime {
            message: e.to_string(),
        }
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::template("unknown", e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::api(status.as_u16(), e.to_string()),
            None => Self::Http {
                message: e.to_string(),
            },
        }
    }
}

impl From<ignore::Error> for Error {
    fn from(e: ignore::Error) -> Self {
        Self::Ignore {
            message: e.to_string(),
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(std::path::Path::to_path_buf).unwrap_or_default();
        match e.into_io_error() {
            Some(io) => Self::io(path, io),
            None => Self::Io {
                path,
                message: "filesystem loop detected".to_string(),
            },
        }
    }
}
