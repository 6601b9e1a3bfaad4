//! # cursor-rulegen
//!
//! Generates Cursor editor rule files for a git repository by asking a
//! chat-completion model to summarize the project.
//!
//! ## Features
//!
//! - `.gitignore`-aware repository walk with a built-in exclusion list
//! - Plain-text flattening of every collected file with an audit copy
//! - OpenAI-compatible completion client behind a swappable trait
//! - Atomic writes of `.cursor/rules` and `.cursor/missing-features.md`
//!
//! ## Quick Start
//!
//! ```no_run
//! use cursor_rulegen::{ConfigBuilder, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ConfigBuilder::from_env()
//!     .root_dir("./my-project")
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A run is a single pass:
//! 1. **Ignore set**: built-in excludes plus the root `.gitignore`
//! 2. **Walker**: collects every non-ignored regular file
//! 3. **Flattener**: concatenates the files under `--- FILE: ` headers
//! 4. **Completion client**: sends the listing to the model
//! 5. **Writer**: splits the reply and persists both artifacts

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod completion;
mod config;
mod error;
mod flatten;
mod ignore_set;
mod pipeline;
mod repo;
mod template;
mod walker;
mod writer;

pub use completion::{
    ChatMessage, CompletionClient, CompletionRequest, CompletionResult, OpenAiClient, Role,
    parse_reply,
};
pub use config::{API_KEY_ENV, BASE_URL_ENV, Config, ConfigBuilder, MODEL_ENV};
pub use error::{Error, Result};
pub use flatten::file_header;
pub use ignore_set::{BUILTIN_EXCLUDES, IGNORE_FILE, IgnoreSet};
pub use pipeline::{Pipeline, PipelineStats};
pub use repo::ensure_repository;
pub use template::Prompt;

/// Runs one generation with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid or the API key is missing
/// - The root directory is not inside a git repository
/// - A file cannot be read or is not valid UTF-8
/// - The completion request fails
/// - Output files cannot be written
///
/// # Examples
///
/// ```no_run
/// use cursor_rulegen::{ConfigBuilder, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = ConfigBuilder::from_env().root_dir(".").build()?;
///
/// run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run()
}
