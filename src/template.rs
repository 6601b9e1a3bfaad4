use crate::{
    config::Config,
    error::{Error, Result},
};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tera::{Context, Tera};
use tracing::debug;

const SYSTEM_TEMPLATE: &str = "system";
const USER_TEMPLATE: &str = "user";

/// Maximum custom template file size (1MB)
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// Variable a user template must reference, otherwise the listing is lost.
const REQUIRED_VARIABLE: &str = "listing";

#[derive(Serialize)]
struct PromptContext<'a> {
    listing: &'a str,
    file_count: usize,
    rules_path: &'a str,
    missing_features_path: &'a str,
}

/// Rendered system and user messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System instruction
    pub system: String,
    /// User message embedding the listing
    pub user: String,
}

/// Renders the prompt messages sent to the completion endpoint.
pub(crate) struct PromptTemplate {
    tera: Tera,
    rules_path: String,
    missing_features_path: String,
}

impl PromptTemplate {
    /// Creates the template set, replacing the user template when the
    /// configuration names a custom one.
    ///
    /// # Errors
    ///
    /// Returns an error if a template cannot be read or compiled.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template(SYSTEM_TEMPLATE, include_str!("../templates/system.tera"))
            .map_err(|e| Error::template(SYSTEM_TEMPLATE, e))?;

        match config.template_path {
            Some(ref path) => {
                let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
                tera.add_raw_template(USER_TEMPLATE, &content)
                    .map_err(|e| Error::template(path.display().to_string(), e))?;
                debug!("Using custom user template {}", path.display());
            }
            None => {
                tera.add_raw_template(USER_TEMPLATE, include_str!("../templates/user.tera"))
                    .map_err(|e| Error::template(USER_TEMPLATE, e))?;
            }
        }

        Ok(Self {
            tera,
            rules_path: config.rules_label(),
            missing_features_path: config.missing_features_label(),
        })
    }

    /// Renders both messages for the given listing.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub(crate) fn render(&self, listing: &str, file_count: usize) -> Result<Prompt> {
        let context = PromptContext {
            listing,
            file_count,
            rules_path: &self.rules_path,
            missing_features_path: &self.missing_features_path,
        };
        let context = Context::from_serialize(&context)?;

        let system = self
            .tera
            .render(SYSTEM_TEMPLATE, &context)
            .map_err(|e| Error::template(SYSTEM_TEMPLATE, e))?;
        let user = self
            .tera
            .render(USER_TEMPLATE, &context)
            .map_err(|e| Error::template(USER_TEMPLATE, e))?;

        Ok(Prompt { system, user })
    }
}

/// Validates an external user prompt template.
///
/// Checks that the file exists, is within the size limit, is not empty,
/// compiles with Tera and references the `listing` variable.
///
/// # Errors
///
/// Returns an error describing the first failed check.
pub(crate) fn validate_user_template(path: &Path) -> Result<()> {
    let label = path.display().to_string();

    if !path.exists() {
        return Err(Error::config(format!(
            "Template file does not exist: {label}"
        )));
    }

    if !path.is_file() {
        return Err(Error::template_validation(label, "Path is not a file"));
    }

    let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    if metadata.len() > MAX_TEMPLATE_SIZE {
        return Err(Error::template_validation(
            label,
            format!(
                "Template file too large: {} bytes (max: {} bytes)",
                metadata.len(),
                MAX_TEMPLATE_SIZE
            ),
        ));
    }

    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    if content.trim().is_empty() {
        return Err(Error::template_validation(label, "Template file is empty"));
    }

    let mut tera = Tera::default();
    tera.add_raw_template("validation", &content).map_err(|e| {
        Error::template_validation(label.clone(), format!("Template syntax error: {e}"))
    })?;

    if !content.contains(REQUIRED_VARIABLE) {
        return Err(Error::template_validation(
            label,
            format!("Template must reference `{{{{ {REQUIRED_VARIABLE} }}}}`"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn create_test_config(root: &Path) -> Config {
        Config::builder()
            .root_dir(root)
            .api_key("sk-test")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builtin_templates_render() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = PromptTemplate::new(&create_test_config(temp.path())).unwrap();

        let listing = "--- FILE: a.rs ---\nfn a() {}\n\n";
        let prompt = template.render(listing, 1).unwrap();

        assert!(prompt.system.contains(".cursor/rules"));
        assert!(prompt.system.contains(".cursor/missing-features.md"));
        assert!(prompt.user.contains(listing));
        assert!(prompt.user.contains("1. .cursor/rules"));
        assert!(prompt.user.contains("2. .cursor/missing-features.md"));
    }

    #[test]
    fn test_listing_is_not_escaped() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = PromptTemplate::new(&create_test_config(temp.path())).unwrap();

        let listing = "--- FILE: a.html ---\n<div class=\"x\">&amp;</div>\n{{ not_a_var }}\n\n";
        let prompt = template.render(listing, 1).unwrap();

        assert!(prompt.user.contains(listing));
    }

    #[test]
    fn test_empty_listing_still_renders() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = PromptTemplate::new(&create_test_config(temp.path())).unwrap();

        let prompt = template.render("", 0).unwrap();

        assert!(prompt.user.contains("(0)"));
    }

    #[test]
    fn test_custom_user_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let custom = temp.child("custom.tera");
        custom
            .write_str("Write {{ rules_path }} for:\n{{ listing }}")
            .unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .api_key("sk-test")
            .template_path(custom.path())
            .build()
            .unwrap();
        let template = PromptTemplate::new(&config).unwrap();
        let prompt = template.render("LISTING", 3).unwrap();

        assert_eq!(prompt.user, "Write .cursor/rules for:\nLISTING");
    }

    #[test]
    fn test_validate_rejects_empty_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let custom = temp.child("empty.tera");
        custom.write_str("   \n").unwrap();

        let err = validate_user_template(custom.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_validate_rejects_syntax_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let custom = temp.child("broken.tera");
        custom.write_str("{{ listing ").unwrap();

        let err = validate_user_template(custom.path()).unwrap_err();
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_validate_requires_listing() {
        let temp = assert_fs::TempDir::new().unwrap();
        let custom = temp.child("nolisting.tera");
        custom.write_str("Just write rules.").unwrap();

        let err = validate_user_template(custom.path()).unwrap_err();
        assert!(err.to_string().contains("listing"));
    }

    #[test]
    fn test_validate_rejects_directory() {
        let temp = assert_fs::TempDir::new().unwrap();

        assert!(validate_user_template(temp.path()).is_err());
    }
}
