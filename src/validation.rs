// Validation Layer
// Runtime validation of preconditions and postconditions used by the
// validated types in `types` and by the pipeline components.

use crate::error::{ArchieError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Validation context for building consistent, attributed error messages.
#[derive(Clone)]
pub struct ValidationContext {
    operation: String,
    attributes: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn validate(self, condition: bool, message: &str) -> Result<()> {
        if !condition {
            return Err(ArchieError::invalid_input(format!(
                "{}: {} ({:?})",
                self.operation, message, self.attributes
            )));
        }
        Ok(())
    }
}

/// Maximum path length across platforms.
const MAX_PATH_LENGTH: usize = 4096;

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Validate a repository-relative file path.
pub fn validate_file_path(path: &str) -> Result<()> {
    let ctx = ValidationContext::new("validate_file_path").with_attribute("path", path);

    ctx.clone().validate(!path.is_empty(), "path cannot be empty")?;
    ctx.clone().validate(
        path.len() < MAX_PATH_LENGTH,
        &format!("path exceeds maximum length of {MAX_PATH_LENGTH}"),
    )?;
    ctx.clone()
        .validate(!path.contains('\0'), "path contains null bytes")?;

    let path_obj = Path::new(path);

    for component in path_obj.components() {
        if let std::path::Component::ParentDir = component {
            return Err(ArchieError::invalid_input(
                "parent directory references (..) are not allowed in a path",
            ));
        }
    }

    if let Some(stem) = path_obj.file_stem().and_then(std::ffi::OsStr::to_str) {
        let upper = stem.to_uppercase();
        if RESERVED_NAMES.contains(&upper.as_str()) {
            return Err(ArchieError::invalid_input(format!(
                "reserved filename: {stem}"
            )));
        }
    }

    ctx.validate(path_obj.to_str().is_some(), "path is not valid UTF-8")?;

    Ok(())
}

/// Validate a directory path (a superset of file path validation).
pub fn validate_directory_path(path: &str) -> Result<()> {
    validate_file_path(path)?;
    if Path::new(path).extension().is_some() {
        return Err(ArchieError::invalid_input(
            "directory path should not have a file extension",
        ));
    }
    Ok(())
}

/// Parse a repository URL into `(owner, name)`.
///
/// Accepts `https://github.com/{owner}/{repo}` with an optional trailing
/// `.git` suffix and/or trailing slash; rejects any other scheme or host
/// shape as `InvalidInput`. This is the one place §4.1's
/// `addRepository`/`parseRepositoryUrl` behavior lives.
pub fn parse_repository_url(url: &str) -> Result<(String, String)> {
    let validated = crate::types::ValidatedUrl::new(url)?;
    let trimmed = validated
        .as_str()
        .strip_prefix("https://")
        .or_else(|| validated.as_str().strip_prefix("http://"))
        .ok_or_else(|| ArchieError::invalid_input("unsupported url scheme"))?;

    let mut parts = trimmed.splitn(2, '/');
    let host = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().trim_end_matches('/');

    if host != "github.com" && host != "www.github.com" {
        return Err(ArchieError::invalid_input(format!(
            "unsupported repository host: {host}"
        )));
    }

    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let mut segments = rest.splitn(2, '/');
    let owner = segments.next().unwrap_or_default();
    let name = segments.next().unwrap_or_default();

    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return Err(ArchieError::invalid_input(
            "repository url must have the shape https://github.com/{owner}/{repo}",
        ));
    }

    Ok((owner.to_string(), name.to_string()))
}

/// The canonical form of a GitHub repository URL.
pub fn format_github_url(owner: &str, name: &str) -> String {
    format!("https://github.com/{owner}/{name}")
}

/// Validate a conversational or search query string.
pub fn validate_query_text(query: &str) -> Result<()> {
    let ctx = ValidationContext::new("validate_query_text").with_attribute("length", query.len().to_string());

    ctx.clone()
        .validate(!query.trim().is_empty(), "query cannot be empty")?;
    ctx.validate(query.len() < 4096, "query too long (max 4096 chars)")?;

    Ok(())
}

/// Validate a tag string (alphanumeric, `-`, `_`, spaces, up to 128 chars).
pub fn validate_tag(tag: &str) -> Result<()> {
    let ctx = ValidationContext::new("validate_tag").with_attribute("tag", tag);

    ctx.clone().validate(!tag.trim().is_empty(), "tag cannot be empty")?;
    ctx.clone().validate(tag.len() < 128, "tag too long (max 128 chars)")?;

    let valid_chars = tag
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ');
    ctx.validate(valid_chars, "tag contains invalid characters")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_validation_rejects_traversal_and_nulls() {
        assert!(validate_file_path("src/lib.rs").is_ok());
        assert!(validate_file_path("").is_err());
        assert!(validate_file_path("../../etc/passwd").is_err());
        assert!(validate_file_path("file\0name").is_err());
        assert!(validate_file_path("CON.txt").is_err());
    }

    #[test]
    fn repository_url_parsing_matches_scenario_a() {
        assert_eq!(
            parse_repository_url("https://github.com/acme/widgets").unwrap(),
            ("acme".to_string(), "widgets".to_string())
        );
        assert_eq!(
            parse_repository_url("https://github.com/acme/widgets.git").unwrap(),
            ("acme".to_string(), "widgets".to_string())
        );
        assert!(parse_repository_url("ftp://github.com/acme/widgets").is_err());
        assert!(parse_repository_url("https://gitlab.com/acme/widgets").is_err());
    }

    #[test]
    fn format_github_url_round_trips_parse() {
        let url = format_github_url("acme", "widgets");
        assert_eq!(
            parse_repository_url(&url).unwrap(),
            ("acme".to_string(), "widgets".to_string())
        );
    }

    #[test]
    fn tag_validation() {
        assert!(validate_tag("rust-lang").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("tag@with#special$chars").is_err());
    }
}
