// Validated Types
// Strongly-typed wrappers that enforce invariants at construction time so
// that invalid values cannot flow through the rest of the crate.

use crate::error::{ArchieError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID, e.g. one read back from storage.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            pub fn parse(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ArchieError::invalid_input(format!("invalid {}: {e}", stringify!($name))))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(RepositoryId, "Opaque identifier for a Repository aggregate.");
opaque_id!(DocumentId, "Opaque identifier for a search Document.");
opaque_id!(UserId, "Opaque identifier for the user who owns a Conversation.");
opaque_id!(ConversationId, "Opaque identifier for a Conversation aggregate.");
opaque_id!(MessageId, "Opaque identifier for a ConversationMessage.");
opaque_id!(GraphId, "Opaque identifier for a built KnowledgeGraph snapshot.");
opaque_id!(RelationshipId, "Opaque identifier for a CodeRelationship.");
opaque_id!(PatternId, "Opaque identifier for an ArchitecturalPattern or AntiPattern.");

/// A stable, non-opaque identifier for a `CodeEntity`.
///
/// Derived deterministically from `(repositoryId, fully-qualified name,
/// kind)` so that re-running knowledge graph construction against
/// unchanged source produces the same id on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn derive(repository_id: RepositoryId, fully_qualified_name: &str, kind: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(repository_id.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(fully_qualified_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(kind.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A path that has been validated and is guaranteed to be safe to store or
/// request content for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedPath {
    inner: PathBuf,
}

impl ValidatedPath {
    /// # Invariants
    /// - Non-empty, valid UTF-8
    /// - No directory traversal (`..`) and no null bytes
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| ArchieError::invalid_input("path is not valid UTF-8"))?;

        crate::validation::validate_file_path(path_str)?;

        Ok(Self {
            inner: path.to_path_buf(),
        })
    }

    pub fn as_path(&self) -> &Path {
        &self.inner
    }

    pub fn as_str(&self) -> &str {
        self.inner.to_str().expect("ValidatedPath is always UTF-8")
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A non-empty, length-bounded piece of text (titles, names, messages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonEmptyText {
    inner: String,
}

impl NonEmptyText {
    pub const MAX_LENGTH: usize = 8192;

    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ArchieError::invalid_input("text cannot be empty"));
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ArchieError::invalid_input(format!(
                "text exceeds maximum length of {}",
                Self::MAX_LENGTH
            )));
        }
        Ok(Self {
            inner: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// A non-zero byte size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonZeroSize {
    inner: u64,
}

impl NonZeroSize {
    pub fn new(size: u64) -> Result<Self> {
        if size == 0 {
            return Err(ArchieError::invalid_input("size must be greater than zero"));
        }
        Ok(Self { inner: size })
    }

    pub fn get(&self) -> u64 {
        self.inner
    }
}

/// A Unix timestamp, validated to be positive and not absurdly far in the
/// future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatedTimestamp {
    inner: i64,
}

impl ValidatedTimestamp {
    pub fn new(timestamp: i64) -> Result<Self> {
        if timestamp <= 0 {
            return Err(ArchieError::invalid_input("timestamp must be positive"));
        }
        const YEAR_3000: i64 = 32_503_680_000;
        if timestamp >= YEAR_3000 {
            return Err(ArchieError::invalid_input("timestamp too far in future"));
        }
        Ok(Self { inner: timestamp })
    }

    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_secs() as i64;
        Self { inner: timestamp }
    }

    pub fn as_secs(&self) -> i64 {
        self.inner
    }
}

/// Ordered pair of timestamps (created, updated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampPair {
    created: ValidatedTimestamp,
    updated: ValidatedTimestamp,
}

impl TimestampPair {
    /// # Invariants
    /// - `updated >= created`
    pub fn new(created: ValidatedTimestamp, updated: ValidatedTimestamp) -> Result<Self> {
        if updated.as_secs() < created.as_secs() {
            return Err(ArchieError::invalid_input(
                "updated timestamp must be >= created timestamp",
            ));
        }
        Ok(Self { created, updated })
    }

    pub fn now() -> Self {
        let now = ValidatedTimestamp::now();
        Self {
            created: now,
            updated: now,
        }
    }

    pub fn created(&self) -> ValidatedTimestamp {
        self.created
    }

    pub fn updated(&self) -> ValidatedTimestamp {
        self.updated
    }

    pub fn touch(&mut self) {
        self.updated = ValidatedTimestamp::now();
    }
}

/// A repository URL, validated for scheme only — `validation::parse_repository_url`
/// does the stricter host/owner/name parsing on top of this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    inner: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ArchieError::invalid_input("url cannot be empty"));
        }
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(ArchieError::invalid_input(
                "url must use the http or https scheme",
            ));
        }
        Ok(Self { inner: url })
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// A tag on a repository or conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedTag {
    inner: String,
}

impl ValidatedTag {
    const MAX_LENGTH: usize = 128;

    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(ArchieError::invalid_input("tag cannot be empty"));
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ArchieError::invalid_input(format!(
                "tag exceeds maximum length of {}",
                Self::MAX_LENGTH
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ')
        {
            return Err(ArchieError::invalid_input(
                "tag may only contain alphanumerics, '-', '_' and spaces",
            ));
        }
        Ok(Self {
            inner: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for ValidatedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// A limit value bounded above by a caller-supplied maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedLimit {
    inner: usize,
    max: usize,
}

impl ValidatedLimit {
    pub fn new(limit: usize, max: usize) -> Result<Self> {
        if limit == 0 {
            return Err(ArchieError::invalid_input("limit must be greater than zero"));
        }
        if limit > max {
            return Err(ArchieError::invalid_input(format!(
                "limit exceeds maximum of {max}"
            )));
        }
        Ok(Self { inner: limit, max })
    }

    pub fn get(&self) -> usize {
        self.inner
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_is_deterministic() {
        let repo = RepositoryId::new();
        let a = EntityId::derive(repo, "acme::widgets::Widget", "Class");
        let b = EntityId::derive(repo, "acme::widgets::Widget", "Class");
        assert_eq!(a, b);

        let c = EntityId::derive(repo, "acme::widgets::Widget", "Method");
        assert_ne!(a, c);
    }

    #[test]
    fn validated_url_rejects_non_http_schemes() {
        assert!(ValidatedUrl::new("https://github.com/acme/widgets").is_ok());
        assert!(ValidatedUrl::new("ftp://example/acme/widgets").is_err());
        assert!(ValidatedUrl::new("").is_err());
    }

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        let t = NonEmptyText::new("  hello  ").unwrap();
        assert_eq!(t.as_str(), "hello");
        assert!(NonEmptyText::new("   ").is_err());
    }

    #[test]
    fn validated_limit_enforces_bounds() {
        assert!(ValidatedLimit::new(10, 100).is_ok());
        assert!(ValidatedLimit::new(0, 100).is_err());
        assert!(ValidatedLimit::new(200, 100).is_err());
    }

    #[test]
    fn validated_path_rejects_traversal() {
        assert!(ValidatedPath::new("src/lib.rs").is_ok());
        assert!(ValidatedPath::new("../../etc/passwd").is_err());
    }

    #[test]
    fn timestamp_pair_rejects_updated_before_created() {
        let created = ValidatedTimestamp::new(1000).unwrap();
        let updated = ValidatedTimestamp::new(2000).unwrap();
        assert!(TimestampPair::new(created, updated).is_ok());
        assert!(TimestampPair::new(updated, created).is_err());
    }
}
