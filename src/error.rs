// Error Kinds - §7 of the design
// A single typed error carried across every public operation in the crate,
// rather than threading exceptions-as-control-flow across boundaries.

use std::fmt;

/// Classification of a failure, independent of the message text.
///
/// Mirrors §7's error kind table exactly; callers match on `kind()` rather
/// than parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    AlreadyExists,
    InvalidInput,
    InvalidState,
    UpstreamUnavailable,
    UpstreamRateLimited,
    UpstreamAuth,
    Timeout,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamRateLimited => "upstream_rate_limited",
            ErrorKind::UpstreamAuth => "upstream_auth",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// The crate-wide error type. Carries a short, user-safe message — no stack
/// traces, no internal paths — per §7's "no stack traces are exposed".
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ArchieError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ArchieError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, message)
    }

    pub fn upstream_rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamRateLimited, message)
    }

    pub fn upstream_auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamAuth, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// §7: upstream transient errors are recovered locally with bounded
    /// retry. This is the single source of truth for "is this worth
    /// retrying" used by the ingestion pipeline's retry loop.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UpstreamUnavailable | ErrorKind::UpstreamRateLimited | ErrorKind::Timeout
        )
    }
}

pub type Result<T> = std::result::Result<T, ArchieError>;
