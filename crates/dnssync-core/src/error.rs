//! Error types for the DNS sync system
//!
//! Target-scoped failures (authentication, fetch, mutation) are caught by the
//! [`SyncEngine`](crate::engine::SyncEngine) and recorded per target. Parse
//! failures are run-scoped: no target is touched when the desired state
//! cannot be read.

use std::fmt;
use thiserror::Error;

/// Result type alias for DNS sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// The stage of a target pass at which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    /// Establishing a session with the target
    Authenticate,
    /// Reading the target's current records
    Fetch,
    /// Adding, deleting or replacing records
    Mutate,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::Authenticate => write!(f, "auth"),
            SyncStage::Fetch => write!(f, "fetch"),
            SyncStage::Mutate => write!(f, "mutate"),
        }
    }
}

/// Core error type for the DNS sync system
#[derive(Error, Debug)]
pub enum Error {
    /// Bad credentials, rejected session or transport failure during login
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Reading the current record set failed
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Adding, deleting or replacing a record failed
    #[error("{}", format_mutation(.key, .status, .message))]
    Mutation {
        /// Wire form of the offending record (or the record type for bulk replaces)
        key: String,
        /// HTTP-style status, when the target speaks HTTP
        status: Option<u16>,
        /// Detail from the target
        message: String,
    },

    /// Desired-state document is missing or malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Repository acquisition errors
    #[error("Repository error: {0}")]
    Repository(String),

    /// A record could not be constructed from its raw fields
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_mutation(key: &str, status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("Mutation failed for '{}' (status {}): {}", key, status, message),
        None => format!("Mutation failed for '{}': {}", key, message),
    }
}

impl Error {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a mutation error
    pub fn mutation(key: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Mutation {
            key: key.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a repository error
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// The target stage this error belongs to, if it is target-scoped
    pub fn stage(&self) -> Option<SyncStage> {
        match self {
            Error::Authentication(_) => Some(SyncStage::Authenticate),
            Error::Fetch(_) => Some(SyncStage::Fetch),
            Error::Mutation { .. } => Some(SyncStage::Mutate),
            _ => None,
        }
    }

    /// Whether this error aborts the whole run rather than a single target
    pub fn is_run_scoped(&self) -> bool {
        matches!(self, Error::Parse(_) | Error::Config(_) | Error::Repository(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(Error::auth("bad password").stage(), Some(SyncStage::Authenticate));
        assert_eq!(Error::fetch("timeout").stage(), Some(SyncStage::Fetch));
        assert_eq!(
            Error::mutation("10.0.0.1 a.local", Some(409), "conflict").stage(),
            Some(SyncStage::Mutate)
        );
        assert_eq!(Error::parse("bad toml").stage(), None);
    }

    #[test]
    fn test_mutation_display_includes_key_and_status() {
        let err = Error::mutation("10.0.0.1 a.local", Some(404), "Not Found");
        let text = err.to_string();
        assert!(text.contains("10.0.0.1 a.local"));
        assert!(text.contains("404"));

        let err = Error::mutation("alias.local,a.local", None, "write failed");
        assert!(!err.to_string().contains("status"));
    }

    #[test]
    fn test_run_scoped() {
        assert!(Error::parse("x").is_run_scoped());
        assert!(Error::repository("x").is_run_scoped());
        assert!(!Error::fetch("x").is_run_scoped());
    }
}
