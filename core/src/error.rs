use thiserror::Error;

/// Typed failures for catalog, rule-set, and evaluation operations.
///
/// Configuration-time problems are rejected loudly instead of being
/// clamped; evaluation only fails on malformed caller input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },
}

impl Error {
    pub fn invalid_rule(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidRule {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Error::InvalidEvent {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
