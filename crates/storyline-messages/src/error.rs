//! Error taxonomy for the message codec.
//!
//! Encoding never fails on data-quality grounds; these errors come from the
//! decoder (structurally unusable input) and from serialization plumbing.

/// Storyline messages errors.
#[derive(Debug, thiserror::Error)]
pub enum MessagesError {
    #[error("line {line}: invalid JSON: {source}")]
    InvalidJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: envelope must be an object with exactly one key")]
    NotSingleKey { line: usize },

    #[error("line {line}: malformed {kind} envelope: {source}")]
    MalformedEnvelope {
        line: usize,
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} {id} is referenced but never defined")]
    DanglingReference { kind: &'static str, id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storyline messages operations.
pub type Result<T> = std::result::Result<T, MessagesError>;
