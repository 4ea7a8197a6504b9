//! Error taxonomy for canonical-run operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single structural problem found in a canonical run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunViolation {
    /// Location inside the run, e.g. `testCases[2].stepResults[1].index`.
    pub path: String,
    pub message: String,
}

impl RunViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RunViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn join_violations(violations: &[RunViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Storyline core errors.
#[derive(Debug, thiserror::Error)]
pub enum StorylineError {
    #[error("invalid canonical run: {}", join_violations(.violations))]
    InvalidRun { violations: Vec<RunViolation> },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storyline core operations.
pub type Result<T> = std::result::Result<T, StorylineError>;
