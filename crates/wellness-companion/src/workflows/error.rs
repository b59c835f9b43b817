//! Failures surfaced by the request workflows

use std::fmt;

use thiserror::Error;

/// Which dependency step failed, rendered as the message prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Inference,
    ChatProcessing,
    HistoryRead,
    HistoryClear,
    ProfileRead,
    ProfileUpdate,
    ProfileDelete,
}

impl Phase {
    pub fn description(&self) -> &'static str {
        match self {
            Phase::Inference => "AI generation failed",
            Phase::ChatProcessing => "Chat processing failed",
            Phase::HistoryRead => "Failed to retrieve history",
            Phase::HistoryClear => "Failed to clear history",
            Phase::ProfileRead => "Failed to retrieve profile",
            Phase::ProfileUpdate => "Failed to update profile",
            Phase::ProfileDelete => "Failed to delete profile",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Rejected before any store call
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// A store or inference call on the primary path failed
    #[error("{phase}: {message}")]
    Dependency { phase: Phase, message: String },
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }

    pub fn dependency(phase: Phase, cause: &anyhow::Error) -> Self {
        WorkflowError::Dependency {
            phase,
            message: format!("{:#}", cause),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
