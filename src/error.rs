use crate::gateway::Capability;
use serde::Serialize;

/// Failures of a single assistant step. None of these end the session.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("could not read PDF: {reason}")]
    Extraction { reason: String },

    /// The backing handle could not be built. Sticky for the process lifetime.
    #[error("{capability} is unavailable: {reason}")]
    ModelUnavailable {
        capability: Capability,
        reason: String,
    },

    #[error("{capability} call failed: {reason}")]
    Inference {
        capability: Capability,
        reason: String,
    },

    #[error("document has no extractable text")]
    EmptyDocument,

    #[error("no document loaded")]
    NoDocument,

    #[error("no summary available for this document")]
    NoSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Extraction,
    ModelUnavailable,
    Inference,
    EmptyDocument,
    NoDocument,
    NoSummary,
}

impl AssistantError {
    pub fn extraction(reason: impl std::fmt::Display) -> Self {
        Self::Extraction {
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            Self::Inference { .. } => ErrorKind::Inference,
            Self::EmptyDocument => ErrorKind::EmptyDocument,
            Self::NoDocument => ErrorKind::NoDocument,
            Self::NoSummary => ErrorKind::NoSummary,
        }
    }

    /// What the user can do about it.
    pub fn remedy(&self) -> &'static str {
        match self {
            Self::Extraction { .. } | Self::EmptyDocument => "upload a different PDF",
            Self::ModelUnavailable { .. } => "this feature is disabled until restart",
            Self::Inference { .. } => "try again",
            Self::NoDocument => "upload a PDF first",
            Self::NoSummary => "the summary must succeed before challenge questions",
        }
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;
