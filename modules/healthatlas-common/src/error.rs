use thiserror::Error;

use crate::types::FailureReason;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("Record resolution error: {0}")]
    Resolve(String),
}

/// Error returned by an individual evidence source adapter.
///
/// These never escape the collector boundary — each one is folded into an
/// `EvidenceResult::Failure` so a broken source degrades to empty evidence
/// instead of failing the record.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("no matching record found")]
    NotFound,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl SourceError {
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            SourceError::NotFound => FailureReason::NotFound,
            SourceError::InvalidResponse(_) => FailureReason::InvalidResponse,
            SourceError::Transport(_) => FailureReason::TransportError,
        }
    }
}
