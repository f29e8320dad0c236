//! Error taxonomy for the redaction pipeline.
//!
//! Detector and plugin failures are deliberately *not* represented here: per
//! the propagation policy they are isolated at their boundary and surfaced
//! as report entries (see `pipeline::RedactionReport`), never as a
//! `RedactionError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedactionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    InvariantViolation(&'static str),
}

impl RedactionError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RedactionError::Configuration(_) => ExitCode::MalformedPolicy,
            RedactionError::Cancelled => ExitCode::Cancelled,
            RedactionError::InvariantViolation(_) => ExitCode::PipelineFailure,
        }
    }
}

/// Mirrors the CLI exit codes an embedding caller would use (spec.md §6).
/// The crate itself never calls `std::process::exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    MalformedPolicy = 1,
    IoError = 2,
    PipelineFailure = 3,
    Cancelled = 4,
}

pub type Result<T> = std::result::Result<T, RedactionError>;
