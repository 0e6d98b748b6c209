use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("secure value '{id}' not found")]
    NotFound { id: String },
    #[error("secure value '{id}' expired after {age_secs}s")]
    Expired { id: String, age_secs: u64 },
    #[error("secure value '{id}' checksum mismatch: expected={expected:#06x} observed={observed:#06x}")]
    ChecksumMismatch {
        id: String,
        expected: u16,
        observed: u16,
    },
    #[error("integrity violation in {}", .routines.join(", "))]
    IntegrityViolation { routines: Vec<String> },
    #[error("telemetry transport failure: {detail}")]
    TransportFailure { detail: String },
    #[error("input aborted: {reason}")]
    InputAborted { reason: String },
    #[error("guarded session terminated: {reason}")]
    Terminated { reason: String },
}

impl GuardError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Expired { .. } => "expired",
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::TransportFailure { .. } => "transport_failure",
            Self::InputAborted { .. } => "input_aborted",
            Self::Terminated { .. } => "terminated",
        }
    }

    /// Fatal errors mean the session has already run its cleanup and halted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IntegrityViolation { .. } | Self::Terminated { .. }
        )
    }
}

pub type GuardResult<T> = std::result::Result<T, GuardError>;
