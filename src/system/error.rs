//! Typed storage errors.
//!
//! Every error the crate reports carries one of a small set of error codes
//! alongside its human-readable message. Errors travel as `eyre::Report`;
//! callers that need to branch on the kind recover the concrete
//! [`StoreError`] with `report.downcast_ref::<StoreError>()`.

use thiserror::Error;

/// Error classification, with its wire-protocol SQLSTATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A textual datum failed its type's grammar.
    InvalidTextRepresentation,
    /// Invariant violation or on-disk corruption.
    InternalError,
    /// A segment read, write, or extend failed, or a short read occurred.
    IoError,
    /// The clock sweep found no unpinned frame to evict.
    ResourceExhaustion,
    /// A catalog lookup yielded no rows.
    NotFound,
}

impl ErrorCode {
    pub fn sqlstate(self) -> &'static str {
        match self {
            ErrorCode::InvalidTextRepresentation => "22P02",
            ErrorCode::InternalError => "XX000",
            ErrorCode::IoError => "58030",
            ErrorCode::ResourceExhaustion => "53000",
            ErrorCode::NotFound => "42P01",
        }
    }
}

/// A storage error: a code plus a message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StoreError {
    code: ErrorCode,
    message: String,
}

impl StoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_text(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTextRepresentation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IoError, message)
    }

    pub fn resource_exhaustion(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceExhaustion, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_carries_code_and_message() {
        let err = StoreError::invalid_text("invalid syntax for tid");
        assert_eq!(err.code(), ErrorCode::InvalidTextRepresentation);
        assert_eq!(err.to_string(), "invalid syntax for tid");
        assert_eq!(err.code().sqlstate(), "22P02");
    }

    #[test]
    fn store_error_downcasts_from_report() {
        let report = eyre::Report::new(StoreError::resource_exhaustion(
            "no unpinned buffers available",
        ));
        let err = report.downcast_ref::<StoreError>().unwrap();
        assert_eq!(err.code(), ErrorCode::ResourceExhaustion);
    }
}
