//! Global application error types.
//!
//! This module defines the custom error types used across the console
//! and the mapping from internal failures to the messages shown to the
//! operator.

use thiserror::Error;

/// Represents errors that can occur inside the auth layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Error while reading or writing the local credential store.
    #[error("Store error: {0}")]
    Store(String),
    /// Error while talking to the identity authority.
    #[error("Authority error: {0}")]
    Authority(String),
    /// No local identity handle is established.
    #[error("No identity is currently signed in")]
    NoIdentity,
    /// The authority returned a credential that could not be decoded.
    #[error("Credential decode error: {0}")]
    CredentialDecode(String),
    /// The authority call did not complete within the configured timeout.
    #[error("Authority call timed out")]
    Timeout,
}

/// Generic API error used across the gateway and the domain services.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The session failed validation. The gateway has already purged the
    /// store and navigated to login; callers treat this as a silent
    /// termination, never as a user-visible error.
    #[error("Invalid token")]
    InvalidToken,

    /// The API reported a duplicate entity through its nested 409 status.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Any non-OK status outside the distinguished conflict case.
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The response envelope or a wire record failed to parse.
    #[error("Wire format error: {0}")]
    Wire(#[from] crate::wire::WireError),

    /// Transport-level failure.
    #[error("Network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    /// Local file access failed (upload input, export output).
    #[error("File error: {0}")]
    File(String),

    /// Spreadsheet assembly failed.
    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl From<rust_xlsxwriter::XlsxError> for ApiError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Self::Export(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Fixed message for duplicate-contact conflicts.
pub const CONFLICT_MESSAGE: &str =
    "Ya existe un contacto con estos datos. Por favor, utilice datos diferentes.";

/// Fixed message for every other failed operation.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Error en la operación. Por favor, inténtelo de nuevo.";

impl ApiError {
    // Helper constructors for common patterns

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn unexpected_status(status: u16, message: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            status,
            message: message.into(),
        }
    }

    pub fn file(message: impl Into<String>) -> Self {
        Self::File(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// True when the error is the distinguished invalid-session outcome.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::InvalidToken)
    }

    /// Maps the error to the message shown to the operator.
    ///
    /// Conflicts get the fixed duplicate-contact message and input
    /// validation failures carry their own wording; everything else
    /// collapses to the generic retry message. `InvalidToken` is never
    /// surfaced, so it has no mapping of its own.
    pub fn user_message(&self) -> String {
        match self {
            Self::Conflict { .. } => CONFLICT_MESSAGE.to_string(),
            Self::InvalidInput { message } => message.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_fixed_message() {
        let err = ApiError::conflict("dup");
        assert_eq!(
            err.user_message(),
            "Ya existe un contacto con estos datos. Por favor, utilice datos diferentes."
        );
    }

    #[test]
    fn test_other_errors_map_to_generic_message() {
        let err = ApiError::unexpected_status(500, "internal");
        assert_eq!(
            err.user_message(),
            "Error en la operación. Por favor, inténtelo de nuevo."
        );

        let err = ApiError::file("missing");
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_invalid_input_keeps_its_own_message() {
        let err = ApiError::invalid_input("El nombre del cliente es obligatorio");
        assert_eq!(err.user_message(), "El nombre del cliente es obligatorio");
    }

    #[test]
    fn test_invalid_token_is_distinguished() {
        assert!(ApiError::InvalidToken.is_invalid_token());
        assert!(!ApiError::conflict("dup").is_invalid_token());
    }
}
