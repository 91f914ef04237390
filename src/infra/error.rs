//! Error handling types and result definitions for signing operations.

use thiserror::Error;

use crate::domain::outcome::ExitCode;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Error taxonomy for remote-backed signing.
///
/// Option problems are caught before any file or network I/O happens; every
/// other variant is an operational failure of one workflow step.
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Remote signing failed: {0}")]
    RemoteSigningError(String),

    #[error("Timestamp error: {0}")]
    TimestampError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("Package error: {0}")]
    PackageError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl SigningError {
    /// Process exit code this failure resolves to at the command boundary.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SigningError::ValidationError(_)
            | SigningError::UnsupportedAlgorithm(_)
            | SigningError::ConfigurationError(_) => ExitCode::InvalidOptions,
            _ => ExitCode::Failed,
        }
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

impl From<reqwest::Error> for SigningError {
    fn from(error: reqwest::Error) -> Self {
        SigningError::NetworkError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SigningError::CryptographicError(error.to_string())
    }
}

impl From<serde_json::Error> for SigningError {
    fn from(error: serde_json::Error) -> Self {
        SigningError::PackageError(format!("Malformed signature envelope: {error}"))
    }
}
