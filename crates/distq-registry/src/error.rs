//! Registry and query lifecycle error types.

use distq_core::token::TokenError;
use thiserror::Error;

/// Errors that can occur while enrolling hosts or tracking queries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid enroll secret")]
    InvalidSecret,

    #[error("no host enrolled as {0}")]
    HostNotFound(String),

    #[error("host {uuid} must re-enroll: {reason}")]
    ReEnrollRequired { uuid: String, reason: String },

    #[error("malformed stored data: {0}")]
    Corrupt(String),

    #[error("state store error: {0}")]
    State(#[from] distq_state::StateError),

    #[error("identifier generation failed: {0}")]
    Token(#[from] TokenError),
}

impl RegistryError {
    /// True for errors meaning "no such host", as opposed to store failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HostNotFound(_) | Self::ReEnrollRequired { .. })
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
