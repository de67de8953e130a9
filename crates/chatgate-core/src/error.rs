//! Error types for `chatgate-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

/// Unified error type for all core operations.
///
/// Per-request variants are recoverable and are turned into responses by
/// the transport layer. [`CoreError::SecretUnavailable`] is the only
/// startup-time condition and should abort initialisation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The client used up its quota for the current window.
    #[error("Reached maximum allowed requests. Try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// The token MAC does not match the signing secret.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token was well-formed and correctly signed but is past its expiry.
    #[error("token has expired")]
    TokenExpired,

    /// The token could not be parsed or carries unexpected claims.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The signing primitive failed while issuing a token.
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// No usable signing secret was supplied.
    #[error("signing secret unavailable: {0}")]
    SecretUnavailable(String),

    /// A user with the same username or email is already registered.
    #[error("user already exists")]
    UserExists,

    /// No user matches the given username or email.
    #[error("user not found")]
    UserNotFound,

    /// The user store backend failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Returns `true` for errors that mean "the presented token is not acceptable".
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidSignature | CoreError::TokenExpired | CoreError::MalformedToken(_)
        )
    }
}

/// Convenience alias used throughout `chatgate-core`.
pub type CoreResult<T> = Result<T, CoreError>;
