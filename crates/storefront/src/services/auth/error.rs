//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] estore_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No bearer token on the request.
    #[error("missing bearer token")]
    MissingToken,

    /// Bearer token is malformed, has a bad signature or has expired.
    #[error("invalid token")]
    InvalidToken,

    /// The principal no longer resolves to a role.
    #[error("no role resolvable for principal")]
    NoRole,

    /// Role or ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
