//! Admin account management.
//!
//! Creates an account with the `admin` role directly, bypassing signup.

use estore_core::{Email, Role, UserId};
use estore_storefront::db::{RepositoryError, UserRepository, UserStore};
use estore_storefront::models::NewUser;
use estore_storefront::services::auth::{AuthError, hash_password, validate_password};
use thiserror::Error;

use super::{MissingEnvVar, connect, database_url};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("{0}")]
    Password(#[from] AuthError),

    #[error("An account already exists with email: {0}")]
    UserExists(String),

    #[error("Store error: {0}")]
    Repository(RepositoryError),
}

/// Create a new admin account and return its id.
pub async fn create_user(
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<UserId, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let url = database_url()?;
    let pool = connect(&url).await?;
    let users = UserRepository::new(pool);

    tracing::info!("Creating admin account: {}", email);

    let user = users
        .create(NewUser {
            email: email.clone(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            age: None,
            password_hash,
            role: Role::Admin,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "Admin account created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id)
}
