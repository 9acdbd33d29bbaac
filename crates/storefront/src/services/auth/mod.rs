//! Authentication service.
//!
//! Password signup and login. Successful logins return a bearer token minted
//! by [`TokenService`](crate::services::tokens::TokenService).

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::instrument;

use estore_core::{Email, Role};

use crate::config::AdminBootstrapConfig;
use crate::db::{RepositoryError, UserStore};
use crate::models::{NewUser, Principal, User};
use crate::services::tokens::TokenService;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Verified against when the username is unknown, so a miss costs one Argon2
/// run like a wrong password does.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-user-password").ok());

/// Registration form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: Option<i32>,
    pub password: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
    tokens: &'a TokenService,
    admin: Option<&'a AdminBootstrapConfig>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        users: &'a dyn UserStore,
        tokens: &'a TokenService,
        admin: Option<&'a AdminBootstrapConfig>,
    ) -> Self {
        Self {
            users,
            tokens,
            admin,
        }
    }

    /// Register a new user.
    ///
    /// The account gets [`Role::Admin`] only when both email and password match
    /// the configured bootstrap credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AuthError> {
        let email = Email::parse(&request.email)?;
        validate_password(&request.password)?;

        let role = if self.is_admin_bootstrap(&email, &request.password) {
            Role::Admin
        } else {
            Role::User
        };

        let password_hash = hash_password(&request.password)?;

        let user = self
            .users
            .create(NewUser {
                email,
                first_name: request.first_name.trim().to_owned(),
                last_name: request.last_name.trim().to_owned(),
                age: request.age,
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Check credentials and issue a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String), AuthError> {
        let email = Email::parse(username).map_err(|_| AuthError::InvalidCredentials)?;

        let Some((user, password_hash)) = self.users.get_with_password_hash(&email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &password_hash)?;

        let token = self.tokens.issue(&Principal::from(&user))?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok((user, token))
    }

    fn is_admin_bootstrap(&self, email: &Email, password: &str) -> bool {
        self.admin.is_some_and(|admin| {
            Email::parse(&admin.email).is_ok_and(|admin_email| admin_email == *email)
                && constant_time_eq::constant_time_eq(
                    admin.password.expose_secret().as_bytes(),
                    password.as_bytes(),
                )
        })
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id. The salt is embedded in the output.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch or an unparseable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
