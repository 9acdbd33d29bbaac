//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use estore_core::{Email, Role, UserId};

/// A storefront account.
///
/// The password hash is never part of this type; it is only read by the
/// credential check in [`crate::services::auth`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Login name.
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    pub password_hash: String,
    pub role: Role,
}
