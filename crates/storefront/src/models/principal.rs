//! The authenticated identity carried by a bearer token.

use serde::{Deserialize, Serialize};

use estore_core::{Email, Role};

use super::User;

/// Identity decoded from a verified bearer token.
///
/// `role` is the role at issuance time and is informational only; permission
/// checks re-read the current role from the user store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub username: Email,
    pub role: Role,
    pub first_name: String,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            username: user.email.clone(),
            role: user.role,
            first_name: user.first_name.clone(),
        }
    }
}
