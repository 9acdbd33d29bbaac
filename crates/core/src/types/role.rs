//! User roles used by the authorization gate.

use serde::{Deserialize, Serialize};

/// Permission level of a storefront account.
///
/// Stored as a Postgres enum (`user_role`) and serialized in snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular buyer.
    #[default]
    User,
    /// Buyer who may also list products for sale.
    Premium,
    /// Store administrator.
    Admin,
}

impl Role {
    /// Roles that may use the cart and checkout endpoints.
    pub const CUSTOMERS: &'static [Self] = &[Self::User, Self::Premium];

    /// Roles that may use administrative endpoints.
    pub const ADMINS: &'static [Self] = &[Self::Admin];

    /// The canonical lowercase name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Premium => "premium",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "premium" => Ok(Self::Premium),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_agree() {
        for role in [Role::User, Role::Premium, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_groups() {
        assert!(Role::CUSTOMERS.contains(&Role::Premium));
        assert!(!Role::CUSTOMERS.contains(&Role::Admin));
        assert_eq!(Role::ADMINS, &[Role::Admin]);
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Premium).unwrap(), "\"premium\"");
    }
}
