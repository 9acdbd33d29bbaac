//! Authorization gate.
//!
//! A request moves from unauthenticated to authenticated once its bearer token
//! verifies, then to authorized once the principal's *current* role (read from
//! the user store, never from the token) is in the allowed set. Role changes
//! therefore take effect on the next call regardless of token age.

use axum::http::{HeaderMap, header::AUTHORIZATION};

use estore_core::{Email, Role};

use super::auth::AuthError;
use super::tokens::TokenService;
use crate::db::UserStore;
use crate::models::Principal;

/// Extract the bearer token from the `Authorization` header.
///
/// # Errors
///
/// Returns `AuthError::MissingToken` if there is no `Bearer` credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.split_once(' ')
                .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        })
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Verify the request's bearer token and return its principal.
///
/// # Errors
///
/// Returns `AuthError::MissingToken` or `AuthError::InvalidToken`.
pub fn authenticate(tokens: &TokenService, headers: &HeaderMap) -> Result<Principal, AuthError> {
    let token = bearer_token(headers)?;
    tokens.verify(token)
}

/// Check the principal's current role against `allowed`.
///
/// Returns the resolved role on success.
///
/// # Errors
///
/// Returns `AuthError::NoRole` if the principal no longer resolves to a user,
/// `AuthError::Forbidden` if the role is not allowed.
pub async fn authorize(
    users: &dyn UserStore,
    principal: &Principal,
    allowed: &[Role],
) -> Result<Role, AuthError> {
    let role = users
        .role_of(&principal.username)
        .await?
        .ok_or(AuthError::NoRole)?;

    if !allowed.contains(&role) {
        return Err(AuthError::Forbidden(format!("role {role} may not do this")));
    }

    Ok(role)
}

/// Sellers may not put their own listings in a cart.
///
/// # Errors
///
/// Returns `AuthError::Forbidden` if `principal` owns the resource.
pub fn authorize_ownership(principal: &Principal, owner: &Email) -> Result<(), AuthError> {
    if principal.username == *owner {
        return Err(AuthError::Forbidden(
            "you cannot add your own product to a cart".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::NewUser;
    use axum::http::HeaderValue;

    fn principal(email: &str, role: Role) -> Principal {
        Principal {
            username: Email::parse(email).unwrap(),
            role,
            first_name: "Pat".to_owned(),
        }
    }

    async fn seed(store: &MemoryStore, email: &str, role: Role) {
        UserStore::create(
            store,
            NewUser {
                email: Email::parse(email).unwrap(),
                first_name: "Pat".to_owned(),
                last_name: "Doe".to_owned(),
                age: None,
                password_hash: String::new(),
                role,
            },
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingToken)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingToken)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingToken)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_role_is_read_from_store_not_token() {
        let store = MemoryStore::new();
        seed(&store, "user@shop.com", Role::User).await;

        // Token claims admin, store says user.
        let p = principal("user@shop.com", Role::Admin);
        assert!(matches!(
            authorize(&store, &p, Role::ADMINS).await,
            Err(AuthError::Forbidden(_))
        ));
        assert_eq!(
            authorize(&store, &p, Role::CUSTOMERS).await.unwrap(),
            Role::User
        );

        // Promotion takes effect immediately.
        store.set_role(&p.username, Role::Admin).await.unwrap();
        assert_eq!(
            authorize(&store, &p, Role::ADMINS).await.unwrap(),
            Role::Admin
        );
    }

    #[tokio::test]
    async fn test_unknown_principal_has_no_role() {
        let store = MemoryStore::new();
        let p = principal("ghost@shop.com", Role::User);
        assert!(matches!(
            authorize(&store, &p, Role::CUSTOMERS).await,
            Err(AuthError::NoRole)
        ));
    }

    #[test]
    fn test_ownership() {
        let p = principal("seller@shop.com", Role::Premium);
        assert!(authorize_ownership(&p, &Email::parse("SELLER@shop.com").unwrap()).is_err());
        assert!(authorize_ownership(&p, &Email::parse("other@shop.com").unwrap()).is_ok());
    }
}
