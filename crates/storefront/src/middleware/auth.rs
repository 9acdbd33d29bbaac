//! Authorization gate middleware and the principal extractor.
//!
//! Protected routers are wrapped with one of the `require_*` functions via
//! `axum::middleware::from_fn_with_state`. The gate rejects the request before
//! any handler runs; on success the verified [`Principal`] is stored in the
//! request extensions for [`CurrentPrincipal`] to pick up.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use estore_core::Role;

use crate::error::{AppError, set_sentry_user};
use crate::models::Principal;
use crate::services::authz;
use crate::state::AppState;

/// Extractor for the principal admitted by the gate.
///
/// # Example
///
/// ```rust,ignore
/// async fn whoami(CurrentPrincipal(principal): CurrentPrincipal) -> String {
///     principal.username.to_string()
/// }
/// ```
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_owned()))
    }
}

/// Admit any holder of a valid token.
///
/// # Errors
///
/// Returns 401 if the token is missing or invalid.
pub async fn require_authenticated(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = authz::authenticate(state.tokens(), request.headers())?;
    set_sentry_user(principal.username.as_str());
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Admit users whose current role is `user` or `premium`.
///
/// # Errors
///
/// Returns 401 without a valid token or resolvable role, 403 for other roles.
pub async fn require_customer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate(&state, Role::CUSTOMERS, request, next).await
}

/// Admit users whose current role is `admin`.
///
/// # Errors
///
/// Returns 401 without a valid token or resolvable role, 403 for other roles.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate(&state, Role::ADMINS, request, next).await
}

async fn gate(
    state: &AppState,
    allowed: &[Role],
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = authz::authenticate(state.tokens(), request.headers())?;
    let role = authz::authorize(state.users(), &principal, allowed).await?;

    tracing::debug!(username = %principal.username, %role, path = %request.uri().path(), "request authorized");
    set_sentry_user(principal.username.as_str());
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
