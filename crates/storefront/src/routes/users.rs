//! Account routes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use estore_core::CartId;

use super::ApiResponse;
use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::middleware::CurrentPrincipal;
use crate::state::AppState;

/// Body of `PUT /users/cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachCartBody {
    pub cart_id: CartId,
}

#[derive(Debug, Serialize)]
pub struct UserCarts {
    pub carts: Vec<CartId>,
}

/// List all accounts (admin only).
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.users().list().await?;
    Ok(ApiResponse::with_data("Users", users))
}

/// The principal carried by the caller's token.
pub async fn current(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
    ApiResponse::with_data("Current user", principal)
}

/// Attach a cart to the caller's account.
#[instrument(skip_all, fields(username = %principal.username))]
pub async fn attach_cart(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: std::result::Result<Json<AttachCartBody>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = body?;

    let carts = state
        .users()
        .attach_cart(&principal.username, body.cart_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                AppError::NotFound(format!("cart {} not found", body.cart_id))
            }
            RepositoryError::Conflict(_) => {
                AppError::Conflict(format!("cart {} belongs to another user", body.cart_id))
            }
            other => AppError::Persistence(other),
        })?;

    tracing::info!(cart_id = %body.cart_id, "cart attached to user");
    Ok(ApiResponse::with_data("Cart attached", UserCarts { carts }))
}
