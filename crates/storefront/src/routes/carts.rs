//! Cart route handlers.
//!
//! Every route here sits behind the customer gate, so handlers can assume a
//! [`CurrentPrincipal`] whose role is `user` or `premium`.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use estore_core::{CartId, ProductId};

use super::ApiResponse;
use crate::error::Result;
use crate::middleware::CurrentPrincipal;
use crate::services::{LineOp, PurchaseRequest};
use crate::state::AppState;

/// Body of `POST /carts/{cid}/product/{pid}`.
#[derive(Debug, Deserialize)]
pub struct AdjustLineBody {
    pub op: LineOp,
}

/// List every cart.
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let carts = state.cart_service().list().await?;
    Ok(ApiResponse::with_data("Carts", carts))
}

/// Create an empty cart.
#[instrument(skip(state))]
pub async fn create(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let cart = state.cart_service().create_empty().await?;
    Ok((StatusCode::CREATED, ApiResponse::with_data("Cart created", cart)))
}

/// Fetch one cart.
#[instrument(skip(state, cid))]
pub async fn show(
    State(state): State<AppState>,
    cid: std::result::Result<Path<CartId>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(cid) = cid?;
    let cart = state.cart_service().get(cid).await?;
    Ok(ApiResponse::with_data("Cart found", cart))
}

/// Fetch one cart with product data embedded.
#[instrument(skip(state, cid))]
pub async fn populated(
    State(state): State<AppState>,
    cid: std::result::Result<Path<CartId>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(cid) = cid?;
    let cart = state.cart_service().populate(cid).await?;
    Ok(ApiResponse::with_data("Cart found", cart))
}

/// Add or subtract one unit of a product.
#[instrument(skip_all, fields(username = %principal.username))]
pub async fn adjust_line(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ids: std::result::Result<Path<(CartId, ProductId)>, PathRejection>,
    body: std::result::Result<Json<AdjustLineBody>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Path((cid, pid)) = ids?;
    let Json(body) = body?;

    let cart = state
        .cart_service()
        .adjust_line(cid, pid, body.op, &principal)
        .await?;
    Ok(ApiResponse::with_data("Cart updated", cart))
}

/// Remove a product from a cart.
#[instrument(skip(state, ids))]
pub async fn remove_line(
    State(state): State<AppState>,
    ids: std::result::Result<Path<(CartId, ProductId)>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path((cid, pid)) = ids?;
    let cart = state.cart_service().remove_line(cid, pid).await?;
    Ok(ApiResponse::with_data("Product removed from cart", cart))
}

/// Remove every line from a cart.
#[instrument(skip(state, cid))]
pub async fn empty(
    State(state): State<AppState>,
    cid: std::result::Result<Path<CartId>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(cid) = cid?;
    let cart = state.cart_service().empty(cid).await?;
    Ok(ApiResponse::with_data("Cart emptied", cart))
}

/// Finalize checkout.
#[instrument(skip_all, fields(username = %principal.username))]
pub async fn purchase(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    cid: std::result::Result<Path<CartId>, PathRejection>,
    body: std::result::Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Path(cid) = cid?;
    let Json(request) = body?;

    let outcome = state.checkout().purchase(cid, request, &principal).await?;
    Ok(ApiResponse::with_data("Purchase completed", outcome))
}
