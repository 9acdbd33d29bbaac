//! Login and signup.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ApiResponse;
use crate::error::Result;
use crate::models::Principal;
use crate::services::auth::SignupRequest;
use crate::state::AppState;

/// Login form.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Successful login payload.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Principal,
}

/// Exchange credentials for a bearer token.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(form) = body?;
    let (user, token) = state.auth().login(&form.username, &form.password).await?;

    Ok(ApiResponse::with_data(
        "Login success",
        LoginResponse {
            token,
            user: Principal::from(&user),
        },
    ))
}

/// Register a new account.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    body: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(form) = body?;
    let user = state.auth().signup(form).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_data("User registered", user),
    ))
}
