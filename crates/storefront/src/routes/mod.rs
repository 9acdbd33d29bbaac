//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                         - Liveness
//! GET    /health/ready                   - Database reachability
//!
//! # Sessions (rate limited)
//! POST   /sessions/login                 - Returns a bearer token
//! POST   /sessions/signup                - Registers a user
//!
//! # Carts (user, premium)
//! GET    /carts                          - List carts
//! POST   /carts                          - Create an empty cart
//! GET    /carts/{cid}                    - Fetch a cart
//! DELETE /carts/{cid}                    - Empty a cart
//! GET    /carts/populated/{cid}          - Fetch a cart with product data
//! POST   /carts/{cid}/product/{pid}      - Adjust a line {op}
//! DELETE /carts/{cid}/product/{pid}      - Remove a line
//! POST   /carts/{cid}/purchase           - Finalize checkout
//!
//! # Users
//! GET    /users                          - List users (admin)
//! GET    /users/current                  - Token principal (any role)
//! PUT    /users/cart                     - Attach a cart {cartId} (user, premium)
//! ```

pub mod carts;
pub mod health;
pub mod sessions;
pub mod users;

use axum::{
    Json, Router,
    body::Body,
    http::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    request_id_middleware, require_admin, require_authenticated, require_customer,
    sessions_rate_limiter,
};
use crate::state::AppState;

/// Success envelope: `{"message": ..., "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Envelope carrying `data`.
    pub fn with_data(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            message: message.into(),
            data: Some(data),
        })
    }
}

/// Cart routes, all behind the customer gate.
pub fn cart_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(carts::list).post(carts::create))
        .route("/{cid}", get(carts::show).delete(carts::empty))
        .route("/populated/{cid}", get(carts::populated))
        .route(
            "/{cid}/product/{pid}",
            post(carts::adjust_line).delete(carts::remove_line),
        )
        .route("/{cid}/purchase", post(carts::purchase))
        .route_layer(from_fn_with_state(state.clone(), require_customer))
}

/// Login and signup, optionally rate limited per client IP.
pub fn session_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/login", post(sessions::login))
        .route("/signup", post(sessions::signup));

    if state.config().rate_limit {
        router.layer(sessions_rate_limiter())
    } else {
        router
    }
}

/// User routes; each has its own gate.
pub fn user_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/", get(users::list))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let authenticated = Router::new()
        .route("/current", get(users::current))
        .route_layer(from_fn_with_state(state.clone(), require_authenticated));

    let customer = Router::new()
        .route("/cart", put(users::attach_cart))
        .route_layer(from_fn_with_state(state.clone(), require_customer));

    admin.merge(authenticated).merge(customer)
}

/// Create all routes for the storefront.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/sessions", session_routes(state))
        .nest("/carts", cart_routes(state))
        .nest("/users", user_routes(state))
}

/// The complete application: routes, state and the shared middleware stack.
pub fn app(state: AppState) -> Router {
    routes(&state)
        .with_state(state)
        .layer(from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
}
