//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request span)
//! 3. CORS
//! 4. Request ID (tag span, Sentry scope and response)
//! 5. Rate limiting on `/sessions` (governor, per client IP)
//! 6. Authorization gate on protected routers

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{CurrentPrincipal, require_admin, require_authenticated, require_customer};
pub use rate_limit::sessions_rate_limiter;
pub use request_id::request_id_middleware;
