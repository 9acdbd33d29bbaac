//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `tokens` - Bearer token issuance and verification
//! - `auth` - Signup, login and password hashing
//! - `authz` - The authorization gate (token, role, ownership checks)
//! - `cart` - Cart mutation engine
//! - `checkout` - Purchase finalization
//! - `notifier` - Purchase confirmation delivery

pub mod auth;
pub mod authz;
pub mod cart;
pub mod checkout;
pub mod notifier;
pub mod tokens;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService, LineOp};
pub use checkout::{CheckoutError, CheckoutOutcome, CheckoutService, PurchaseRequest};
pub use notifier::{EmailNotifier, LogNotifier, PurchaseNotifier};
pub use tokens::TokenService;
