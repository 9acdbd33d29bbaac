//! Store adapters for storefront `PostgreSQL`.
//!
//! # Database: `estore`
//!
//! ## Tables
//!
//! - `users` - Accounts, password hashes and roles
//! - `products` - Catalog listings with contended `stock`
//! - `carts` / `cart_lines` - Cart documents, versioned for optimistic writes
//! - `user_carts` - Back-reference from a user to the carts they hold
//! - `tickets` - Immutable purchase records
//!
//! Each table is reached through a trait so services can run against either
//! the Postgres repositories here or the in-memory stores in [`memory`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p estore-cli -- migrate
//! ```

pub mod carts;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod products;
pub mod tickets;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use estore_core::{CartId, Email, ProductId, Role};

use crate::models::{Cart, NewProduct, NewTicket, NewUser, Product, Ticket, User};

pub use carts::CartRepository;
pub use products::ProductRepository;
pub use tickets::TicketRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or stale write.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with `Conflict` if the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// The user together with their stored password hash.
    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Current role of a user, read fresh on every call.
    async fn role_of(&self, email: &Email) -> Result<Option<Role>, RepositoryError>;

    async fn list(&self) -> Result<Vec<User>, RepositoryError>;

    /// Attach `cart` to the user's cart list (idempotent) and return the list.
    /// Fails with `NotFound` if the user or cart does not exist and with
    /// `Conflict` if another user already holds the cart.
    async fn attach_cart(&self, email: &Email, cart: CartId)
    -> Result<Vec<CartId>, RepositoryError>;
}

/// Catalog storage, including the contended stock counter.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products for `ids`; missing ids are skipped.
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Atomically subtract `quantity` from stock if at least that much is left.
    ///
    /// Returns the stored unit price when the decrement was applied and `None`
    /// when stock was insufficient or the product is gone.
    async fn decrement_stock_if_available(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Option<Decimal>, RepositoryError>;

    /// Add `quantity` back to stock. Compensates a prior decrement.
    async fn restock(&self, id: ProductId, quantity: i32) -> Result<(), RepositoryError>;
}

/// Cart document storage with optimistic versioning.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn create(&self) -> Result<Cart, RepositoryError>;

    async fn get(&self, id: CartId) -> Result<Option<Cart>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Cart>, RepositoryError>;

    /// Replace the stored lines with `cart.lines` if the stored version still
    /// equals `cart.version`. Returns the saved cart with its new version.
    ///
    /// Fails with `Conflict` on a stale version and `NotFound` if the cart
    /// does not exist.
    async fn save(&self, cart: &Cart) -> Result<Cart, RepositoryError>;
}

/// Purchase ticket storage. Tickets are insert-only.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create(&self, ticket: NewTicket) -> Result<Ticket, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-violation into `Conflict`, anything else into `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Parse an email column, reporting bad data as corruption.
pub(crate) fn parse_email_column(raw: &str) -> Result<Email, RepositoryError> {
    Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}
