//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod product;

use secrecy::SecretString;
use sqlx::PgPool;

/// Environment variable holding the storefront database URL.
pub const DATABASE_URL_VAR: &str = "STOREFRONT_DATABASE_URL";

/// Missing database configuration.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVar(pub &'static str);

/// Read the database URL, falling back to `DATABASE_URL`.
pub fn database_url() -> Result<SecretString, MissingEnvVar> {
    dotenvy::dotenv().ok();

    std::env::var(DATABASE_URL_VAR)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingEnvVar(DATABASE_URL_VAR))
}

/// Connect to the storefront database.
pub async fn connect(url: &SecretString) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Connecting to storefront database...");
    estore_storefront::db::create_pool(url).await
}
