//! Catalog management.

use estore_core::{Email, ProductId};
use estore_storefront::db::{ProductRepository, ProductStore, RepositoryError};
use estore_storefront::models::NewProduct;
use rust_decimal::Decimal;
use thiserror::Error;

use super::{MissingEnvVar, connect, database_url};

#[derive(Debug, Error)]
pub enum ProductError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid owner email: {0}")]
    InvalidOwner(String),

    #[error("Price and stock must not be negative")]
    Negative,

    #[error("Store error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Fields of a new product.
#[derive(Debug)]
pub struct ProductArgs {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: String,
    pub owner: String,
}

/// Insert a product and return its id.
pub async fn add(args: ProductArgs) -> Result<ProductId, ProductError> {
    if args.price.is_sign_negative() || args.stock < 0 {
        return Err(ProductError::Negative);
    }
    let owner =
        Email::parse(&args.owner).map_err(|_| ProductError::InvalidOwner(args.owner.clone()))?;

    let url = database_url()?;
    let pool = connect(&url).await?;

    let product = ProductRepository::new(pool)
        .create(NewProduct {
            title: args.title,
            description: args.description,
            price: args.price.round_dp(2),
            stock: args.stock,
            category: args.category,
            owner,
        })
        .await?;

    tracing::info!(
        "Product created! ID: {}, Title: {}, Stock: {}",
        product.id,
        product.title,
        product.stock
    );

    Ok(product.id)
}
