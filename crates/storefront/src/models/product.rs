//! Product domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use estore_core::{Email, ProductId};

/// A catalog listing. `stock` is the contended resource during checkout.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: String,
    /// Seller who listed the product.
    pub owner: Email,
}

/// Data needed to insert a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: String,
    pub owner: Email,
}
