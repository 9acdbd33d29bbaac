//! Cart domain types.

use serde::Serialize;

use estore_core::{CartId, ProductId};

use super::Product;

/// A single (product, quantity) pair. A cart holds at most one line per product.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A cart document.
///
/// `version` increments on every successful save and guards against lost
/// updates between concurrent writers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    #[serde(rename = "products")]
    pub lines: Vec<CartLine>,
    pub version: i32,
}

impl Cart {
    /// An unsaved empty cart.
    #[must_use]
    pub const fn empty(id: CartId) -> Self {
        Self {
            id,
            lines: Vec::new(),
            version: 0,
        }
    }

    /// Returns the line for `product_id`, if any.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Mutable access to the line for `product_id`, if any.
    pub fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }

    /// Drop every line for `product_id`. Returns `true` if anything was removed.
    pub fn remove_product(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }
}

/// A line with its product record embedded.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PopulatedLine {
    pub product: Product,
    pub quantity: i32,
}

/// A cart whose lines carry product snapshots.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PopulatedCart {
    pub id: CartId,
    pub products: Vec<PopulatedLine>,
}
