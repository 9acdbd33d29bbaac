//! Cart mutation engine.
//!
//! Every write is read-modify-write of the whole cart document, made safe by
//! the store's version check: on a stale write the mutation is re-applied to a
//! fresh read, up to [`MAX_WRITE_ATTEMPTS`] times.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use estore_core::{CartId, ProductId};

use super::auth::AuthError;
use super::authz;
use crate::db::{CartStore, ProductStore, RepositoryError};
use crate::models::{Cart, CartLine, PopulatedCart, PopulatedLine, Principal};

/// Attempts made before a contended cart write gives up.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart {0} not found")]
    CartNotFound(CartId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("cart {0} is being modified concurrently, try again")]
    Conflict(CartId),

    #[error("cart store error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Direction of a single-unit quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOp {
    Add,
    Subtract,
}

impl FromStr for LineOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            // "substract" is the spelling existing clients send.
            "substract" | "subtract" => Ok(Self::Subtract),
            other => Err(format!("unknown op: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for LineOp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Apply one unit of `op` to the line for `product_id`.
///
/// A missing line is inserted with quantity 1 whatever `op` is. A line that
/// drops to zero or below is removed.
pub fn apply_line_op(cart: &mut Cart, product_id: ProductId, op: LineOp) {
    match cart.line_mut(product_id) {
        None => cart.lines.push(CartLine {
            product_id,
            quantity: 1,
        }),
        Some(line) => {
            line.quantity = match op {
                LineOp::Add => line.quantity.saturating_add(1),
                LineOp::Subtract => line.quantity.saturating_sub(1),
            };
            if line.quantity <= 0 {
                cart.remove_product(product_id);
            }
        }
    }
}

/// Cart operations over the cart and product stores.
pub struct CartService<'a> {
    carts: &'a dyn CartStore,
    products: &'a dyn ProductStore,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(carts: &'a dyn CartStore, products: &'a dyn ProductStore) -> Self {
        Self { carts, products }
    }

    /// Create and persist an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the insert fails.
    #[instrument(skip(self))]
    pub async fn create_empty(&self) -> Result<Cart, CartError> {
        let cart = self.carts.create().await?;
        tracing::info!(cart_id = %cart.id, "cart created");
        Ok(cart)
    }

    /// # Errors
    ///
    /// Returns `CartError::CartNotFound` if there is no such cart.
    pub async fn get(&self, id: CartId) -> Result<Cart, CartError> {
        self.carts.get(id).await?.ok_or(CartError::CartNotFound(id))
    }

    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn list(&self) -> Result<Vec<Cart>, CartError> {
        Ok(self.carts.list().await?)
    }

    /// The cart with each line's product embedded, in line order.
    ///
    /// Lines whose product has been deleted are left out.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CartNotFound` if there is no such cart.
    #[instrument(skip(self))]
    pub async fn populate(&self, id: CartId) -> Result<PopulatedCart, CartError> {
        let cart = self.get(id).await?;
        let ids: Vec<ProductId> = cart.lines.iter().map(|l| l.product_id).collect();
        let mut products: HashMap<ProductId, _> = self
            .products
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            match products.remove(&line.product_id) {
                Some(product) => lines.push(PopulatedLine {
                    product,
                    quantity: line.quantity,
                }),
                None => {
                    tracing::warn!(product_id = %line.product_id, "cart line references missing product");
                }
            }
        }

        Ok(PopulatedCart {
            id: cart.id,
            products: lines,
        })
    }

    /// Add or subtract one unit of `product_id` on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CartNotFound` if the cart is missing (checked first),
    /// `CartError::ProductNotFound` if the product is missing,
    /// `CartError::Auth(Forbidden)` if `requester` owns the product,
    /// `CartError::Conflict` if the write keeps losing races.
    #[instrument(skip(self, requester), fields(requester = %requester.username))]
    pub async fn adjust_line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        op: LineOp,
        requester: &Principal,
    ) -> Result<Cart, CartError> {
        self.get(cart_id).await?;

        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;

        if let Err(e) = authz::authorize_ownership(requester, &product.owner) {
            tracing::warn!(%product_id, "seller tried to cart own product");
            return Err(e.into());
        }

        let cart = self
            .mutate(cart_id, |cart| apply_line_op(cart, product_id, op))
            .await?;
        tracing::info!(%cart_id, %product_id, ?op, "cart line adjusted");
        Ok(cart)
    }

    /// Drop every line for `product_id`. Removing an absent product is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CartNotFound` if there is no such cart.
    #[instrument(skip(self))]
    pub async fn remove_line(&self, cart_id: CartId, product_id: ProductId) -> Result<Cart, CartError> {
        let cart = self
            .mutate(cart_id, |cart| {
                cart.remove_product(product_id);
            })
            .await?;
        tracing::info!(%cart_id, %product_id, "cart line removed");
        Ok(cart)
    }

    /// Remove all lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CartNotFound` if there is no such cart.
    #[instrument(skip(self))]
    pub async fn empty(&self, cart_id: CartId) -> Result<Cart, CartError> {
        let cart = self.mutate(cart_id, |cart| cart.lines.clear()).await?;
        tracing::info!(%cart_id, "cart emptied");
        Ok(cart)
    }

    /// Replace all lines. Used by checkout to keep only unfulfilled lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CartNotFound` if there is no such cart.
    pub async fn replace_lines(&self, cart_id: CartId, lines: &[CartLine]) -> Result<Cart, CartError> {
        self.mutate(cart_id, |cart| cart.lines = lines.to_vec()).await
    }

    async fn mutate<F>(&self, cart_id: CartId, mut apply: F) -> Result<Cart, CartError>
    where
        F: FnMut(&mut Cart) + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut cart = self.get(cart_id).await?;
            apply(&mut cart);

            match self.carts.save(&cart).await {
                Ok(saved) => return Ok(saved),
                Err(RepositoryError::Conflict(_)) => {
                    tracing::warn!(%cart_id, attempt, "stale cart write, retrying");
                }
                Err(RepositoryError::NotFound) => return Err(CartError::CartNotFound(cart_id)),
                Err(e) => return Err(e.into()),
            }
        }

        Err(CartError::Conflict(cart_id))
    }
}
