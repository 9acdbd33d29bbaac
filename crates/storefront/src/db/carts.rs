//! Cart repository.
//!
//! A cart is stored as a `carts` row plus ordered `cart_lines`. Saves replace
//! every line inside one transaction, guarded by the row's `version`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;

use estore_core::{CartId, ProductId};

use super::{CartStore, RepositoryError};
use crate::models::{Cart, CartLine};

#[derive(sqlx::FromRow)]
struct LineRow {
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
}

impl From<&LineRow> for CartLine {
    fn from(r: &LineRow) -> Self {
        Self {
            product_id: r.product_id,
            quantity: r.quantity,
        }
    }
}

/// Postgres-backed [`CartStore`].
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lines_of(&self, id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, LineRow>(
            r"
            SELECT cart_id, product_id, quantity
            FROM cart_lines
            WHERE cart_id = $1
            ORDER BY position
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(CartLine::from).collect())
    }
}

#[async_trait]
impl CartStore for CartRepository {
    async fn create(&self) -> Result<Cart, RepositoryError> {
        let (id, version) = sqlx::query_as::<_, (CartId, i32)>(
            "INSERT INTO carts DEFAULT VALUES RETURNING id, version",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Cart {
            id,
            lines: Vec::new(),
            version,
        })
    }

    async fn get(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let version = sqlx::query_scalar::<_, i32>("SELECT version FROM carts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(version) = version else {
            return Ok(None);
        };

        Ok(Some(Cart {
            id,
            lines: self.lines_of(id).await?,
            version,
        }))
    }

    async fn list(&self) -> Result<Vec<Cart>, RepositoryError> {
        let headers = sqlx::query_as::<_, (CartId, i32)>("SELECT id, version FROM carts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, LineRow>(
            "SELECT cart_id, product_id, quantity FROM cart_lines ORDER BY cart_id, position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut carts: BTreeMap<CartId, Cart> = headers
            .into_iter()
            .map(|(id, version)| {
                (
                    id,
                    Cart {
                        id,
                        lines: Vec::new(),
                        version,
                    },
                )
            })
            .collect();

        for row in &rows {
            // Lines inserted after the header query are picked up on the next read.
            if let Some(cart) = carts.get_mut(&row.cart_id) {
                cart.lines.push(CartLine::from(row));
            }
        }

        Ok(carts.into_values().collect())
    }

    async fn save(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let new_version = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE carts
            SET version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING version
            ",
        )
        .bind(cart.id)
        .bind(cart.version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(new_version) = new_version else {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM carts WHERE id = $1)",
            )
            .bind(cart.id)
            .fetch_one(&mut *tx)
            .await?;

            return Err(if exists {
                RepositoryError::Conflict(format!("cart {} was modified concurrently", cart.id))
            } else {
                RepositoryError::NotFound
            });
        };

        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;

        if !cart.lines.is_empty() {
            let product_ids: Vec<i32> = cart.lines.iter().map(|l| l.product_id.as_i32()).collect();
            let quantities: Vec<i32> = cart.lines.iter().map(|l| l.quantity).collect();
            let positions: Vec<i32> = (0..).take(cart.lines.len()).collect();

            sqlx::query(
                r"
                INSERT INTO cart_lines (cart_id, product_id, quantity, position)
                SELECT $1, * FROM UNNEST($2::int4[], $3::int4[], $4::int4[])
                ",
            )
            .bind(cart.id)
            .bind(&product_ids)
            .bind(&quantities)
            .bind(&positions)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    RepositoryError::NotFound
                }
                other => RepositoryError::Database(other),
            })?;
        }

        tx.commit().await?;

        Ok(Cart {
            id: cart.id,
            lines: cart.lines.clone(),
            version: new_version,
        })
    }
}
