//! Ticket repository. Tickets are never updated or deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use estore_core::TicketId;

use super::{RepositoryError, TicketStore, parse_email_column};
use crate::models::{NewTicket, Ticket};

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: TicketId,
    code: i32,
    purchase_datetime: DateTime<Utc>,
    amount: Decimal,
    purchaser: String,
}

/// Postgres-backed [`TicketStore`].
#[derive(Clone)]
pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    /// Create a new ticket repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketStore for TicketRepository {
    async fn create(&self, ticket: NewTicket) -> Result<Ticket, RepositoryError> {
        let r = sqlx::query_as::<_, TicketRow>(
            r"
            INSERT INTO tickets (code, purchase_datetime, amount, purchaser)
            VALUES ($1, $2, $3, $4)
            RETURNING id, code, purchase_datetime, amount, purchaser
            ",
        )
        .bind(ticket.code)
        .bind(ticket.purchase_datetime)
        .bind(ticket.amount)
        .bind(ticket.purchaser.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Ticket {
            id: r.id,
            code: r.code,
            purchase_datetime: r.purchase_datetime,
            amount: r.amount,
            purchaser: parse_email_column(&r.purchaser)?,
        })
    }
}
