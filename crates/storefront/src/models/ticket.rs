//! Purchase tickets.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use estore_core::{Email, TicketId};

/// Immutable record of a completed (possibly partial) purchase.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    /// Six-digit purchase code shown to the buyer.
    pub code: i32,
    pub purchase_datetime: DateTime<Utc>,
    /// Charged total, always two decimal places.
    pub amount: Decimal,
    pub purchaser: Email,
}

/// Data needed to insert a ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub code: i32,
    pub purchase_datetime: DateTime<Utc>,
    pub amount: Decimal,
    pub purchaser: Email,
}
