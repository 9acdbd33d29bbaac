//! Checkout coordinator.
//!
//! Turns a cart plus the buyer's view of each line into a ticket:
//!
//! 1. Lines whose snapshot stock covers the quantity are candidates; the rest
//!    stay in the cart.
//! 2. Each candidate is claimed with one conditional stock decrement. A lost
//!    race makes the line unfulfillable instead of overselling.
//! 3. The ticket charges 85% of the stored price of every claimed unit.
//! 4. If the ticket cannot be written, every claimed unit is restocked.
//! 5. The cart keeps exactly the unfulfilled lines, and a confirmation is
//!    sent in the background.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use estore_core::{CartId, Email, ProductId};

use super::cart::{CartError, CartService};
use super::notifier::{PurchaseNotice, PurchaseNotifier, UnfulfilledItem};
use crate::db::{CartStore, ProductStore, RepositoryError, TicketStore};
use crate::models::{CartLine, NewTicket, Principal, Ticket};

/// Fraction of list price charged on every purchase (fixed 15% off).
pub const PRICE_FACTOR: Decimal = Decimal::from_parts(85, 0, 0, false, 2);

/// Purchase codes are six-digit integers.
const TICKET_CODE_RANGE: std::ops::Range<i32> = 100_000..1_000_000;

/// Body of a purchase request.
///
/// Every field is optional at the type level so that a missing one surfaces as
/// a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub username: Option<String>,
    pub products: Option<Vec<PurchaseLine>>,
    /// Client-computed total. Never used for the charge.
    pub amount_purchase: Option<serde_json::Value>,
}

/// The buyer's snapshot of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    #[serde(alias = "_id")]
    pub id: ProductId,
    #[serde(default)]
    pub title: String,
    pub price: Decimal,
    pub stock: i32,
}

/// One requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product: ProductSnapshot,
    pub quantity: i32,
}

/// Result of a checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub ticket: Ticket,
    /// Lines that were bought, priced at what was charged per unit.
    pub products: Vec<PurchaseLine>,
    /// Lines left in the cart.
    pub remaining_products: Vec<PurchaseLine>,
}

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid purchase request: {0}")]
    InvalidInput(String),

    #[error("cart {0} not found")]
    CartNotFound(CartId),

    #[error("checkout persistence failed: {0}")]
    Persistence(#[from] RepositoryError),
}

/// A validated purchase request.
struct Order {
    purchaser: Email,
    lines: Vec<PurchaseLine>,
}

impl TryFrom<PurchaseRequest> for Order {
    type Error = CheckoutError;

    fn try_from(request: PurchaseRequest) -> Result<Self, Self::Error> {
        let username = request
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| CheckoutError::InvalidInput("username is required".to_owned()))?;
        let purchaser = Email::parse(&username)
            .map_err(|e| CheckoutError::InvalidInput(format!("username: {e}")))?;
        let lines = request
            .products
            .ok_or_else(|| CheckoutError::InvalidInput("products are required".to_owned()))?;

        let mut seen = HashSet::new();
        for line in &lines {
            if line.quantity < 1 {
                return Err(CheckoutError::InvalidInput(format!(
                    "quantity for product {} must be at least 1",
                    line.product.id
                )));
            }
            if !seen.insert(line.product.id) {
                return Err(CheckoutError::InvalidInput(format!(
                    "product {} is listed more than once",
                    line.product.id
                )));
            }
        }

        Ok(Self { purchaser, lines })
    }
}

/// `round(Σ price × quantity × 0.85, 2)`, always with two decimal places.
#[must_use]
pub fn discounted_total<'a>(charged: impl IntoIterator<Item = (&'a Decimal, i32)>) -> Decimal {
    let gross: Decimal = charged
        .into_iter()
        .map(|(price, quantity)| *price * Decimal::from(quantity))
        .sum();
    let mut total =
        (gross * PRICE_FACTOR).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    total.rescale(2);
    total
}

/// Random six-digit purchase code.
#[must_use]
pub fn generate_ticket_code() -> i32 {
    rand::rng().random_range(TICKET_CODE_RANGE)
}

/// Purchase finalization over the cart, product and ticket stores.
pub struct CheckoutService<'a> {
    carts: &'a dyn CartStore,
    products: &'a dyn ProductStore,
    tickets: &'a dyn TicketStore,
    notifier: Arc<dyn PurchaseNotifier>,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub fn new(
        carts: &'a dyn CartStore,
        products: &'a dyn ProductStore,
        tickets: &'a dyn TicketStore,
        notifier: Arc<dyn PurchaseNotifier>,
    ) -> Self {
        Self {
            carts,
            products,
            tickets,
            notifier,
        }
    }

    /// Finalize the purchase of `cart_id`.
    ///
    /// Stock shortages are a normal partial outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidInput` for a missing/malformed body,
    /// `CheckoutError::CartNotFound` for an unknown cart and
    /// `CheckoutError::Persistence` if stock or the ticket cannot be written.
    #[instrument(skip(self, request, principal), fields(buyer = %principal.username))]
    pub async fn purchase(
        &self,
        cart_id: CartId,
        request: PurchaseRequest,
        principal: &Principal,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let order = Order::try_from(request)?;

        let cart_service = CartService::new(self.carts, self.products);
        cart_service.get(cart_id).await.map_err(|e| match e {
            CartError::CartNotFound(id) => CheckoutError::CartNotFound(id),
            other => cart_error_to_persistence(other),
        })?;

        let (candidates, mut unfulfilled): (Vec<_>, Vec<_>) = order
            .lines
            .into_iter()
            .partition(|line| line.product.stock >= line.quantity);

        let mut fulfilled: Vec<PurchaseLine> = Vec::with_capacity(candidates.len());
        for mut line in candidates {
            let claimed = match self
                .products
                .decrement_stock_if_available(line.product.id, line.quantity)
                .await
            {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::error!(error = %e, product_id = %line.product.id, "stock decrement failed");
                    self.compensate(&fulfilled).await;
                    return Err(e.into());
                }
            };

            match claimed {
                Some(price) => {
                    line.product.price = price;
                    fulfilled.push(line);
                }
                None => {
                    tracing::warn!(
                        product_id = %line.product.id,
                        quantity = line.quantity,
                        "stock ran out since snapshot, keeping line in cart"
                    );
                    unfulfilled.push(line);
                }
            }
        }

        let amount = discounted_total(fulfilled.iter().map(|l| (&l.product.price, l.quantity)));

        let ticket = match self
            .tickets
            .create(NewTicket {
                code: generate_ticket_code(),
                purchase_datetime: Utc::now(),
                amount,
                purchaser: order.purchaser,
            })
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::error!(error = %e, %cart_id, "ticket creation failed, restocking");
                self.compensate(&fulfilled).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            %cart_id,
            ticket_id = %ticket.id,
            code = ticket.code,
            amount = %ticket.amount,
            fulfilled = fulfilled.len(),
            unfulfilled = unfulfilled.len(),
            "purchase completed"
        );

        let remaining: Vec<CartLine> = unfulfilled
            .iter()
            .map(|l| CartLine {
                product_id: l.product.id,
                quantity: l.quantity,
            })
            .collect();
        if let Err(e) = cart_service.replace_lines(cart_id, &remaining).await {
            tracing::error!(error = %e, %cart_id, ticket_id = %ticket.id, "failed to update cart after purchase");
        }

        self.notify(PurchaseNotice {
            to: principal.username.clone(),
            first_name: principal.first_name.clone(),
            code: ticket.code,
            amount: ticket.amount,
            unfulfilled: unfulfilled
                .iter()
                .map(|l| UnfulfilledItem {
                    title: l.product.title.clone(),
                    quantity: l.quantity,
                })
                .collect(),
        });

        Ok(CheckoutOutcome {
            ticket,
            products: fulfilled,
            remaining_products: unfulfilled,
        })
    }

    /// Give back every unit claimed so far.
    async fn compensate(&self, claimed: &[PurchaseLine]) {
        for line in claimed {
            if let Err(e) = self.products.restock(line.product.id, line.quantity).await {
                tracing::error!(
                    error = %e,
                    product_id = %line.product.id,
                    quantity = line.quantity,
                    "restock failed, stock is now short"
                );
            }
        }
    }

    /// Fire-and-forget confirmation.
    fn notify(&self, notice: PurchaseNotice) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.purchase_confirmed(&notice).await {
                tracing::warn!(error = %e, to = %notice.to, code = notice.code, "purchase confirmation failed");
            }
        });
    }
}

fn cart_error_to_persistence(e: CartError) -> CheckoutError {
    match e {
        CartError::Repository(inner) => CheckoutError::Persistence(inner),
        other => CheckoutError::Persistence(RepositoryError::DataCorruption(other.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::{NewProduct, Product};
    use crate::services::cart::LineOp;
    use crate::services::notifier::RecordingNotifier;
    use estore_core::Role;

    fn buyer() -> Principal {
        Principal {
            username: Email::parse("bea@shop.com").unwrap(),
            role: Role::User,
            first_name: "Bea".to_owned(),
        }
    }

    async fn product(store: &MemoryStore, title: &str, price: i64, stock: i32) -> Product {
        ProductStore::create(
            store,
            NewProduct {
                title: title.to_owned(),
                description: String::new(),
                price: Decimal::from(price),
                stock,
                category: "misc".to_owned(),
                owner: Email::parse("seller@shop.com").unwrap(),
            },
        )
        .await
        .unwrap()
    }

    fn line(p: &Product, quantity: i32) -> PurchaseLine {
        PurchaseLine {
            product: ProductSnapshot {
                id: p.id,
                title: p.title.clone(),
                price: p.price,
                stock: p.stock,
            },
            quantity,
        }
    }

    fn request(lines: Vec<PurchaseLine>) -> PurchaseRequest {
        PurchaseRequest {
            username: Some("bea@shop.com".to_owned()),
            products: Some(lines),
            amount_purchase: Some(serde_json::json!(1)),
        }
    }

    async fn cart_with(store: &MemoryStore, products: &[&Product]) -> CartId {
        let carts = CartService::new(store, store);
        let cart = carts.create_empty().await.unwrap();
        for p in products {
            carts
                .adjust_line(cart.id, p.id, LineOp::Add, &buyer())
                .await
                .unwrap();
        }
        cart.id
    }

    #[test]
    fn test_discounted_total_rounding() {
        let hundred = Decimal::from(100);
        assert_eq!(discounted_total([(&hundred, 3)]).to_string(), "255.00");

        let odd = Decimal::new(333, 2); // 3.33 * 1 * 0.85 = 2.8305
        assert_eq!(discounted_total([(&odd, 1)]).to_string(), "2.83");

        let half = Decimal::new(1, 2); // 0.01 * 0.85 * 3 = 0.0255
        assert_eq!(discounted_total([(&half, 3)]).to_string(), "0.03");

        assert_eq!(discounted_total(std::iter::empty()).to_string(), "0.00");
    }

    #[test]
    fn test_ticket_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_ticket_code();
            assert!((100_000..1_000_000).contains(&code));
        }
    }

    #[tokio::test]
    async fn test_partial_fulfillment() {
        let store = MemoryStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let a = product(&store, "A", 100, 5).await;
        let b = product(&store, "B", 50, 1).await;
        let cart_id = cart_with(&store, &[&a, &b]).await;

        let checkout = CheckoutService::new(&store, &store, &store, notifier.clone());
        let outcome = checkout
            .purchase(cart_id, request(vec![line(&a, 3), line(&b, 2)]), &buyer())
            .await
            .unwrap();

        assert_eq!(outcome.ticket.amount.to_string(), "255.00");
        assert_eq!(outcome.ticket.purchaser.as_str(), "bea@shop.com");
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.remaining_products, vec![line(&b, 2)]);

        let a_after = ProductStore::get(&store, a.id).await.unwrap().unwrap();
        let b_after = ProductStore::get(&store, b.id).await.unwrap().unwrap();
        assert_eq!(a_after.stock, 2);
        assert_eq!(b_after.stock, 1);

        let cart = CartStore::get(&store, cart_id).await.unwrap().unwrap();
        assert_eq!(
            cart.lines,
            vec![CartLine {
                product_id: b.id,
                quantity: 2
            }]
        );

        // Notification runs on a spawned task.
        for _ in 0..10 {
            if !notifier.sent().await.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].unfulfilled.len(), 1);
        assert_eq!(sent[0].first_name, "Bea");
    }

    #[tokio::test]
    async fn test_notice_addressed_to_caller() {
        let store = MemoryStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let a = product(&store, "A", 100, 5).await;
        let cart_id = cart_with(&store, &[&a]).await;

        let mut body = request(vec![line(&a, 1)]);
        body.username = Some("victim@elsewhere.test".to_owned());
        let checkout = CheckoutService::new(&store, &store, &store, notifier.clone());
        let outcome = checkout.purchase(cart_id, body, &buyer()).await.unwrap();
        assert_eq!(outcome.ticket.purchaser.as_str(), "victim@elsewhere.test");

        for _ in 0..10 {
            if !notifier.sent().await.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, buyer().username);
    }

    #[tokio::test]
    async fn test_stale_snapshot_does_not_oversell() {
        let store = MemoryStore::new();
        let a = product(&store, "A", 10, 2).await;
        let cart_id = cart_with(&store, &[&a]).await;

        // Someone else bought the stock after the buyer's snapshot was taken.
        store.decrement_stock_if_available(a.id, 2).await.unwrap();

        let checkout =
            CheckoutService::new(&store, &store, &store, Arc::new(RecordingNotifier::default()));
        let outcome = checkout
            .purchase(cart_id, request(vec![line(&a, 2)]), &buyer())
            .await
            .unwrap();

        assert!(outcome.products.is_empty());
        assert_eq!(outcome.remaining_products.len(), 1);
        assert_eq!(outcome.ticket.amount, Decimal::new(0, 2));
        let a_after = ProductStore::get(&store, a.id).await.unwrap().unwrap();
        assert_eq!(a_after.stock, 0);
    }

    #[tokio::test]
    async fn test_client_amount_is_ignored() {
        let store = MemoryStore::new();
        let a = product(&store, "A", 20, 5).await;
        let cart_id = cart_with(&store, &[&a]).await;

        let mut req = request(vec![line(&a, 1)]);
        req.amount_purchase = Some(serde_json::json!(0.01));

        let checkout =
            CheckoutService::new(&store, &store, &store, Arc::new(RecordingNotifier::default()));
        let outcome = checkout.purchase(cart_id, req, &buyer()).await.unwrap();
        assert_eq!(outcome.ticket.amount.to_string(), "17.00");
    }

    #[tokio::test]
    async fn test_ticket_failure_restocks() {
        let store = MemoryStore::new();
        let a = product(&store, "A", 100, 5).await;
        let cart_id = cart_with(&store, &[&a]).await;
        store.fail_ticket_creation(true);

        let checkout =
            CheckoutService::new(&store, &store, &store, Arc::new(RecordingNotifier::default()));
        let err = checkout
            .purchase(cart_id, request(vec![line(&a, 3)]), &buyer())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Persistence(_)));

        let a_after = ProductStore::get(&store, a.id).await.unwrap().unwrap();
        assert_eq!(a_after.stock, 5);
        let cart = CartStore::get(&store, cart_id).await.unwrap().unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert!(store.tickets().await.is_empty());
    }

    #[tokio::test]
    async fn test_validation() {
        let store = MemoryStore::new();
        let a = product(&store, "A", 100, 5).await;
        let cart_id = cart_with(&store, &[&a]).await;
        let checkout =
            CheckoutService::new(&store, &store, &store, Arc::new(RecordingNotifier::default()));

        let missing_user = PurchaseRequest {
            username: None,
            ..request(vec![line(&a, 1)])
        };
        let missing_products = PurchaseRequest {
            products: None,
            ..request(Vec::new())
        };
        let zero_quantity = request(vec![line(&a, 0)]);
        let duplicate = request(vec![line(&a, 1), line(&a, 1)]);

        for bad in [missing_user, missing_products, zero_quantity, duplicate] {
            assert!(matches!(
                checkout.purchase(cart_id, bad, &buyer()).await,
                Err(CheckoutError::InvalidInput(_))
            ));
        }

        assert!(matches!(
            checkout
                .purchase(CartId::new(9999), request(vec![line(&a, 1)]), &buyer())
                .await,
            Err(CheckoutError::CartNotFound(_))
        ));
        let a_after = ProductStore::get(&store, a.id).await.unwrap().unwrap();
        assert_eq!(a_after.stock, 5);
    }
}
