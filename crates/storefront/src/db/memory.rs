//! In-memory store adapters for tests.
//!
//! [`MemoryStore`] implements every store trait over one mutex-guarded state,
//! with the same conflict and conditional-update semantics as the Postgres
//! repositories. Enabled by the `test-utils` feature.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use estore_core::{CartId, Email, ProductId, Role, TicketId, UserId};

use super::{CartStore, ProductStore, RepositoryError, TicketStore, UserStore};
use crate::models::{Cart, NewProduct, NewTicket, NewUser, Product, Ticket, User};

#[derive(Default)]
struct State {
    next_id: i32,
    users: BTreeMap<Email, (User, String, Vec<CartId>)>,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    tickets: Vec<Ticket>,
}

impl State {
    const fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared in-memory backing for all four stores.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_tickets: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent ticket insert fail with a database error.
    pub fn fail_ticket_creation(&self, fail: bool) {
        self.fail_tickets.store(fail, Ordering::SeqCst);
    }

    /// Change a user's role in place.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_role(&self, email: &Email, role: Role) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let (user, _, _) = state.users.get_mut(email).ok_or(RepositoryError::NotFound)?;
        user.role = role;
        Ok(())
    }

    /// Every ticket created so far.
    pub async fn tickets(&self) -> Vec<Ticket> {
        self.state.lock().await.tickets.clone()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let created = User {
            id: UserId::new(state.next_id()),
            email: user.email.clone(),
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(
            user.email,
            (created.clone(), user.password_hash, Vec::new()),
        );
        Ok(created)
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(email).map(|(u, _, _)| u.clone()))
    }

    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .get(email)
            .map(|(u, hash, _)| (u.clone(), hash.clone())))
    }

    async fn role_of(&self, email: &Email) -> Result<Option<Role>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(email).map(|(u, _, _)| u.role))
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().map(|(u, _, _)| u.clone()).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn attach_cart(
        &self,
        email: &Email,
        cart: CartId,
    ) -> Result<Vec<CartId>, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.carts.contains_key(&cart) || !state.users.contains_key(email) {
            return Err(RepositoryError::NotFound);
        }
        let held_elsewhere = state
            .users
            .iter()
            .any(|(owner, (_, _, carts))| owner != email && carts.contains(&cart));
        if held_elsewhere {
            return Err(RepositoryError::Conflict(format!(
                "cart {cart} belongs to another user"
            )));
        }
        let (_, _, carts) = state.users.get_mut(email).ok_or(RepositoryError::NotFound)?;
        if !carts.contains(&cart) {
            carts.push(cart);
        }
        Ok(carts.clone())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let created = Product {
            id: ProductId::new(state.next_id()),
            title: product.title,
            description: product.description,
            price: product.price,
            stock: product.stock,
            category: product.category,
            owner: product.owner,
        };
        state.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn decrement_stock_if_available(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let mut state = self.state.lock().await;
        match state.products.get_mut(&id) {
            Some(p) if p.stock >= quantity => {
                p.stock -= quantity;
                Ok(Some(p.price))
            }
            _ => Ok(None),
        }
    }

    async fn restock(&self, id: ProductId, quantity: i32) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.stock += quantity;
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn create(&self) -> Result<Cart, RepositoryError> {
        let mut state = self.state.lock().await;
        let cart = Cart::empty(CartId::new(state.next_id()));
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn get(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.state.lock().await.carts.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Cart>, RepositoryError> {
        Ok(self.state.lock().await.carts.values().cloned().collect())
    }

    async fn save(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        let mut state = self.state.lock().await;
        let stored = state.carts.get_mut(&cart.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != cart.version {
            return Err(RepositoryError::Conflict(format!(
                "cart {} was modified concurrently",
                cart.id
            )));
        }

        stored.lines.clone_from(&cart.lines);
        stored.version += 1;
        Ok(stored.clone())
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn create(&self, ticket: NewTicket) -> Result<Ticket, RepositoryError> {
        if self.fail_tickets.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut state = self.state.lock().await;
        let created = Ticket {
            id: TicketId::new(state.next_id()),
            code: ticket.code,
            purchase_datetime: ticket.purchase_datetime,
            amount: ticket.amount,
            purchaser: ticket.purchaser,
        };
        state.tickets.push(created.clone());
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn seller() -> Email {
        Email::parse("seller@shop.com").unwrap()
    }

    async fn product(store: &MemoryStore, stock: i32) -> Product {
        ProductStore::create(
            store,
            NewProduct {
                title: "Mate".to_owned(),
                description: String::new(),
                price: Decimal::new(1000, 2),
                stock,
                category: "kitchen".to_owned(),
                owner: seller(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_conditional_decrement() {
        let store = MemoryStore::new();
        let p = product(&store, 3).await;

        let price = store.decrement_stock_if_available(p.id, 2).await.unwrap();
        assert_eq!(price, Some(Decimal::new(1000, 2)));
        assert_eq!(store.decrement_stock_if_available(p.id, 2).await.unwrap(), None);

        let after = ProductStore::get(&store, p.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 1);
    }

    #[tokio::test]
    async fn test_stale_cart_save_conflicts() {
        let store = MemoryStore::new();
        let cart = CartStore::create(&store).await.unwrap();

        let saved = store.save(&cart).await.unwrap();
        assert_eq!(saved.version, cart.version + 1);

        let err = store.save(&cart).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_attach_cart_is_idempotent() {
        let store = MemoryStore::new();
        UserStore::create(
            &store,
            NewUser {
                email: seller(),
                first_name: "Sam".to_owned(),
                last_name: "Seller".to_owned(),
                age: None,
                password_hash: "x".to_owned(),
                role: Role::Premium,
            },
        )
        .await
        .unwrap();
        let cart = CartStore::create(&store).await.unwrap();

        store.attach_cart(&seller(), cart.id).await.unwrap();
        let carts = store.attach_cart(&seller(), cart.id).await.unwrap();
        assert_eq!(carts, vec![cart.id]);

        let missing = store.attach_cart(&seller(), CartId::new(999)).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_attach_cart_rejects_second_owner() {
        let store = MemoryStore::new();
        for email in ["seller@shop.com", "other@shop.com"] {
            UserStore::create(
                &store,
                NewUser {
                    email: Email::parse(email).unwrap(),
                    first_name: "Sam".to_owned(),
                    last_name: "Seller".to_owned(),
                    age: None,
                    password_hash: "x".to_owned(),
                    role: Role::User,
                },
            )
            .await
            .unwrap();
        }
        let cart = CartStore::create(&store).await.unwrap();
        let other = Email::parse("other@shop.com").unwrap();

        store.attach_cart(&seller(), cart.id).await.unwrap();
        let err = store.attach_cart(&other, cart.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let theirs = store.attach_cart(&other, CartId::new(999)).await;
        assert!(matches!(theirs, Err(RepositoryError::NotFound)));
        assert_eq!(
            store.attach_cart(&seller(), cart.id).await.unwrap(),
            vec![cart.id]
        );
    }
}
