//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{
    CartRepository, CartStore, ProductRepository, ProductStore, TicketRepository, TicketStore,
    UserRepository, UserStore,
};
use crate::services::{
    AuthService, CartService, CheckoutService, EmailNotifier, LogNotifier, PurchaseNotifier,
    TokenService,
};

/// Store adapters and collaborators a state is assembled from.
pub struct StateParts {
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub carts: Arc<dyn CartStore>,
    pub tickets: Arc<dyn TicketStore>,
    pub notifier: Arc<dyn PurchaseNotifier>,
    /// Pool used by the readiness check. `None` when running on other stores.
    pub pool: Option<PgPool>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store adapters, token service and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    tokens: TokenService,
    users: Arc<dyn UserStore>,
    products: Arc<dyn ProductStore>,
    carts: Arc<dyn CartStore>,
    tickets: Arc<dyn TicketStore>,
    notifier: Arc<dyn PurchaseNotifier>,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create the production state: Postgres repositories and SMTP mail when
    /// configured, log-only notifications otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let notifier: Arc<dyn PurchaseNotifier> = match &config.email {
            Some(email) => Arc::new(EmailNotifier::new(email)?),
            None => {
                tracing::warn!("SMTP_HOST not set, purchase confirmations will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self::from_parts(
            config,
            StateParts {
                users: Arc::new(UserRepository::new(pool.clone())),
                products: Arc::new(ProductRepository::new(pool.clone())),
                carts: Arc::new(CartRepository::new(pool.clone())),
                tickets: Arc::new(TicketRepository::new(pool.clone())),
                notifier,
                pool: Some(pool),
            },
        ))
    }

    /// Assemble a state from explicit parts.
    #[must_use]
    pub fn from_parts(config: StorefrontConfig, parts: StateParts) -> Self {
        let tokens = TokenService::new(config.jwt_secret.clone(), config.token_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                tokens,
                users: parts.users,
                products: parts.products,
                carts: parts.carts,
                tickets: parts.tickets,
                notifier: parts.notifier,
                pool: parts.pool,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    /// Database pool, when running on Postgres.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            self.users(),
            self.tokens(),
            self.inner.config.admin.as_ref(),
        )
    }

    #[must_use]
    pub fn cart_service(&self) -> CartService<'_> {
        CartService::new(self.inner.carts.as_ref(), self.inner.products.as_ref())
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            self.inner.carts.as_ref(),
            self.inner.products.as_ref(),
            self.inner.tickets.as_ref(),
            Arc::clone(&self.inner.notifier),
        )
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl AppState {
    /// State backed entirely by one in-memory store.
    #[must_use]
    pub fn in_memory(
        config: StorefrontConfig,
        store: Arc<crate::db::memory::MemoryStore>,
        notifier: Arc<dyn PurchaseNotifier>,
    ) -> Self {
        Self::from_parts(
            config,
            StateParts {
                users: store.clone(),
                products: store.clone(),
                carts: store.clone(),
                tickets: store,
                notifier,
                pool: None,
            },
        )
    }
}
