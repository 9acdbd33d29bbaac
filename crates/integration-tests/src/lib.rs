//! Integration test harness for E-Store.
//!
//! [`TestApp`] assembles the full router over an in-memory store and a
//! recording notifier, and drives it with `tower::ServiceExt::oneshot`. No
//! database or network is needed.
//!
//! ```bash
//! cargo test -p estore-integration-tests
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use estore_core::{Email, ProductId, Role};
use estore_storefront::{
    config::{AdminBootstrapConfig, StorefrontConfig},
    db::{ProductStore, memory::MemoryStore},
    models::NewProduct,
    routes,
    services::notifier::{PurchaseNotice, RecordingNotifier},
    state::AppState,
};

/// Signing secret used by every test app.
pub const TEST_SECRET: &str = "integration-test-signing-key-6f1c2e9a7b3d";

/// Admin bootstrap credentials configured on every test app.
pub const ADMIN_EMAIL: &str = "root@estore.test";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

/// Default password for accounts created through [`TestApp::signup`].
pub const PASSWORD: &str = "hunter2hunter2";

/// A response with its JSON body (`Value::Null` for non-JSON bodies).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The `data` field of the success envelope.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// The `message` field of the error body.
    #[must_use]
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// The assembled application plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_secret(TEST_SECRET)
    }

    /// An app signing tokens with `secret`.
    #[must_use]
    pub fn with_secret(secret: &str) -> Self {
        let mut config = StorefrontConfig::for_tests(secret);
        config.admin = Some(AdminBootstrapConfig {
            email: ADMIN_EMAIL.to_owned(),
            password: SecretString::from(ADMIN_PASSWORD),
        });

        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::in_memory(config, store.clone(), notifier.clone());

        Self {
            router: routes::app(state),
            store,
            notifier,
        }
    }

    /// Send a request, optionally authenticated and with a JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Register an account with [`PASSWORD`].
    pub async fn signup(&self, email: &str, first_name: &str) -> TestResponse {
        self.signup_with_password(email, first_name, PASSWORD).await
    }

    pub async fn signup_with_password(
        &self,
        email: &str,
        first_name: &str,
        password: &str,
    ) -> TestResponse {
        self.request(
            Method::POST,
            "/sessions/signup",
            None,
            Some(json!({
                "firstName": first_name,
                "lastName": "Tester",
                "email": email,
                "age": 30,
                "password": password,
            })),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/sessions/login",
            None,
            Some(json!({ "username": email, "password": password })),
        )
        .await
    }

    /// Sign up and log in, returning the bearer token.
    pub async fn customer(&self, email: &str, first_name: &str) -> String {
        let signup = self.signup(email, first_name).await;
        assert_eq!(signup.status, StatusCode::CREATED, "{:?}", signup.body);
        self.token_for(email, PASSWORD).await
    }

    /// Log in as the bootstrap admin.
    pub async fn admin(&self) -> String {
        let signup = self
            .signup_with_password(ADMIN_EMAIL, "Root", ADMIN_PASSWORD)
            .await;
        assert_eq!(signup.status, StatusCode::CREATED, "{:?}", signup.body);
        self.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn token_for(&self, email: &str, password: &str) -> String {
        let login = self.login(email, password).await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
        login.data()["token"].as_str().unwrap().to_owned()
    }

    /// Change a stored role directly, bypassing the API.
    pub async fn set_role(&self, email: &str, role: Role) {
        self.store
            .set_role(&Email::parse(email).unwrap(), role)
            .await
            .unwrap();
    }

    /// Add a product to the catalog.
    pub async fn product(&self, title: &str, price: Decimal, stock: i32, owner: &str) -> ProductId {
        ProductStore::create(
            self.store.as_ref(),
            NewProduct {
                title: title.to_owned(),
                description: String::new(),
                price,
                stock,
                category: "mate".to_owned(),
                owner: Email::parse(owner).unwrap(),
            },
        )
        .await
        .unwrap()
        .id
    }

    /// Purchase notices delivered so far, after letting detached sends run.
    pub async fn notices(&self, expected: usize) -> Vec<PurchaseNotice> {
        for _ in 0..50 {
            if self.notifier.sent().await.len() >= expected {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.notifier.sent().await
    }

    /// Current stock of a product.
    pub async fn stock(&self, id: ProductId) -> i32 {
        ProductStore::get(self.store.as_ref(), id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    /// Create a cart and return its id.
    pub async fn create_cart(&self, token: &str) -> i64 {
        let created = self
            .request(Method::POST, "/carts", Some(token), None)
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
        created.data()["id"].as_i64().unwrap()
    }

    /// Apply `op` to one line.
    pub async fn adjust(&self, token: &str, cart: i64, product: ProductId, op: &str) -> TestResponse {
        self.request(
            Method::POST,
            &format!("/carts/{cart}/product/{product}"),
            Some(token),
            Some(json!({ "op": op })),
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
