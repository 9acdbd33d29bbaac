//! Signup and login.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use estore_integration_tests::{ADMIN_EMAIL, ADMIN_PASSWORD, PASSWORD, TestApp};

#[tokio::test]
async fn test_signup_then_login() {
    let app = TestApp::new();

    let signup = app.signup("bea@estore.test", "Bea").await;
    assert_eq!(signup.status, StatusCode::CREATED);
    assert_eq!(signup.data()["email"], "bea@estore.test");
    assert_eq!(signup.data()["role"], "user");
    assert!(signup.data().get("passwordHash").is_none());

    let login = app.login("bea@estore.test", PASSWORD).await;
    assert_eq!(login.status, StatusCode::OK);
    assert!(login.data()["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(login.data()["user"]["username"], "bea@estore.test");
    assert_eq!(login.data()["user"]["role"], "user");
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let app = TestApp::new();
    app.signup("bea@estore.test", "Bea").await;

    let again = app.signup("bea@estore.test", "Bea").await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_signup_validation() {
    let app = TestApp::new();

    let weak = app
        .signup_with_password("bea@estore.test", "Bea", "short")
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let bad_email = app.signup("bea-at-estore", "Bea").await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    let missing_fields = app
        .request(
            Method::POST,
            "/sessions/signup",
            None,
            Some(serde_json::json!({ "email": "bea@estore.test" })),
        )
        .await;
    assert_eq!(missing_fields.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new();
    app.signup("bea@estore.test", "Bea").await;

    let wrong = app.login("bea@estore.test", "not-the-password").await;
    let unknown = app.login("nobody@estore.test", PASSWORD).await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.message(), unknown.message());
}

#[tokio::test]
async fn test_admin_bootstrap_needs_both_credentials() {
    let app = TestApp::new();

    // Right email, wrong password: ordinary user.
    let imposter = app.signup(ADMIN_EMAIL, "Root").await;
    assert_eq!(imposter.data()["role"], "user");

    let app = TestApp::new();
    let admin = app
        .signup_with_password(ADMIN_EMAIL, "Root", ADMIN_PASSWORD)
        .await;
    assert_eq!(admin.data()["role"], "admin");
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let live = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(live.status, StatusCode::OK);

    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status, StatusCode::OK);
}
