//! Cart mutation through the HTTP surface.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use estore_integration_tests::TestApp;
use rust_decimal::Decimal;
use serde_json::json;

const SELLER: &str = "seller@estore.test";

#[tokio::test]
async fn test_add_subtract_and_auto_remove() {
    let app = TestApp::new();
    let gourd = app.product("Gourd", Decimal::new(10000, 2), 5, SELLER).await;
    let token = app.customer("bea@estore.test", "Bea").await;
    let cart = app.create_cart(&token).await;

    let added = app.adjust(&token, cart, gourd, "add").await;
    assert_eq!(added.data()["products"], json!([{ "productId": gourd, "quantity": 1 }]));

    app.adjust(&token, cart, gourd, "add").await;
    let subtracted = app.adjust(&token, cart, gourd, "substract").await;
    assert_eq!(subtracted.data()["products"][0]["quantity"], 1);

    let removed = app.adjust(&token, cart, gourd, "subtract").await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.data()["products"], json!([]));
}

#[tokio::test]
async fn test_subtract_on_absent_line_inserts_one() {
    let app = TestApp::new();
    let gourd = app.product("Gourd", Decimal::new(10000, 2), 5, SELLER).await;
    let token = app.customer("bea@estore.test", "Bea").await;
    let cart = app.create_cart(&token).await;

    let response = app.adjust(&token, cart, gourd, "substract").await;
    assert_eq!(response.data()["products"][0]["quantity"], 1);
}

#[tokio::test]
async fn test_adjust_rejects_bad_input() {
    let app = TestApp::new();
    let gourd = app.product("Gourd", Decimal::new(10000, 2), 5, SELLER).await;
    let token = app.customer("bea@estore.test", "Bea").await;
    let cart = app.create_cart(&token).await;

    let unknown_op = app.adjust(&token, cart, gourd, "multiply").await;
    assert_eq!(unknown_op.status, StatusCode::BAD_REQUEST);

    let missing_op = app
        .request(
            Method::POST,
            &format!("/carts/{cart}/product/{gourd}"),
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(missing_op.status, StatusCode::BAD_REQUEST);

    let bad_id = app
        .request(
            Method::POST,
            &format!("/carts/abc/product/{gourd}"),
            Some(&token),
            Some(json!({ "op": "add" })),
        )
        .await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_cart_or_product_is_not_found() {
    let app = TestApp::new();
    let gourd = app.product("Gourd", Decimal::new(10000, 2), 5, SELLER).await;
    let token = app.customer("bea@estore.test", "Bea").await;
    let cart = app.create_cart(&token).await;

    let no_cart = app
        .request(
            Method::POST,
            &format!("/carts/9999/product/{gourd}"),
            Some(&token),
            Some(json!({ "op": "add" })),
        )
        .await;
    assert_eq!(no_cart.status, StatusCode::NOT_FOUND);

    let no_product = app
        .request(
            Method::POST,
            &format!("/carts/{cart}/product/9999"),
            Some(&token),
            Some(json!({ "op": "add" })),
        )
        .await;
    assert_eq!(no_product.status, StatusCode::NOT_FOUND);

    let show = app
        .request(Method::GET, "/carts/9999", Some(&token), None)
        .await;
    assert_eq!(show.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_line_and_empty() {
    let app = TestApp::new();
    let gourd = app.product("Gourd", Decimal::new(10000, 2), 5, SELLER).await;
    let straw = app.product("Bombilla", Decimal::new(2500, 2), 5, SELLER).await;
    let token = app.customer("bea@estore.test", "Bea").await;
    let cart = app.create_cart(&token).await;
    app.adjust(&token, cart, gourd, "add").await;
    app.adjust(&token, cart, straw, "add").await;

    let removed = app
        .request(
            Method::DELETE,
            &format!("/carts/{cart}/product/{gourd}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.data()["products"], json!([{ "productId": straw, "quantity": 1 }]));

    // Removing an absent product is a no-op.
    let again = app
        .request(
            Method::DELETE,
            &format!("/carts/{cart}/product/{gourd}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(again.status, StatusCode::OK);

    let emptied = app
        .request(Method::DELETE, &format!("/carts/{cart}"), Some(&token), None)
        .await;
    assert_eq!(emptied.status, StatusCode::OK);
    assert_eq!(emptied.data()["products"], json!([]));
}

#[tokio::test]
async fn test_populated_cart_embeds_products() {
    let app = TestApp::new();
    let gourd = app.product("Gourd", Decimal::new(10000, 2), 5, SELLER).await;
    let token = app.customer("bea@estore.test", "Bea").await;
    let cart = app.create_cart(&token).await;
    app.adjust(&token, cart, gourd, "add").await;

    let populated = app
        .request(
            Method::GET,
            &format!("/carts/populated/{cart}"),
            Some(&token),
            None,
        )
        .await;

    assert_eq!(populated.status, StatusCode::OK);
    let line = &populated.data()["products"][0];
    assert_eq!(line["quantity"], 1);
    assert_eq!(line["product"]["title"], "Gourd");
    assert_eq!(line["product"]["price"], "100.00");
}

#[tokio::test]
async fn test_list_carts_and_attach_to_user() {
    let app = TestApp::new();
    let token = app.customer("bea@estore.test", "Bea").await;
    let first = app.create_cart(&token).await;
    let second = app.create_cart(&token).await;

    let listed = app.request(Method::GET, "/carts", Some(&token), None).await;
    assert_eq!(listed.data().as_array().unwrap().len(), 2);

    for cart in [first, second, first] {
        let attached = app
            .request(
                Method::PUT,
                "/users/cart",
                Some(&token),
                Some(json!({ "cartId": cart })),
            )
            .await;
        assert_eq!(attached.status, StatusCode::OK);
    }

    let attached = app
        .request(
            Method::PUT,
            "/users/cart",
            Some(&token),
            Some(json!({ "cartId": first })),
        )
        .await;
    assert_eq!(attached.data()["carts"], json!([first, second]));

    let missing = app
        .request(
            Method::PUT,
            "/users/cart",
            Some(&token),
            Some(json!({ "cartId": 9999 })),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_cannot_be_attached_to_two_users() {
    let app = TestApp::new();
    let bea = app.customer("bea@estore.test", "Bea").await;
    let cal = app.customer("cal@estore.test", "Cal").await;
    let cart = app.create_cart(&bea).await;

    let first = app
        .request(
            Method::PUT,
            "/users/cart",
            Some(&bea),
            Some(json!({ "cartId": cart })),
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let second = app
        .request(
            Method::PUT,
            "/users/cart",
            Some(&cal),
            Some(json!({ "cartId": cart })),
        )
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    let again = app
        .request(
            Method::PUT,
            "/users/cart",
            Some(&bea),
            Some(json!({ "cartId": cart })),
        )
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.data()["carts"], json!([cart]));
}

#[tokio::test]
async fn test_missing_cart_reported_before_ownership() {
    let app = TestApp::new();
    let gourd = app.product("Gourd", Decimal::new(10000, 2), 5, SELLER).await;
    let seller = app.customer(SELLER, "Sam").await;

    let response = app.adjust(&seller, 9999, gourd, "add").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
