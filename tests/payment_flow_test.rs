//! End-to-end tests for the payment workflow: signed initiation, webhook
//! signature verification, reconciliation, and replay idempotency.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, response_text, TestApp, TEST_MERCHANT_KEY, TEST_MERCHANT_SALT};
use commerce_api::entities::{order, payment};
use commerce_api::services::payu;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};

struct Checkout {
    token: String,
    email: String,
    order_id: String,
}

/// Seeds a user, a product, and a pending order totalling 189.98.
async fn checkout(app: &TestApp, username: &str) -> Checkout {
    let (user, token) = app.seed_user(username, false).await;

    let product = app
        .state
        .services
        .products
        .create_product(commerce_api::services::products::CreateProductRequest {
            name: "Protein Skimmer".to_string(),
            description: "test product".to_string(),
            price: dec!(140.48),
            compare_at_price: None,
            category_id: None,
            tags: String::new(),
            rating: dec!(0),
            is_new: false,
            is_sale: false,
            is_featured: false,
            is_trending: false,
            stock: 10,
            is_active: true,
            image_url: None,
        })
        .await
        .expect("seed product");

    let payload = json!({
        "items": [{ "product_id": product.id, "quantity": 1, "price": "140.48" }],
        "shipping_cost": "49.50",
        "shipping_address": {
            "address_line_1": "12 Harbour Street",
            "city": "Chennai",
            "country": "India"
        }
    });
    let response = app
        .request(Method::POST, "/api/v1/orders", Some(payload), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order_id = response_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    Checkout {
        token,
        email: user.email,
        order_id,
    }
}

async fn initiate(app: &TestApp, checkout: &Checkout) -> Value {
    let uri = format!("/api/v1/payments/initiate/{}", checkout.order_id);
    let response = app
        .request(Method::POST, &uri, None, Some(&checkout.token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

fn signed_callback_params<'a>(
    initiation: &'a Value,
    status: &'a str,
    email: &'a str,
) -> Vec<(&'a str, String)> {
    let txnid = initiation["txnid"].as_str().unwrap();
    let amount = initiation["amount"].as_str().unwrap();
    let productinfo = initiation["productinfo"].as_str().unwrap();
    let firstname = initiation["firstname"].as_str().unwrap();

    let hash = payu::callback_hash(
        TEST_MERCHANT_SALT,
        status,
        email,
        firstname,
        productinfo,
        amount,
        txnid,
        TEST_MERCHANT_KEY,
    );

    vec![
        ("txnid", txnid.to_string()),
        ("status", status.to_string()),
        ("hash", hash),
        ("email", email.to_string()),
        ("firstname", firstname.to_string()),
        ("productinfo", productinfo.to_string()),
        ("amount", amount.to_string()),
    ]
}

async fn post_webhook(app: &TestApp, params: &[(&str, String)]) -> (StatusCode, String) {
    let borrowed: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let response = app
        .form_request("/api/v1/payments/webhook", &borrowed)
        .await;
    let status = response.status();
    let text = response_text(response).await;
    (status, text)
}

async fn payment_by_txnid(app: &TestApp, txnid: &str) -> payment::Model {
    payment::Entity::find()
        .filter(payment::Column::Txnid.eq(txnid))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("payment row")
}

async fn order_status(app: &TestApp, order_id: &str) -> String {
    order::Entity::find_by_id(order_id.parse::<uuid::Uuid>().unwrap())
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("order row")
        .status
}

#[tokio::test]
async fn initiation_returns_signed_gateway_fields() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    let initiation = initiate(&app, &checkout).await;

    assert_eq!(initiation["key"], TEST_MERCHANT_KEY);
    assert_eq!(initiation["amount"], "189.98");
    assert_eq!(
        initiation["productinfo"],
        format!("Order #{}", checkout.order_id)
    );
    assert_eq!(initiation["firstname"], "Jane");
    assert_eq!(initiation["email"], checkout.email);
    assert!(initiation["payu_url"].as_str().unwrap().starts_with("http"));

    let txnid = initiation["txnid"].as_str().unwrap();
    assert_eq!(txnid.len(), 20);

    // The returned hash must match the canonical field sequence
    let expected = payu::initiation_hash(
        TEST_MERCHANT_KEY,
        txnid,
        "189.98",
        initiation["productinfo"].as_str().unwrap(),
        "Jane",
        &checkout.email,
        TEST_MERCHANT_SALT,
    );
    assert_eq!(initiation["hash"], expected);

    let stored = payment_by_txnid(&app, txnid).await;
    assert_eq!(stored.status, "initiated");
    assert!(!stored.verified);
    assert_eq!(stored.amount, dec!(189.98));
}

#[tokio::test]
async fn second_initiation_for_same_order_conflicts() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    initiate(&app, &checkout).await;

    let uri = format!("/api/v1/payments/initiate/{}", checkout.order_id);
    let response = app
        .request(Method::POST, &uri, None, Some(&checkout.token))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn initiation_for_foreign_order_is_not_found() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    let (_mallory, mallory_token) = app.seed_user("mallory", false).await;

    let uri = format!("/api/v1/payments/initiate/{}", checkout.order_id);
    let response = app
        .request(Method::POST, &uri, None, Some(&mallory_token))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // No payment row was created for the rejected attempt
    let payments = payment::Entity::find().all(&*app.state.db).await.unwrap();
    assert!(payments.is_empty());
}

#[tokio::test]
async fn webhook_with_unknown_txnid_is_rejected() {
    let app = TestApp::new().await;
    let _ = checkout(&app, "payer").await;

    let params = vec![
        ("txnid", "ffffffffffffffffffff".to_string()),
        ("status", "success".to_string()),
        ("hash", "00".to_string()),
    ];
    let (status, text) = post_webhook(&app, &params).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Invalid txnid");
}

#[tokio::test]
async fn webhook_hash_mismatch_leaves_state_untouched() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    let initiation = initiate(&app, &checkout).await;
    let txnid = initiation["txnid"].as_str().unwrap().to_string();

    let mut params = signed_callback_params(&initiation, "success", &checkout.email);
    for (key, value) in params.iter_mut() {
        if *key == "hash" {
            *value = "deadbeef".repeat(16);
        }
    }

    let (status, text) = post_webhook(&app, &params).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(text, "Hash mismatch");

    let stored = payment_by_txnid(&app, &txnid).await;
    assert_eq!(stored.status, "initiated");
    assert!(!stored.verified);
    assert!(stored.gateway_response.is_none());
    assert_eq!(order_status(&app, &checkout.order_id).await, "pending");
}

#[tokio::test]
async fn verified_success_moves_order_to_processing() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    let initiation = initiate(&app, &checkout).await;
    let txnid = initiation["txnid"].as_str().unwrap().to_string();

    let params = signed_callback_params(&initiation, "success", &checkout.email);
    let (status, text) = post_webhook(&app, &params).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Webhook processed");

    let stored = payment_by_txnid(&app, &txnid).await;
    assert_eq!(stored.status, "success");
    assert!(stored.verified);
    // Raw payload is kept for audit
    let audit = stored.gateway_response.expect("gateway payload stored");
    assert_eq!(audit["status"], "success");
    assert_eq!(audit["txnid"], txnid);

    assert_eq!(order_status(&app, &checkout.order_id).await, "processing");
}

#[tokio::test]
async fn verified_failure_cancels_the_order() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    let initiation = initiate(&app, &checkout).await;

    let params = signed_callback_params(&initiation, "failure", &checkout.email);
    let (status, _) = post_webhook(&app, &params).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(order_status(&app, &checkout.order_id).await, "cancelled");
}

#[tokio::test]
async fn verified_pending_leaves_order_untouched() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    let initiation = initiate(&app, &checkout).await;
    let txnid = initiation["txnid"].as_str().unwrap().to_string();

    let params = signed_callback_params(&initiation, "pending", &checkout.email);
    let (status, _) = post_webhook(&app, &params).await;
    assert_eq!(status, StatusCode::OK);

    let stored = payment_by_txnid(&app, &txnid).await;
    assert_eq!(stored.status, "pending");
    assert!(stored.verified);
    assert_eq!(order_status(&app, &checkout.order_id).await, "pending");
}

#[tokio::test]
async fn identical_success_replay_is_idempotent() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    let initiation = initiate(&app, &checkout).await;
    let txnid = initiation["txnid"].as_str().unwrap().to_string();

    let params = signed_callback_params(&initiation, "success", &checkout.email);
    let (first, _) = post_webhook(&app, &params).await;
    assert_eq!(first, StatusCode::OK);

    let (second, text) = post_webhook(&app, &params).await;
    assert_eq!(second, StatusCode::OK);
    assert_eq!(text, "Webhook processed");

    let stored = payment_by_txnid(&app, &txnid).await;
    assert_eq!(stored.status, "success");
    assert!(stored.verified);
    assert_eq!(order_status(&app, &checkout.order_id).await, "processing");
}

#[tokio::test]
async fn divergent_replay_after_verification_is_rejected() {
    let app = TestApp::new().await;
    let checkout = checkout(&app, "payer").await;
    let initiation = initiate(&app, &checkout).await;
    let txnid = initiation["txnid"].as_str().unwrap().to_string();

    let success = signed_callback_params(&initiation, "success", &checkout.email);
    let (first, _) = post_webhook(&app, &success).await;
    assert_eq!(first, StatusCode::OK);

    // Same txnid, properly signed, but contradicting the applied outcome
    let failure = signed_callback_params(&initiation, "failure", &checkout.email);
    let (second, text) = post_webhook(&app, &failure).await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(text, "Transaction already verified");

    let stored = payment_by_txnid(&app, &txnid).await;
    assert_eq!(stored.status, "success");
    assert_eq!(order_status(&app, &checkout.order_id).await, "processing");
}
