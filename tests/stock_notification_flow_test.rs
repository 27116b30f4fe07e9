//! Tests for stock-notification subscriptions and the restock trigger:
//! at-most-once dispatch per subscription per restock, plus the low-stock
//! admin alert.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use commerce_api::entities::{app_notification, stock_notification};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

async fn seed_product_with_stock(app: &TestApp, stock: i32) -> Uuid {
    app.state
        .services
        .products
        .create_product(commerce_api::services::products::CreateProductRequest {
            name: "Red Cherry Shrimp".to_string(),
            description: "test product".to_string(),
            price: dec!(4.50),
            compare_at_price: None,
            category_id: None,
            tags: String::new(),
            rating: dec!(0),
            is_new: false,
            is_sale: false,
            is_featured: false,
            is_trending: false,
            stock,
            is_active: true,
            image_url: None,
        })
        .await
        .expect("seed product")
        .id
}

async fn restock_notification_count(app: &TestApp) -> u64 {
    app_notification::Entity::find()
        .filter(app_notification::Column::NotificationType.eq("stock_notification"))
        .count(&*app.state.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn subscription_is_unique_per_user_and_product() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("alice", false).await;
    let product_id = seed_product_with_stock(&app, 0).await;

    let first = app
        .request(
            Method::POST,
            "/api/v1/stock-notifications",
            Some(json!({ "product_id": product_id })),
            Some(&token),
        )
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/stock-notifications",
            Some(json!({ "product_id": product_id })),
            Some(&token),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let unknown = app
        .request(
            Method::POST,
            "/api/v1/stock-notifications",
            Some(json!({ "product_id": Uuid::new_v4() })),
            Some(&token),
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restock_notifies_each_subscriber_exactly_once() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.seed_user("alice", false).await;
    let (bob, bob_token) = app.seed_user("bob", false).await;
    let (_admin, admin_token) = app.seed_user("root", true).await;
    let product_id = seed_product_with_stock(&app, 0).await;

    for token in [&alice_token, &bob_token] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/stock-notifications",
                Some(json!({ "product_id": product_id })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // Stock goes 0 -> 25: both subscribers hear about it once
    let restock = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}", product_id),
            Some(json!({ "stock": 25 })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(restock.status(), StatusCode::OK);

    assert_eq!(restock_notification_count(&app).await, 2);
    for user_id in [alice.id, bob.id] {
        let count = app_notification::Entity::find()
            .filter(app_notification::Column::NotificationType.eq("stock_notification"))
            .filter(app_notification::Column::UserId.eq(user_id))
            .count(&*app.state.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    // Every subscription was consumed
    let pending = stock_notification::Entity::find()
        .filter(stock_notification::Column::IsNotified.eq(false))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(pending, 0);

    // A save that does not change stock dispatches nothing new
    let rename = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}", product_id),
            Some(json!({ "name": "Renamed Shrimp" })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(rename.status(), StatusCode::OK);
    assert_eq!(restock_notification_count(&app).await, 2);

    // Another restock cycle does not re-notify consumed subscriptions
    for stock in [0, 40] {
        let response = app
            .request(
                Method::PUT,
                &format!("/api/v1/products/{}", product_id),
                Some(json!({ "stock": stock })),
                Some(&admin_token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(restock_notification_count(&app).await, 2);
}

#[tokio::test]
async fn low_stock_change_alerts_the_admin_channel() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("root", true).await;
    let product_id = seed_product_with_stock(&app, 20).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}", product_id),
            Some(json!({ "stock": 2 })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let alerts = app_notification::Entity::find()
        .filter(app_notification::Column::NotificationType.eq("low_stock"))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].user_id.is_none());
}

#[tokio::test]
async fn product_writes_require_admin() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("alice", false).await;
    let product_id = seed_product_with_stock(&app, 0).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}", product_id),
            Some(json!({ "stock": 10 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listing_shows_caller_subscriptions_only() {
    let app = TestApp::new().await;
    let (_alice, alice_token) = app.seed_user("alice", false).await;
    let (_bob, bob_token) = app.seed_user("bob", false).await;
    let product_id = seed_product_with_stock(&app, 0).await;

    let subscribe = app
        .request(
            Method::POST,
            "/api/v1/stock-notifications",
            Some(json!({ "product_id": product_id })),
            Some(&alice_token),
        )
        .await;
    assert_eq!(subscribe.status(), StatusCode::CREATED);

    let alice_list = app
        .request(Method::GET, "/api/v1/stock-notifications", None, Some(&alice_token))
        .await;
    let alice_body = common::response_json(alice_list).await;
    assert_eq!(alice_body.as_array().unwrap().len(), 1);

    let bob_list = app
        .request(Method::GET, "/api/v1/stock-notifications", None, Some(&bob_token))
        .await;
    let bob_body = common::response_json(bob_list).await;
    assert_eq!(bob_body.as_array().unwrap().len(), 0);
}
