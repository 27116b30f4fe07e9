//! Tests for the single-default shipping address invariant and the
//! restrict-delete rule for addresses referenced by orders.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use commerce_api::entities::shipping_address;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};

fn address_payload(line1: &str, is_default: bool) -> Value {
    json!({
        "address_line_1": line1,
        "city": "Chennai",
        "state": "TN",
        "zip_code": "600001",
        "country": "India",
        "is_default": is_default
    })
}

async fn default_count(app: &TestApp) -> u64 {
    shipping_address::Entity::find()
        .filter(shipping_address::Column::IsDefault.eq(true))
        .count(&*app.state.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn saving_a_new_default_unsets_the_previous_one() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("alice", false).await;

    let first = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            Some(address_payload("1 First Street", true)),
            Some(&token),
        )
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_id = response_json(first).await["id"].as_str().unwrap().to_string();

    let second = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            Some(address_payload("2 Second Street", true)),
            Some(&token),
        )
        .await;
    assert_eq!(second.status(), StatusCode::CREATED);
    let body = response_json(second).await;
    assert_eq!(body["is_default"], true);

    // Exactly one default afterwards, and it is the second address
    assert_eq!(default_count(&app).await, 1);
    let first_row = shipping_address::Entity::find_by_id(
        first_id.parse::<uuid::Uuid>().unwrap(),
    )
    .one(&*app.state.db)
    .await
    .unwrap()
    .unwrap();
    assert!(!first_row.is_default);
}

#[tokio::test]
async fn updating_an_address_to_default_flips_the_flag_atomically() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("bob", false).await;

    let a = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            Some(address_payload("1 First Street", true)),
            Some(&token),
        )
        .await;
    let a_id = response_json(a).await["id"].as_str().unwrap().to_string();

    let b = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            Some(address_payload("2 Second Street", false)),
            Some(&token),
        )
        .await;
    let b_id = response_json(b).await["id"].as_str().unwrap().to_string();

    let promoted = app
        .request(
            Method::PUT,
            &format!("/api/v1/addresses/{}", b_id),
            Some(json!({ "is_default": true })),
            Some(&token),
        )
        .await;
    assert_eq!(promoted.status(), StatusCode::OK);
    assert_eq!(response_json(promoted).await["is_default"], true);

    assert_eq!(default_count(&app).await, 1);
    let a_row = shipping_address::Entity::find_by_id(a_id.parse::<uuid::Uuid>().unwrap())
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!a_row.is_default);
}

#[tokio::test]
async fn defaults_are_scoped_per_user() {
    let app = TestApp::new().await;
    let (_alice, alice_token) = app.seed_user("alice", false).await;
    let (_bob, bob_token) = app.seed_user("bob", false).await;

    for token in [&alice_token, &bob_token] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/addresses",
                Some(address_payload("1 Shared Street", true)),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // One default per user, two in total
    assert_eq!(default_count(&app).await, 2);
}

#[tokio::test]
async fn address_referenced_by_an_order_cannot_be_deleted() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("carol", false).await;

    let product = app
        .state
        .services
        .products
        .create_product(commerce_api::services::products::CreateProductRequest {
            name: "Filter Sock".to_string(),
            description: "test product".to_string(),
            price: dec!(12.00),
            compare_at_price: None,
            category_id: None,
            tags: String::new(),
            rating: dec!(0),
            is_new: false,
            is_sale: false,
            is_featured: false,
            is_trending: false,
            stock: 50,
            is_active: true,
            image_url: None,
        })
        .await
        .unwrap();

    let created = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            Some(address_payload("1 Order Street", false)),
            Some(&token),
        )
        .await;
    let address_id = response_json(created).await["id"].as_str().unwrap().to_string();

    let order = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "items": [{ "product_id": product.id, "quantity": 1, "price": "12.00" }],
                "shipping_address_id": address_id
            })),
            Some(&token),
        )
        .await;
    assert_eq!(order.status(), StatusCode::CREATED);

    let uri = format!("/api/v1/addresses/{}", address_id);
    let blocked = app.request(Method::DELETE, &uri, None, Some(&token)).await;
    assert_eq!(blocked.status(), StatusCode::CONFLICT);

    // Still present
    let remaining = shipping_address::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn unreferenced_address_deletes_cleanly() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("dave", false).await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            Some(address_payload("9 Unused Street", false)),
            Some(&token),
        )
        .await;
    let address_id = response_json(created).await["id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/addresses/{}", address_id);
    let deleted = app.request(Method::DELETE, &uri, None, Some(&token)).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        shipping_address::Entity::find()
            .count(&*app.state.db)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn addresses_are_private_to_their_owner() {
    let app = TestApp::new().await;
    let (_alice, alice_token) = app.seed_user("alice", false).await;
    let (_bob, bob_token) = app.seed_user("bob", false).await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            Some(address_payload("7 Private Street", false)),
            Some(&alice_token),
        )
        .await;
    let address_id = response_json(created).await["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/addresses/{}", address_id);

    let foreign_get = app.request(Method::GET, &uri, None, Some(&bob_token)).await;
    assert_eq!(foreign_get.status(), StatusCode::NOT_FOUND);

    let foreign_delete = app
        .request(Method::DELETE, &uri, None, Some(&bob_token))
        .await;
    assert_eq!(foreign_delete.status(), StatusCode::NOT_FOUND);
}
