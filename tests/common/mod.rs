#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use commerce_api::{
    auth::AuthUser,
    config::AppConfig,
    db::{self, DbConfig},
    entities::user,
    AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_MERCHANT_KEY: &str = "testkey";
pub const TEST_MERCHANT_SALT: &str = "testsalt";

/// Helper harness for spinning up an application backed by an in-memory
/// SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.gateway.merchant_key = TEST_MERCHANT_KEY.to_string();
        cfg.gateway.merchant_salt = TEST_MERCHANT_SALT.to_string();

        // A single connection keeps the in-memory database alive for the
        // lifetime of the pool.
        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("in-memory sqlite pool");
        db::run_migrations(&pool).await.expect("migrations");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = commerce_api::build_router(state.clone());

        Self { router, state }
    }

    /// Inserts a user row directly and returns it with a bearer token.
    pub async fn seed_user(&self, username: &str, is_admin: bool) -> (user::Model, String) {
        let password_hash = self
            .state
            .auth
            .hash_password("correct-horse-battery")
            .expect("password hash");

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(format!("{}@example.com", username)),
            password_hash: Set(password_hash),
            first_name: Set(Some("Jane".to_string())),
            last_name: Set(Some("Doe".to_string())),
            phone: Set(None),
            is_admin: Set(is_admin),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user");

        let token = self
            .state
            .auth
            .generate_token(&model)
            .expect("token")
            .access_token;

        (model, token)
    }

    pub fn auth_user_for(model: &user::Model) -> AuthUser {
        let mut roles = vec!["customer".to_string()];
        if model.is_admin {
            roles.push("admin".to_string());
        }
        AuthUser {
            id: model.id,
            username: model.username.clone(),
            email: model.email.clone(),
            name: Some(model.full_name()),
            roles,
        }
    }

    /// Sends a JSON request, optionally authenticated.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Sends a form-encoded request the way the payment gateway does.
    pub async fn form_request(&self, uri: &str, params: &[(&str, &str)]) -> Response<Body> {
        let body = params
            .iter()
            .map(|(k, v)| format!("{}={}", form_encode(k), form_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request");

        self.router.clone().oneshot(request).await.expect("response")
    }
}

/// Minimal percent-encoding for form bodies built by hand in tests.
fn form_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push_str("%20"),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

#[allow(dead_code)]
pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
