use axum::{extract::State, response::Response, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub product_id: Uuid,
}

// POST /api/v1/stock-notifications
#[utoipa::path(
    post,
    path = "/api/v1/stock-notifications",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscribed to restock alerts"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already subscribed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "StockNotifications"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<SubscribeRequest>,
) -> Result<Response, ServiceError> {
    let subscription = state
        .services
        .stock_notifications
        .subscribe(&auth_user, payload.product_id)
        .await?;
    Ok(created_response(subscription))
}

// GET /api/v1/stock-notifications
#[utoipa::path(
    get,
    path = "/api/v1/stock-notifications",
    responses((status = 200, description = "Caller's subscriptions")),
    security(("bearer_auth" = [])),
    tag = "StockNotifications"
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Response, ServiceError> {
    let subscriptions = state
        .services
        .stock_notifications
        .list_subscriptions(&auth_user)
        .await?;
    Ok(success_response(subscriptions))
}
