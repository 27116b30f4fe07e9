use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::payments::{CallbackError, PaymentInitiationResponse},
    AppState,
};

// POST /api/v1/payments/initiate/:order_id
#[utoipa::path(
    post,
    path = "/api/v1/payments/initiate/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order to pay for")),
    responses(
        (status = 200, description = "Signed gateway redirect fields", body = PaymentInitiationResponse),
        (status = 404, description = "Unknown or foreign order", body = crate::errors::ErrorResponse),
        (status = 409, description = "Payment already initiated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PaymentInitiationResponse>, ServiceError> {
    let response = state
        .services
        .payments
        .initiate(&auth_user, order_id)
        .await?;
    Ok(Json(response))
}

// POST /api/v1/payments/webhook
//
// No bearer auth: the callback authenticates itself through the merchant
// salt signature. Replies are plain text for the gateway.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    responses(
        (status = 200, description = "Webhook processed"),
        (status = 400, description = "Invalid txnid"),
        (status = 403, description = "Hash mismatch"),
        (status = 409, description = "Divergent replay of a verified transaction")
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    match state.services.payments.process_callback(&params).await {
        Ok(()) => (StatusCode::OK, "Webhook processed").into_response(),
        Err(CallbackError::InvalidTxnid) => {
            (StatusCode::BAD_REQUEST, "Invalid txnid").into_response()
        }
        Err(CallbackError::HashMismatch) => {
            (StatusCode::FORBIDDEN, "Hash mismatch").into_response()
        }
        Err(CallbackError::StatusConflict(_)) => {
            (StatusCode::CONFLICT, "Transaction already verified").into_response()
        }
        Err(CallbackError::Database(e)) => {
            error!(error = %e, "Webhook reconciliation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
