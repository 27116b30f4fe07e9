use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, success_response},
    services::shipping_addresses::{CreateAddressRequest, UpdateAddressRequest},
    AppState,
};

// GET /api/v1/addresses
#[utoipa::path(
    get,
    path = "/api/v1/addresses",
    responses((status = 200, description = "Caller's addresses, default first")),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Response, ServiceError> {
    let addresses = state.services.addresses.list_addresses(&auth_user).await?;
    Ok(success_response(addresses))
}

// POST /api/v1/addresses
#[utoipa::path(
    post,
    path = "/api/v1/addresses",
    request_body = CreateAddressRequest,
    responses(
        (status = 201, description = "Address created"),
        (status = 400, description = "Validation failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<Response, ServiceError> {
    let address = state
        .services
        .addresses
        .create_address(&auth_user, payload)
        .await?;
    Ok(created_response(address))
}

// GET /api/v1/addresses/:id
#[utoipa::path(
    get,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 200, description = "Address detail"),
        (status = 404, description = "Unknown or foreign address", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn get_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let address = state.services.addresses.get_address(&auth_user, id).await?;
    Ok(success_response(address))
}

// PUT /api/v1/addresses/:id
#[utoipa::path(
    put,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address id")),
    request_body = UpdateAddressRequest,
    responses(
        (status = 200, description = "Address updated"),
        (status = 404, description = "Unknown or foreign address", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn update_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> Result<Response, ServiceError> {
    let address = state
        .services
        .addresses
        .update_address(&auth_user, id, payload)
        .await?;
    Ok(success_response(address))
}

// DELETE /api/v1/addresses/:id
#[utoipa::path(
    delete,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "Unknown or foreign address", body = crate::errors::ErrorResponse),
        (status = 409, description = "Address referenced by orders", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state
        .services
        .addresses
        .delete_address(&auth_user, id)
        .await?;
    Ok(no_content_response())
}
