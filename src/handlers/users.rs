use axum::{extract::State, response::Response, Json};

use crate::{
    auth::AuthUser, errors::ServiceError, handlers::common::success_response,
    services::users::AdminGrantRequest, AppState,
};

// POST /api/v1/users/make-admin
#[utoipa::path(
    post,
    path = "/api/v1/users/make-admin",
    request_body = AdminGrantRequest,
    responses(
        (status = 200, description = "Admin rights granted", body = crate::services::users::UserResponse),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown user", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn make_admin(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<AdminGrantRequest>,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    let user = state
        .services
        .users
        .grant_admin(&auth_user, payload.user_id)
        .await?;
    Ok(success_response(user))
}

// POST /api/v1/users/revoke-admin
#[utoipa::path(
    post,
    path = "/api/v1/users/revoke-admin",
    request_body = AdminGrantRequest,
    responses(
        (status = 200, description = "Admin rights revoked", body = crate::services::users::UserResponse),
        (status = 403, description = "Admin only, or self-demotion", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown user", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn revoke_admin(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<AdminGrantRequest>,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    let user = state
        .services
        .users
        .revoke_admin(&auth_user, payload.user_id)
        .await?;
    Ok(success_response(user))
}
