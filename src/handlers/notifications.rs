use axum::{
    extract::{Path, State},
    response::Response,
};
use uuid::Uuid;

use crate::{auth::AuthUser, errors::ServiceError, handlers::common::success_response, AppState};

// GET /api/v1/notifications
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    responses((status = 200, description = "Caller's notifications; admins also see the admin channel")),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Response, ServiceError> {
    let notifications = state
        .services
        .notifications
        .list_for_user(auth_user.id, auth_user.is_admin())
        .await?;
    Ok(success_response(notifications))
}

// POST /api/v1/notifications/:id/read
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read"),
        (status = 404, description = "Unknown notification", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let notification = state
        .services
        .notifications
        .mark_read(auth_user.id, auth_user.is_admin(), id)
        .await?;
    Ok(success_response(notification))
}
