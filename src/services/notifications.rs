use crate::db::DbPool;
use crate::entities::app_notification::{
    self, Entity as AppNotificationEntity, NotificationType,
};
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Notification sink used by the other services.
///
/// Dispatch is fire-and-forget: a failed insert is logged and swallowed so
/// it can never abort or roll back the operation that triggered it.
#[derive(Clone)]
pub struct NotificationService {
    db_pool: Arc<DbPool>,
}

impl NotificationService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Records a notification for a user, or for the admin channel when
    /// `user_id` is `None`.
    pub async fn notify(
        &self,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        data: serde_json::Value,
        user_id: Option<Uuid>,
    ) {
        let model = app_notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            notification_type: Set(notification_type.to_string()),
            user_id: Set(user_id),
            title: Set(title.to_string()),
            message: Set(message.to_string()),
            data: Set(Some(data)),
            is_read: Set(false),
            created_at: Set(Utc::now()),
        };

        match model.insert(&*self.db_pool).await {
            Ok(_) => {
                debug!(%notification_type, ?user_id, "Notification dispatched");
            }
            Err(e) => {
                warn!(error = %e, %notification_type, ?user_id, "Failed to dispatch notification");
            }
        }
    }

    /// Lists notifications visible to a user. Admins also see the global
    /// admin channel (null user).
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<Vec<app_notification::Model>, ServiceError> {
        let mut condition = Condition::any().add(app_notification::Column::UserId.eq(user_id));
        if is_admin {
            condition = condition.add(app_notification::Column::UserId.is_null());
        }

        let notifications = AppNotificationEntity::find()
            .filter(condition)
            .order_by_desc(app_notification::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;

        Ok(notifications)
    }

    /// Marks one of the caller's notifications as read.
    pub async fn mark_read(
        &self,
        user_id: Uuid,
        is_admin: bool,
        notification_id: Uuid,
    ) -> Result<app_notification::Model, ServiceError> {
        let notification = AppNotificationEntity::find_by_id(notification_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Notification {} not found", notification_id))
            })?;

        let visible = match notification.user_id {
            Some(owner) => owner == user_id,
            None => is_admin,
        };
        if !visible {
            return Err(ServiceError::NotFound(format!(
                "Notification {} not found",
                notification_id
            )));
        }

        let mut active: app_notification::ActiveModel = notification.into();
        active.is_read = Set(true);
        let updated = active.update(&*self.db_pool).await?;
        Ok(updated)
    }
}
