use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::app_notification::NotificationType,
    entities::product::{self, Entity as ProductEntity},
    entities::stock_notification::{self, Entity as StockNotificationEntity},
    errors::{is_unique_violation, ServiceError},
    services::notifications::NotificationService,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Back-in-stock subscriptions and the restock dispatch they feed.
#[derive(Clone)]
pub struct StockNotificationService {
    db_pool: Arc<DbPool>,
    notifications: Arc<NotificationService>,
}

impl StockNotificationService {
    pub fn new(db_pool: Arc<DbPool>, notifications: Arc<NotificationService>) -> Self {
        Self {
            db_pool,
            notifications,
        }
    }

    /// Subscribes the caller to restock alerts for a product. One
    /// subscription per (user, product).
    #[instrument(skip(self), fields(user_id = %user.id, product_id = %product_id))]
    pub async fn subscribe(
        &self,
        user: &AuthUser,
        product_id: Uuid,
    ) -> Result<stock_notification::Model, ServiceError> {
        let db = &*self.db_pool;

        ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = StockNotificationEntity::find()
            .filter(stock_notification::Column::UserId.eq(user.id))
            .filter(stock_notification::Column::ProductId.eq(product_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "Already subscribed to stock notifications for this product".to_string(),
            ));
        }

        let subscription = stock_notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            product_id: Set(product_id),
            is_notified: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(
                    "Already subscribed to stock notifications for this product".to_string(),
                )
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(subscription_id = %subscription.id, "Stock notification subscription created");
        Ok(subscription)
    }

    pub async fn list_subscriptions(
        &self,
        user: &AuthUser,
    ) -> Result<Vec<stock_notification::Model>, ServiceError> {
        let subscriptions = StockNotificationEntity::find()
            .filter(stock_notification::Column::UserId.eq(user.id))
            .order_by_desc(stock_notification::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(subscriptions)
    }

    /// Notifies every un-notified subscriber that a product is back in
    /// stock. Each subscription is marked notified before its alert goes
    /// out, so delivery is at most once per subscription per restock.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn dispatch_restock(&self, product: &product::Model) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;

        let subscriptions = StockNotificationEntity::find()
            .filter(stock_notification::Column::ProductId.eq(product.id))
            .filter(stock_notification::Column::IsNotified.eq(false))
            .all(db)
            .await?;

        let mut dispatched = 0u64;
        for subscription in subscriptions {
            let user_id = subscription.user_id;

            let mut active: stock_notification::ActiveModel = subscription.into();
            active.is_notified = Set(true);
            active.update(db).await?;

            self.notifications
                .notify(
                    NotificationType::StockNotification,
                    "Back in Stock",
                    &format!("The product '{}' is now available.", product.name),
                    json!({
                        "product_id": product.id,
                        "product_name": product.name,
                        "stock": product.stock,
                    }),
                    Some(user_id),
                )
                .await;
            dispatched += 1;
        }

        if dispatched > 0 {
            info!(count = dispatched, "Restock notifications dispatched");
        }
        Ok(dispatched)
    }
}
