use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    entities::shipping_address::{self, Entity as ShippingAddressEntity},
    entities::app_notification::NotificationType,
    errors::ServiceError,
    services::notifications::NotificationService,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CreateOrderItem>,

    /// Flat shipping cost added on top of the item total
    #[serde(default)]
    pub shipping_cost: Decimal,

    /// Existing address owned by the caller
    pub shipping_address_id: Option<Uuid>,

    /// Inline address created for the caller when no id is supplied
    #[validate]
    pub shipping_address: Option<NewShippingAddress>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderItem {
    pub product_id: Uuid,

    pub quantity: i32,

    /// Unit price snapshot supplied by the caller (see DESIGN.md on the
    /// pricing trust boundary)
    pub price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewShippingAddress {
    #[serde(default)]
    #[validate(length(min = 1, message = "address_line_1 is required"))]
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "country is required"))]
    pub country: String,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shipping_address_id: Uuid,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub grand_total: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn build_response(order: order::Model, items: Vec<order_item::Model>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        user_id: order.user_id,
        shipping_address_id: order.shipping_address_id,
        items: items
            .into_iter()
            .map(|item| OrderItemResponse {
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
                total_price: item.total_price(),
            })
            .collect(),
        total_amount: order.total_amount,
        shipping_cost: order.shipping_cost,
        grand_total: order.grand_total(),
        status: order.status.clone(),
        created_at: order.created_at,
    }
}

/// Service building and querying orders.
///
/// Order creation is all-or-nothing: the order, its items, and any newly
/// created shipping address commit in a single transaction.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    notifications: Arc<NotificationService>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, notifications: Arc<NotificationService>) -> Self {
        Self {
            db_pool,
            notifications,
        }
    }

    /// Creates an order with a point-in-time price snapshot.
    #[instrument(skip(self, request), fields(user_id = %user.id))]
    pub async fn create_order(
        &self,
        user: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        if request.items.iter().any(|item| item.quantity < 1) {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        if request.shipping_cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Shipping cost cannot be negative".to_string(),
            ));
        }
        if request.items.iter().any(|item| item.price < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Item price cannot be negative".to_string(),
            ));
        }
        if request.shipping_address_id.is_none() && request.shipping_address.is_none() {
            return Err(ServiceError::ValidationError(
                "Either shipping_address_id or shipping_address is required".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        // Resolve the shipping address inside the transaction so a newly
        // created one rolls back together with the order.
        let shipping_address_id = match request.shipping_address_id {
            Some(address_id) => {
                let address = ShippingAddressEntity::find_by_id(address_id)
                    .filter(shipping_address::Column::UserId.eq(user.id))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Shipping address {} not found",
                            address_id
                        ))
                    })?;
                address.id
            }
            None => {
                // Presence checked above
                let inline = request.shipping_address.as_ref().ok_or_else(|| {
                    ServiceError::ValidationError("shipping_address is required".to_string())
                })?;

                if inline.is_default {
                    ShippingAddressEntity::update_many()
                        .col_expr(shipping_address::Column::IsDefault, Expr::value(false))
                        .filter(shipping_address::Column::UserId.eq(user.id))
                        .filter(shipping_address::Column::IsDefault.eq(true))
                        .exec(&txn)
                        .await?;
                }

                let address = shipping_address::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user.id),
                    address_line_1: Set(inline.address_line_1.clone()),
                    address_line_2: Set(inline.address_line_2.clone()),
                    city: Set(inline.city.clone()),
                    state: Set(inline.state.clone()),
                    zip_code: Set(inline.zip_code.clone()),
                    country: Set(inline.country.clone()),
                    recipient_name: Set(inline.recipient_name.clone()),
                    recipient_phone: Set(inline.recipient_phone.clone()),
                    is_default: Set(inline.is_default),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                };
                address.insert(&txn).await?.id
            }
        };

        // Every line item must reference a known product. The price stays
        // the caller-supplied snapshot.
        let product_ids: Vec<Uuid> = request.items.iter().map(|item| item.product_id).collect();
        let known: Vec<Uuid> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        if let Some(missing) = product_ids.iter().find(|id| !known.contains(id)) {
            return Err(ServiceError::ValidationError(format!(
                "Unknown product {}",
                missing
            )));
        }

        let total_amount: Decimal = request
            .items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum();

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user.id),
            shipping_address_id: Set(shipping_address_id),
            total_amount: Set(total_amount),
            shipping_cost: Set(request.shipping_cost),
            status: Set(OrderStatus::Pending.to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let stored = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                price: Set(item.price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            items.push(stored);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, user_id = %user.id, total = %total_amount, "Order created");

        // Post-commit side effects only; dispatch failures never unwind
        // the committed order.
        self.notifications
            .notify(
                NotificationType::OrderCreated,
                "Your order has been placed",
                &format!("Order #{} was successfully created.", order_id),
                json!({ "order_id": order_id }),
                Some(user.id),
            )
            .await;
        self.notifications
            .notify(
                NotificationType::OrderCreated,
                "New order created",
                &format!("User {} placed Order #{}", user.username, order_id),
                json!({ "order_id": order_id, "user_id": user.id }),
                None,
            )
            .await;

        Ok(build_response(order_model, items))
    }

    /// Retrieves an order visible to the caller. Admins see all orders,
    /// customers only their own.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        user: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.find_visible(user, order_id).await?;
        let items = self.items_for(order.id).await?;
        Ok(build_response(order, items))
    }

    /// Lists orders visible to the caller with pagination.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        user: &AuthUser,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if !user.is_admin() {
            query = query.filter(order::Column::UserId.eq(user.id));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.items_for(order.id).await?;
            responses.push(build_response(order, items));
        }

        Ok(OrderListResponse {
            orders: responses,
            total,
            page,
            per_page,
        })
    }

    /// Admin-only status override. Fires status-change notifications to
    /// the customer and the admin channel when the status actually moves.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let new_status = OrderStatus::from_str(request.status.trim().to_lowercase().as_str())
            .map_err(|_| {
                ServiceError::InvalidStatus(format!("Unknown order status: {}", request.status))
            })?;

        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status.clone();
        let customer_id = order.user_id;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;

        if old_status != updated.status {
            info!(order_id = %order_id, from = %old_status, to = %updated.status, "Order status changed");
            self.notifications
                .notify(
                    NotificationType::OrderStatusChange,
                    "Order Status Updated",
                    &format!(
                        "Your order #{} status changed to {}.",
                        order_id, updated.status
                    ),
                    json!({
                        "order_id": order_id,
                        "old_status": old_status,
                        "new_status": updated.status,
                    }),
                    Some(customer_id),
                )
                .await;
            self.notifications
                .notify(
                    NotificationType::OrderStatusChange,
                    "Order Status Changed",
                    &format!("Order #{} changed to {}.", order_id, updated.status),
                    json!({
                        "order_id": order_id,
                        "old_status": old_status,
                        "new_status": updated.status,
                        "user_id": customer_id,
                    }),
                    None,
                )
                .await;
        }

        let items = self.items_for(order_id).await?;
        Ok(build_response(updated, items))
    }

    async fn find_visible(
        &self,
        user: &AuthUser,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let mut query = OrderEntity::find_by_id(order_id);
        if !user.is_admin() {
            query = query.filter(order::Column::UserId.eq(user.id));
        }
        query
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn items_for(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(items)
    }
}
