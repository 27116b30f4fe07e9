use crate::{
    db::DbPool,
    entities::app_notification::NotificationType,
    entities::category::{self, Entity as CategoryEntity},
    entities::product::{self, Entity as ProductEntity},
    entities::stock_notification::{self, Entity as StockNotificationEntity},
    errors::ServiceError,
    services::notifications::NotificationService,
    services::stock_notifications::StockNotificationService,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Stock level below which the admin channel gets a low-stock alert
const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub rating: Decimal,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_sale: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_trending: bool,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Patch structure: only supplied fields change.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub tags: Option<String>,
    pub rating: Option<Decimal>,
    pub is_new: Option<bool>,
    pub is_sale: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_trending: Option<bool>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    /// Filter by category slug
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub trending: Option<bool>,
    pub new: Option<bool>,
    pub sale: Option<bool>,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub rating: Decimal,
    pub is_new: bool,
    pub is_sale: bool,
    pub is_featured: bool,
    pub is_trending: bool,
    pub stock: i32,
    pub is_active: bool,
    pub is_in_stock: bool,
    pub discount_percentage: u32,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        let discount_percentage = match model.compare_at_price {
            Some(compare) if compare > model.price && compare > Decimal::ZERO => {
                let ratio = (compare - model.price) / compare * Decimal::from(100);
                ratio.round().to_u32().unwrap_or(0)
            }
            _ => 0,
        };

        Self {
            id: model.id,
            is_in_stock: model.is_in_stock(),
            tags: model.tags_list(),
            discount_percentage,
            name: model.name,
            description: model.description,
            price: model.price,
            compare_at_price: model.compare_at_price,
            category_id: model.category_id,
            rating: model.rating,
            is_new: model.is_new,
            is_sale: model.is_sale,
            is_featured: model.is_featured,
            is_trending: model.is_trending,
            stock: model.stock,
            is_active: model.is_active,
            image_url: model.image_url,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Catalog store. Stock updates drive the restock trigger and the
/// low-stock admin alert.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    notifications: Arc<NotificationService>,
    stock_notifications: Arc<StockNotificationService>,
}

impl ProductService {
    pub fn new(
        db_pool: Arc<DbPool>,
        notifications: Arc<NotificationService>,
        stock_notifications: Arc<StockNotificationService>,
    ) -> Self {
        Self {
            db_pool,
            notifications,
            stock_notifications,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;

        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        if request.stock < 0 {
            return Err(ServiceError::ValidationError(
                "Stock cannot be negative".to_string(),
            ));
        }
        if let Some(category_id) = request.category_id {
            CategoryEntity::find_by_id(category_id)
                .one(&*self.db_pool)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("Unknown category {}", category_id))
                })?;
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            price: Set(request.price),
            compare_at_price: Set(request.compare_at_price),
            category_id: Set(request.category_id),
            tags: Set(request.tags),
            rating: Set(request.rating),
            is_new: Set(request.is_new),
            is_sale: Set(request.is_sale),
            is_featured: Set(request.is_featured),
            is_trending: Set(request.is_trending),
            stock: Set(request.stock),
            is_active: Set(request.is_active),
            image_url: Set(request.image_url),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(product_id = %model.id, "Product created");
        Ok(model.into())
    }

    /// Applies a partial update. A stock transition to a positive value
    /// releases pending restock subscriptions exactly once each; a save
    /// that leaves stock unchanged dispatches nothing.
    #[instrument(skip(self, request), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        let db = &*self.db_pool;
        let existing = ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let old_stock = existing.stock;

        if let Some(price) = request.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price cannot be negative".to_string(),
                ));
            }
        }
        if let Some(stock) = request.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock cannot be negative".to_string(),
                ));
            }
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(compare_at_price) = request.compare_at_price {
            active.compare_at_price = Set(Some(compare_at_price));
        }
        if let Some(category_id) = request.category_id {
            CategoryEntity::find_by_id(category_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("Unknown category {}", category_id))
                })?;
            active.category_id = Set(Some(category_id));
        }
        if let Some(tags) = request.tags {
            active.tags = Set(tags);
        }
        if let Some(rating) = request.rating {
            active.rating = Set(rating);
        }
        if let Some(is_new) = request.is_new {
            active.is_new = Set(is_new);
        }
        if let Some(is_sale) = request.is_sale {
            active.is_sale = Set(is_sale);
        }
        if let Some(is_featured) = request.is_featured {
            active.is_featured = Set(is_featured);
        }
        if let Some(is_trending) = request.is_trending {
            active.is_trending = Set(is_trending);
        }
        if let Some(stock) = request.stock {
            active.stock = Set(stock);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(image_url) = request.image_url {
            active.image_url = Set(Some(image_url));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;

        if updated.stock != old_stock {
            if updated.stock > 0 {
                self.stock_notifications.dispatch_restock(&updated).await?;
            }
            if updated.stock < LOW_STOCK_THRESHOLD {
                self.notifications
                    .notify(
                        NotificationType::LowStock,
                        "Low Stock Alert",
                        &format!(
                            "Product '{}' is running low on stock ({} left).",
                            updated.name, updated.stock
                        ),
                        json!({
                            "product_id": updated.id,
                            "product_name": updated.name,
                            "stock": updated.stock,
                        }),
                        None,
                    )
                    .await;
            }
        }

        Ok(updated.into())
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductResponse, ServiceError> {
        let product = ProductEntity::find_by_id(product_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        Ok(product.into())
    }

    #[instrument(skip(self, query))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
    ) -> Result<ProductListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut find = ProductEntity::find().order_by_desc(product::Column::CreatedAt);

        if let Some(slug) = &query.category {
            let category = CategoryEntity::find()
                .filter(category::Column::Slug.eq(slug.to_lowercase()))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Category '{}' not found", slug)))?;
            find = find.filter(product::Column::CategoryId.eq(category.id));
        }
        if let Some(featured) = query.featured {
            find = find.filter(product::Column::IsFeatured.eq(featured));
        }
        if let Some(trending) = query.trending {
            find = find.filter(product::Column::IsTrending.eq(trending));
        }
        if let Some(new) = query.new {
            find = find.filter(product::Column::IsNew.eq(new));
        }
        if let Some(sale) = query.sale {
            find = find.filter(product::Column::IsSale.eq(sale));
        }

        let paginator = find.paginate(db, query.per_page.max(1));
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(query.page.saturating_sub(1)).await?;

        Ok(ProductListResponse {
            products: products.into_iter().map(Into::into).collect(),
            total,
            page: query.page,
            per_page: query.per_page,
        })
    }

    /// Removes a product and its stock subscriptions. Historical order
    /// items keep their snapshot rows.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let product = ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let txn = db.begin().await?;
        StockNotificationEntity::delete_many()
            .filter(stock_notification::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        ProductEntity::delete_by_id(product.id).exec(&txn).await?;
        txn.commit().await?;

        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }
}
