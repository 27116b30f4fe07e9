use crate::{
    db::DbPool,
    entities::category::{self, slugify, Entity as CategoryEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::{is_unique_violation, ServiceError},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    /// Derived from the name when omitted
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Category catalog with unique names and SEO-friendly slugs.
#[derive(Clone)]
pub struct CategoryService {
    db_pool: Arc<DbPool>,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request))]
    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        request.validate()?;

        let slug = match request.slug {
            Some(slug) if !slug.trim().is_empty() => slug.trim().to_lowercase(),
            _ => slugify(&request.name),
        };
        if slug.is_empty() {
            return Err(ServiceError::ValidationError(
                "Could not derive a slug from the category name".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let clash = CategoryEntity::find()
            .filter(
                Condition::any()
                    .add(category::Column::Name.eq(request.name.clone()))
                    .add(category::Column::Slug.eq(slug.clone())),
            )
            .one(db)
            .await?;
        if clash.is_some() {
            return Err(ServiceError::Conflict(
                "A category with this name or slug already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            slug: Set(slug),
            description: Set(request.description),
            image_url: Set(request.image_url),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(
                    "A category with this name or slug already exists".to_string(),
                )
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(category_id = %model.id, slug = %model.slug, "Category created");
        Ok(model)
    }

    #[instrument(skip(self, request), fields(category_id = %category_id))]
    pub async fn update_category(
        &self,
        category_id: Uuid,
        request: UpdateCategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        let db = &*self.db_pool;
        let existing = self.find(category_id).await?;

        let mut active: category::ActiveModel = existing.into();
        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Name cannot be empty".to_string(),
                ));
            }
            active.name = Set(name);
        }
        if let Some(slug) = request.slug {
            let slug = slug.trim().to_lowercase();
            if slug.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Slug cannot be empty".to_string(),
                ));
            }
            active.slug = Set(slug);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(image_url) = request.image_url {
            active.image_url = Set(Some(image_url));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(
                    "A category with this name or slug already exists".to_string(),
                )
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;
        Ok(updated)
    }

    pub async fn get_category(&self, category_id: Uuid) -> Result<category::Model, ServiceError> {
        self.find(category_id).await
    }

    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        let categories = CategoryEntity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(categories)
    }

    /// Deletes a category; products keep existing without one.
    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        self.find(category_id).await?;

        let txn = db.begin().await?;
        ProductEntity::update_many()
            .col_expr(product::Column::CategoryId, Expr::value(Option::<Uuid>::None))
            .filter(product::Column::CategoryId.eq(category_id))
            .exec(&txn)
            .await?;
        CategoryEntity::delete_by_id(category_id).exec(&txn).await?;
        txn.commit().await?;

        info!(category_id = %category_id, "Category deleted");
        Ok(())
    }

    async fn find(&self, category_id: Uuid) -> Result<category::Model, ServiceError> {
        CategoryEntity::find_by_id(category_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }
}
