use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::order::{self, Entity as OrderEntity},
    entities::shipping_address::{self, Entity as ShippingAddressEntity},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAddressRequest {
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

/// Patch structure: only supplied fields change.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAddressRequest {
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub is_default: Option<bool>,
}

/// Manages a user's shipping addresses.
///
/// The single-default invariant is enforced transactionally: flipping one
/// address to default unsets every other default the user has in the same
/// unit of work.
#[derive(Clone)]
pub struct AddressService {
    db_pool: Arc<DbPool>,
}

impl AddressService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(user_id = %user.id))]
    pub async fn create_address(
        &self,
        user: &AuthUser,
        request: CreateAddressRequest,
    ) -> Result<shipping_address::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let txn = db.begin().await?;

        if request.is_default {
            Self::unset_defaults(&txn, user.id, None).await?;
        }

        let address = shipping_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            address_line_1: Set(request.address_line_1),
            address_line_2: Set(request.address_line_2),
            city: Set(request.city),
            state: Set(request.state),
            zip_code: Set(request.zip_code),
            country: Set(request.country),
            recipient_name: Set(request.recipient_name),
            recipient_phone: Set(request.recipient_phone),
            is_default: Set(request.is_default),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(address_id = %address.id, "Shipping address created");
        Ok(address)
    }

    #[instrument(skip(self, request), fields(user_id = %user.id, address_id = %address_id))]
    pub async fn update_address(
        &self,
        user: &AuthUser,
        address_id: Uuid,
        request: UpdateAddressRequest,
    ) -> Result<shipping_address::Model, ServiceError> {
        let db = &*self.db_pool;
        let address = self.find_owned(user, address_id).await?;

        let txn = db.begin().await?;

        if request.is_default == Some(true) {
            Self::unset_defaults(&txn, user.id, Some(address_id)).await?;
        }

        let mut active: shipping_address::ActiveModel = address.into();
        if let Some(line1) = request.address_line_1 {
            if line1.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "address_line_1 cannot be empty".to_string(),
                ));
            }
            active.address_line_1 = Set(line1);
        }
        if let Some(line2) = request.address_line_2 {
            active.address_line_2 = Set(Some(line2));
        }
        if let Some(city) = request.city {
            if city.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "city cannot be empty".to_string(),
                ));
            }
            active.city = Set(city);
        }
        if let Some(state) = request.state {
            active.state = Set(Some(state));
        }
        if let Some(zip_code) = request.zip_code {
            active.zip_code = Set(Some(zip_code));
        }
        if let Some(country) = request.country {
            if country.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "country cannot be empty".to_string(),
                ));
            }
            active.country = Set(country);
        }
        if let Some(recipient_name) = request.recipient_name {
            active.recipient_name = Set(Some(recipient_name));
        }
        if let Some(recipient_phone) = request.recipient_phone {
            active.recipient_phone = Set(Some(recipient_phone));
        }
        if let Some(is_default) = request.is_default {
            active.is_default = Set(is_default);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        Ok(updated)
    }

    /// Deletes an address unless an order still references it.
    #[instrument(skip(self), fields(user_id = %user.id, address_id = %address_id))]
    pub async fn delete_address(
        &self,
        user: &AuthUser,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let address = self.find_owned(user, address_id).await?;

        let referencing_orders = OrderEntity::find()
            .filter(order::Column::ShippingAddressId.eq(address_id))
            .count(db)
            .await?;
        if referencing_orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "Shipping address {} is referenced by {} order(s) and cannot be deleted",
                address_id, referencing_orders
            )));
        }

        address.delete(db).await?;
        info!(address_id = %address_id, "Shipping address deleted");
        Ok(())
    }

    pub async fn list_addresses(
        &self,
        user: &AuthUser,
    ) -> Result<Vec<shipping_address::Model>, ServiceError> {
        let addresses = ShippingAddressEntity::find()
            .filter(shipping_address::Column::UserId.eq(user.id))
            .order_by_desc(shipping_address::Column::IsDefault)
            .order_by_desc(shipping_address::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(addresses)
    }

    pub async fn get_address(
        &self,
        user: &AuthUser,
        address_id: Uuid,
    ) -> Result<shipping_address::Model, ServiceError> {
        self.find_owned(user, address_id).await
    }

    async fn find_owned(
        &self,
        user: &AuthUser,
        address_id: Uuid,
    ) -> Result<shipping_address::Model, ServiceError> {
        ShippingAddressEntity::find_by_id(address_id)
            .filter(shipping_address::Column::UserId.eq(user.id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipping address {} not found", address_id))
            })
    }

    async fn unset_defaults<C: sea_orm::ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut update = ShippingAddressEntity::update_many()
            .col_expr(shipping_address::Column::IsDefault, Expr::value(false))
            .filter(shipping_address::Column::UserId.eq(user_id))
            .filter(shipping_address::Column::IsDefault.eq(true));
        if let Some(except_id) = except {
            update = update.filter(shipping_address::Column::Id.ne(except_id));
        }
        update.exec(conn).await?;
        Ok(())
    }
}
