use crate::{
    auth::{AuthService, AuthUser, TokenPair},
    db::DbPool,
    entities::app_notification::NotificationType,
    entities::user::{self, Entity as UserEntity},
    errors::{is_unique_violation, ServiceError},
    services::notifications::NotificationService,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminGrantRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            is_admin: model.is_admin,
            created_at: model.created_at,
        }
    }
}

/// Account registration, login, and admin role management.
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
    notifications: Arc<NotificationService>,
}

impl UserService {
    pub fn new(
        db_pool: Arc<DbPool>,
        auth: Arc<AuthService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            db_pool,
            auth,
            notifications,
        }
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let clash = UserEntity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(request.username.clone()))
                    .add(user::Column::Email.eq(request.email.clone())),
            )
            .one(db)
            .await?;
        if clash.is_some() {
            return Err(ServiceError::Conflict(
                "A user with this username or email already exists".to_string(),
            ));
        }

        let password_hash = self.auth.hash_password(&request.password)?;

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username),
            email: Set(request.email),
            password_hash: Set(password_hash),
            first_name: Set(request.first_name),
            last_name: Set(request.last_name),
            phone: Set(request.phone),
            is_admin: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(
                    "A user with this username or email already exists".to_string(),
                )
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(user_id = %model.id, "User registered");

        self.notifications
            .notify(
                NotificationType::UserSignup,
                "New User Registration",
                &format!("{} ({}) has signed up.", model.full_name(), model.email),
                json!({
                    "user_id": model.id,
                    "user_email": model.email,
                    "user_name": model.full_name(),
                }),
                None,
            )
            .await;

        Ok(model.into())
    }

    /// Verifies credentials and issues an access token.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let user = UserEntity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(request.username.clone()))
                    .add(user::Column::Email.eq(request.username.clone())),
            )
            .one(db)
            .await?
            .ok_or_else(|| {
                warn!("Login attempt for unknown account");
                ServiceError::Unauthorized("Invalid credentials".to_string())
            })?;

        self.auth
            .verify_password(&request.password, &user.password_hash)
            .map_err(|_| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        let pair = self.auth.generate_token(&user)?;
        info!(user_id = %user.id, "User logged in");
        Ok(pair)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        let user = UserEntity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        Ok(user.into())
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id, user_id = %user_id))]
    pub async fn grant_admin(
        &self,
        actor: &AuthUser,
        user_id: Uuid,
    ) -> Result<UserResponse, ServiceError> {
        let user = self.set_admin_flag(user_id, true).await?;
        info!(granted_by = %actor.id, "Admin rights granted");
        Ok(user)
    }

    /// Revokes admin rights. Self-demotion is rejected so the last admin
    /// cannot lock everyone out by accident.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, user_id = %user_id))]
    pub async fn revoke_admin(
        &self,
        actor: &AuthUser,
        user_id: Uuid,
    ) -> Result<UserResponse, ServiceError> {
        if actor.id == user_id {
            return Err(ServiceError::Forbidden(
                "You cannot revoke your own admin access".to_string(),
            ));
        }
        let user = self.set_admin_flag(user_id, false).await?;
        info!(revoked_by = %actor.id, "Admin rights revoked");
        Ok(user)
    }

    async fn set_admin_flag(
        &self,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<UserResponse, ServiceError> {
        let db = &*self.db_pool;
        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = user.into();
        active.is_admin = Set(is_admin);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;
        Ok(updated.into())
    }
}
