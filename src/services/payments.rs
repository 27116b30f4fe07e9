use crate::{
    auth::AuthUser,
    config::GatewayConfig,
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::payment::{self, Entity as PaymentEntity, PaymentStatus},
    errors::{is_unique_violation, ServiceError},
    services::payu,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fields the gateway redirect form requires, signed with the merchant salt.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentInitiationResponse {
    pub key: String,
    pub txnid: String,
    pub amount: String,
    pub productinfo: String,
    pub firstname: String,
    pub email: String,
    pub hash: String,
    pub surl: String,
    pub furl: String,
    pub payu_url: String,
}

/// Reconciliation failures, kept separate from `ServiceError` because the
/// webhook endpoint answers the gateway in plain text with its own status
/// mapping.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// No payment matches the supplied transaction id
    #[error("invalid txnid")]
    InvalidTxnid,

    /// Recomputed signature does not match the received hash
    #[error("hash mismatch")]
    HashMismatch,

    /// Replay with a different status after the payment was verified
    #[error("already verified with status {0}")]
    StatusConflict(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Payment gateway adapter: builds signed initiation payloads and applies
/// verified callback outcomes to payment and order state.
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    gateway: GatewayConfig,
}

impl PaymentService {
    pub fn new(db_pool: Arc<DbPool>, gateway: GatewayConfig) -> Self {
        Self { db_pool, gateway }
    }

    /// Creates an `initiated` payment for an order owned by the caller and
    /// returns the signed redirect fields.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user.id))]
    pub async fn initiate(
        &self,
        user: &AuthUser,
        order_id: Uuid,
    ) -> Result<PaymentInitiationResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user.id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        // One payment per order. The unique index on order_id backs this
        // check against concurrent initiations.
        let existing = PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Payment already initiated for order {}",
                order_id
            )));
        }

        let txnid = payu::generate_txnid();
        let amount = format!("{:.2}", order.grand_total());
        let productinfo = format!("Order #{}", order.id);
        let firstname = user.first_name();
        let email = user.email.clone();

        let result = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            txnid: Set(txnid.clone()),
            order_id: Set(order_id),
            user_id: Set(Some(user.id)),
            amount: Set(order.grand_total()),
            status: Set(PaymentStatus::Initiated.to_string()),
            gateway_response: Set(None),
            verified: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(ServiceError::Conflict(format!(
                    "Payment already initiated for order {}",
                    order_id
                )));
            }
            return Err(ServiceError::DatabaseError(e));
        }

        let hash = payu::initiation_hash(
            &self.gateway.merchant_key,
            &txnid,
            &amount,
            &productinfo,
            &firstname,
            &email,
            &self.gateway.merchant_salt,
        );

        info!(txnid = %txnid, amount = %amount, "Payment initiated");

        Ok(PaymentInitiationResponse {
            key: self.gateway.merchant_key.clone(),
            txnid,
            amount,
            productinfo,
            firstname,
            email,
            hash,
            surl: self.gateway.success_url.clone(),
            furl: self.gateway.failure_url.clone(),
            payu_url: self.gateway.base_url.clone(),
        })
    }

    /// Applies a gateway callback after verifying its signature.
    ///
    /// Safe to invoke more than once for the same txnid: a replay carrying
    /// the already-applied status is a no-op, a replay carrying a different
    /// status after verification is rejected without touching state.
    #[instrument(skip(self, params))]
    pub async fn process_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<(), CallbackError> {
        let get = |key: &str| params.get(key).map(String::as_str).unwrap_or("");

        let txnid = get("txnid");
        if txnid.is_empty() {
            return Err(CallbackError::InvalidTxnid);
        }
        let status = get("status");
        let received_hash = get("hash");

        let db = &*self.db_pool;
        let payment = PaymentEntity::find()
            .filter(payment::Column::Txnid.eq(txnid))
            .one(db)
            .await?
            .ok_or(CallbackError::InvalidTxnid)?;

        let expected_hash = payu::callback_hash(
            &self.gateway.merchant_salt,
            status,
            get("email"),
            get("firstname"),
            get("productinfo"),
            get("amount"),
            txnid,
            &self.gateway.merchant_key,
        );

        if !payu::hashes_match(&expected_hash, received_hash) {
            warn!(txnid = %txnid, "Callback signature mismatch; possible forged payment confirmation");
            return Err(CallbackError::HashMismatch);
        }

        if payment.verified {
            if payment.status == status {
                info!(txnid = %txnid, status = %status, "Duplicate callback for verified payment; no-op");
                return Ok(());
            }
            warn!(
                txnid = %txnid,
                applied = %payment.status,
                received = %status,
                "Divergent callback replay after verification; rejecting"
            );
            return Err(CallbackError::StatusConflict(payment.status));
        }

        let order_id = payment.order_id;
        let status_owned = status.to_string();
        let now = Utc::now();

        let txn = db.begin().await?;

        let mut payment_active: payment::ActiveModel = payment.into();
        payment_active.status = Set(status_owned.clone());
        payment_active.verified = Set(true);
        payment_active.gateway_response = Set(Some(serde_json::json!(params)));
        payment_active.updated_at = Set(Some(now));
        payment_active.update(&txn).await?;

        // Only terminal gateway outcomes move the order; anything else
        // (e.g. pending) leaves it untouched.
        let order_status = match status_owned.as_str() {
            "success" => Some(OrderStatus::Processing),
            "failure" => Some(OrderStatus::Cancelled),
            _ => None,
        };
        if let Some(new_status) = order_status {
            let order = OrderEntity::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    DbErr::Custom(format!("payment {} references missing order", txnid))
                })?;
            let mut order_active: order::ActiveModel = order.into();
            order_active.status = Set(new_status.to_string());
            order_active.updated_at = Set(Some(now));
            order_active.update(&txn).await?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, txnid = %txnid, "Failed to commit payment reconciliation");
            e
        })?;

        info!(txnid = %txnid, status = %status_owned, "Payment reconciled");
        Ok(())
    }
}
