pub mod auth;
pub mod categories;
pub mod common;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping_addresses;
pub mod stock_notifications;
pub mod users;

use crate::auth::AuthService;
use crate::config::GatewayConfig;
use crate::db::DbPool;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub payments: Arc<crate::services::payments::PaymentService>,
    pub addresses: Arc<crate::services::shipping_addresses::AddressService>,
    pub products: Arc<crate::services::products::ProductService>,
    pub categories: Arc<crate::services::categories::CategoryService>,
    pub stock_notifications: Arc<crate::services::stock_notifications::StockNotificationService>,
    pub notifications: Arc<crate::services::notifications::NotificationService>,
    pub users: Arc<crate::services::users::UserService>,
}

impl AppServices {
    /// Wires every service against the shared pool and collaborators.
    pub fn new(
        db_pool: Arc<DbPool>,
        auth_service: Arc<AuthService>,
        gateway: GatewayConfig,
    ) -> Self {
        let notifications = Arc::new(crate::services::notifications::NotificationService::new(
            db_pool.clone(),
        ));
        let stock_notifications = Arc::new(
            crate::services::stock_notifications::StockNotificationService::new(
                db_pool.clone(),
                notifications.clone(),
            ),
        );
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            notifications.clone(),
        ));
        let payments = Arc::new(crate::services::payments::PaymentService::new(
            db_pool.clone(),
            gateway,
        ));
        let addresses = Arc::new(crate::services::shipping_addresses::AddressService::new(
            db_pool.clone(),
        ));
        let products = Arc::new(crate::services::products::ProductService::new(
            db_pool.clone(),
            notifications.clone(),
            stock_notifications.clone(),
        ));
        let categories = Arc::new(crate::services::categories::CategoryService::new(
            db_pool.clone(),
        ));
        let users = Arc::new(crate::services::users::UserService::new(
            db_pool,
            auth_service,
            notifications.clone(),
        ));

        Self {
            orders,
            payments,
            addresses,
            products,
            categories,
            stock_notifications,
            notifications,
            users,
        }
    }
}
