use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Commerce API",
        version = "0.1.0",
        description = r#"
# Commerce API

Backend for an online storefront: product catalog, orders with
point-in-time price snapshots, gateway payment reconciliation, shipping
addresses, and stock notifications.

## Authentication

Authenticated endpoints expect a JWT in the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

The payment webhook is the one unauthenticated mutation; it is
authenticated by the merchant-salt signature instead.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Orders", description = "Order creation and lifecycle"),
        (name = "Payments", description = "Gateway initiation and webhook reconciliation"),
        (name = "Addresses", description = "Shipping address book"),
        (name = "Products", description = "Product catalog"),
        (name = "Categories", description = "Category catalog"),
        (name = "StockNotifications", description = "Back-in-stock subscriptions"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Users", description = "Admin role management")
    ),
    paths(
        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::me,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,

        // Payments
        crate::handlers::payments::initiate_payment,
        crate::handlers::payments::payment_webhook,

        // Addresses
        crate::handlers::shipping_addresses::list_addresses,
        crate::handlers::shipping_addresses::create_address,
        crate::handlers::shipping_addresses::get_address,
        crate::handlers::shipping_addresses::update_address,
        crate::handlers::shipping_addresses::delete_address,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        // Categories
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,

        // Stock notifications
        crate::handlers::stock_notifications::subscribe,
        crate::handlers::stock_notifications::list_subscriptions,

        // Notifications
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::mark_notification_read,

        // Users
        crate::handlers::users::make_admin,
        crate::handlers::users::revoke_admin,
    ),
    components(
        schemas(
            // Order types
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderItem,
            crate::services::orders::NewShippingAddress,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderListResponse,

            // Payment types
            crate::services::payments::PaymentInitiationResponse,

            // Address types
            crate::services::shipping_addresses::CreateAddressRequest,
            crate::services::shipping_addresses::UpdateAddressRequest,

            // Product types
            crate::services::products::CreateProductRequest,
            crate::services::products::UpdateProductRequest,
            crate::services::products::ProductResponse,
            crate::services::products::ProductListResponse,

            // Category types
            crate::services::categories::CreateCategoryRequest,
            crate::services::categories::UpdateCategoryRequest,

            // Stock notification types
            crate::handlers::stock_notifications::SubscribeRequest,

            // User types
            crate::auth::TokenPair,
            crate::services::users::RegisterRequest,
            crate::services::users::LoginRequest,
            crate::services::users::AdminGrantRequest,
            crate::services::users::UserResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn openapi_document_includes_core_paths() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/payments/webhook"));
        assert!(json.contains("bearer_auth"));
    }
}
