//! Router assembly.
//!
//! ```text
//! GET  /health
//! /api/auth        register, login, forgot-password, reset-password
//! /api/users       profile, admin user management
//! /api/categories  /api/suppliers  /api/products  /api/customers
//! /api/addresses   /api/orders     /api/reviews
//! /api/upload      /api/payments/vnpay/*  /api/shipping/*
//! /uploads/*       stored images
//! ```
//!
//! Every soft-deletable resource exposes the same lifecycle routes:
//! `DELETE /{id}` (soft), `PUT /{id}/restore`, `DELETE /{id}/hard` and
//! `GET /deleted/list`.

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{
    addresses, auth, categories, customers, orders, payments, products, reviews, shipping,
    suppliers, uploads, users,
};
use super::middleware::rate_limit::{api_rate_limiter, auth_rate_limiter};
use crate::infrastructure::storage::PUBLIC_PREFIX;
use crate::state::AppState;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list_users))
        .route("/deleted/list", get(users::list_deleted_users))
        .route(
            "/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/profile/password", put(users::change_password))
        .route("/profile/avatar", post(users::upload_avatar))
        .route(
            "/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/{id}/restore", put(users::restore_user))
        .route("/{id}/hard", delete(users::hard_delete_user))
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/deleted/list", get(categories::list_deleted_categories))
        .route(
            "/{id}",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/{id}/restore", put(categories::restore_category))
        .route("/{id}/hard", delete(categories::hard_delete_category))
}

fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(suppliers::list_suppliers).post(suppliers::create_supplier),
        )
        .route("/deleted/list", get(suppliers::list_deleted_suppliers))
        .route(
            "/{id}",
            get(suppliers::get_supplier)
                .put(suppliers::update_supplier)
                .delete(suppliers::delete_supplier),
        )
        .route("/{id}/restore", put(suppliers::restore_supplier))
        .route("/{id}/hard", delete(suppliers::hard_delete_supplier))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(products::list_products).post(products::create_product),
        )
        .route("/deleted/list", get(products::list_deleted_products))
        .route(
            "/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/{id}/restore", put(products::restore_product))
        .route("/{id}/hard", delete(products::hard_delete_product))
        .route(
            "/{id}/reviews",
            get(reviews::list_product_reviews).post(reviews::create_review),
        )
}

fn customer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route("/deleted/list", get(customers::list_deleted_customers))
        .route("/phone/{phone}", get(customers::get_customer_by_phone))
        .route(
            "/{id}",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route("/{id}/restore", put(customers::restore_customer))
        .route("/{id}/hard", delete(customers::hard_delete_customer))
}

fn address_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(addresses::list_addresses).post(addresses::create_address),
        )
        .route("/mine", get(addresses::list_my_addresses))
        .route("/deleted/list", get(addresses::list_deleted_addresses))
        .route(
            "/{id}",
            get(addresses::get_address)
                .put(addresses::update_address)
                .delete(addresses::delete_address),
        )
        .route("/{id}/default", put(addresses::set_default_address))
        .route("/{id}/restore", put(addresses::restore_address))
        .route("/{id}/hard", delete(addresses::hard_delete_address))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list_orders).post(orders::create_order))
        .route("/mine", get(orders::list_my_orders))
        .route("/deleted/list", get(orders::list_deleted_orders))
        .route(
            "/{id}",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/{id}/status", put(orders::update_order_status))
        .route("/{id}/cancel", put(orders::cancel_order))
        .route("/{id}/restore", put(orders::restore_order))
        .route("/{id}/hard", delete(orders::hard_delete_order))
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reviews::list_reviews))
        .route("/deleted/list", get(reviews::list_deleted_reviews))
        .route(
            "/{id}",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        .route("/{id}/restore", put(reviews::restore_review))
        .route("/{id}/hard", delete(reviews::hard_delete_review))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/vnpay/create", post(payments::create_vnpay_payment))
        .route("/vnpay/return", get(payments::vnpay_return))
        .route("/vnpay/ipn", get(payments::vnpay_ipn))
}

fn shipping_routes() -> Router<AppState> {
    Router::new()
        .route("/provinces", get(shipping::list_provinces))
        .route("/districts", get(shipping::list_districts))
        .route("/wards", get(shipping::list_wards))
        .route("/fee", post(shipping::quote_fee))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = CorsLayer::new().allow_methods(methods).allow_headers(Any);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(_)) => {
            tracing::warn!("CORS_ORIGIN is not a valid header value, allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

/// Builds the full application router
///
/// Rate limiting keys on the client address, so serve the router with
/// `into_make_service_with_connect_info::<SocketAddr>()` when
/// `rate_limit_enabled` is set.
pub fn build_router(state: AppState) -> Router {
    let rate_limited = state.config.rate_limit_enabled;
    let trust_proxy_headers = state.config.trust_proxy_headers;

    let mut auth = auth_routes();
    if rate_limited {
        if let Some(limiter) = auth_rate_limiter(trust_proxy_headers) {
            auth = auth.layer(limiter);
        }
    }

    let mut api = Router::new()
        .nest("/auth", auth)
        .nest("/users", user_routes())
        .nest("/categories", category_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/products", product_routes())
        .nest("/customers", customer_routes())
        .nest("/addresses", address_routes())
        .nest("/orders", order_routes())
        .nest("/reviews", review_routes())
        .nest("/payments", payment_routes())
        .nest("/shipping", shipping_routes())
        .route("/upload", post(uploads::upload_image));
    if rate_limited {
        if let Some(limiter) = api_rate_limiter(trust_proxy_headers) {
            api = api.layer(limiter);
        }
    }

    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let uploads_dir = ServeDir::new(state.storage.root());
    let cors = cors_layer(state.config.cors_origin.as_deref());

    Router::new()
        .route("/health", get(auth::health_check))
        .nest("/api", api)
        .nest_service(PUBLIC_PREFIX, uploads_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
