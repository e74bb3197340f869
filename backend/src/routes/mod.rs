//! Route definitions for the Stockroom API

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{self, settings::MAX_IMPORT_BYTES};
use crate::{middleware::auth_middleware, AppState};

/// Create API routes; everything except login, refresh and logout requires a session
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .nest("/users", user_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/stores", store_routes())
        .nest("/inventory", inventory_routes())
        .nest("/sales", sale_routes())
        .nest("/analytics", analytics_routes())
        .nest("/finance", finance_routes())
        .route("/dashboard/overview", get(handlers::dashboard_overview))
        .route("/dashboard/recent-activity", get(handlers::dashboard_recent_activity))
        .nest("/settings", settings_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Auth routes (public)
        .nest("/auth", auth_routes())
        .merge(protected)
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
}

/// User administration routes
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/roles", get(handlers::list_roles))
        .route(
            "/:user_id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::deactivate_user),
        )
}

/// Product catalog routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/stats", get(handlers::get_product_stats))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::deactivate_product),
        )
        .route(
            "/:product_id/images",
            get(handlers::list_product_images).post(handlers::add_product_image),
        )
        .route(
            "/:product_id/images/:image_id",
            delete(handlers::remove_product_image),
        )
        .route(
            "/:product_id/images/:image_id/primary",
            post(handlers::set_primary_product_image),
        )
}

/// Category routes
fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_categories).post(handlers::create_category))
        .route(
            "/:category_id",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::deactivate_category),
        )
}

/// Store routes
fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stores).post(handlers::create_store))
        .route(
            "/:store_id",
            get(handlers::get_store)
                .put(handlers::update_store)
                .delete(handlers::deactivate_store),
        )
        .route("/:store_id/products", get(handlers::list_store_products))
}

/// Inventory ledger routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/low-stock", get(handlers::low_stock_report))
        .route(
            "/:product_id/:store_id",
            get(handlers::get_stock).put(handlers::set_stock),
        )
        .route("/:product_id/:store_id/adjust", post(handlers::adjust_stock))
}

/// Sales routes
fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/:sale_id", get(handlers::get_sale))
        .route("/:sale_id/status", post(handlers::transition_sale_status))
}

/// Analytics routes
fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(handlers::category_breakdown))
        .route("/trend", get(handlers::sales_trend))
        .route("/stores", get(handlers::store_performance))
        .route("/margins/products/:product_id", get(handlers::product_margin))
        .route("/margins/categories/:category_id", get(handlers::category_margin))
}

/// Finance routes
fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(handlers::financial_summary))
        .route("/top-products", get(handlers::top_products))
}

/// Settings routes
fn settings_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/import",
            post(handlers::import_products).layer(DefaultBodyLimit::max(MAX_IMPORT_BYTES + 64 * 1024)),
        )
        .route("/import-template", get(handlers::import_template))
        .route("/backup", get(handlers::download_backup))
        .route("/config", get(handlers::system_config))
}
