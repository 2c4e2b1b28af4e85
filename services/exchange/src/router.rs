use crate::handlers::{admin, public, trader};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(public::health))
        .route("/companies", get(public::list_companies))
        .route("/companies/:ticker", get(public::get_company))
        .route("/orderbook/:ticker", get(public::get_orderbook))
        .route("/trades/:ticker", get(public::get_trades))
        .route("/market-data", get(public::get_all_market_data))
        .route("/market-data/:ticker", get(public::get_market_data));

    let trader_routes = Router::new()
        .route("/account", get(trader::get_account))
        .route("/holdings", get(trader::get_holdings))
        .route("/orders", get(trader::list_orders).post(trader::place_order))
        .route(
            "/orders/:id",
            get(trader::get_order).delete(trader::cancel_order),
        );

    let admin_routes = Router::new()
        .route("/companies", post(admin::create_company))
        .route("/accounts", post(admin::create_account).get(admin::list_accounts))
        .route("/accounts/:id", get(admin::get_account))
        .route("/stats", get(admin::stats))
        .route("/orderbook/:ticker", get(admin::orderbook));

    Router::new()
        .merge(public_routes)
        .merge(trader_routes)
        .nest("/admin", admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
