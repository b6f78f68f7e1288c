use crate::api::handlers::{bot, group, history, registry};
use crate::services::Services;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// Create router with all routes
pub fn create_router(services: Arc<Services>) -> Router {
    Router::new()
        // networks
        .route("/networks", get(registry::list_networks).post(registry::create_network))
        .route("/networks/import", post(registry::import_networks))
        .route("/networks/export", get(registry::export_networks))
        .route("/networks/{id}", get(registry::get_network).delete(registry::delete_network))
        .route(
            "/networks/{id}/rpc-urls",
            post(registry::add_rpc_url).delete(registry::delete_rpc_url),
        )
        // coins
        .route("/coins", get(registry::list_coins).post(registry::create_coin))
        .route("/coins/import", post(registry::import_coins))
        .route("/coins/export", get(registry::export_coins))
        .route("/coins/{id}", get(registry::get_coin).delete(registry::delete_coin))
        // groups
        .route("/groups", get(group::list_groups).post(group::create_group))
        .route("/groups/{id}", get(group::get_group).delete(group::delete_group))
        .route("/groups/{id}/info", put(group::update_info))
        .route("/groups/{id}/account-notes", put(group::set_account_notes))
        .route("/groups/{id}/accounts", put(group::set_accounts))
        .route("/groups/{id}/coins", put(group::set_coins))
        .route("/groups/{id}/coins/{coin}", post(group::add_coin).delete(group::remove_coin))
        .route(
            "/groups/{id}/namings/{naming}",
            post(group::add_naming).delete(group::remove_naming),
        )
        .route("/groups/{id}/reconcile", post(group::reconcile))
        .route("/groups/{id}/reset-balances", post(group::reset_balances))
        .route("/groups/{id}/balances", get(group::group_balances))
        .route("/groups/{id}/names", get(group::group_names))
        .route("/groups/{id}/account-balances", get(group::account_balances))
        .route("/groups/{id}/account-names", get(group::account_names))
        .route("/groups/{id}/accounts-info", get(group::accounts_info))
        .route("/groups/{id}/history", post(history::create_history))
        // tracking rows
        .route("/account-balances/{id}/check", post(group::check_account_balance))
        .route("/account-balances/{id}/rpc-stats", get(group::account_rpc_stats))
        .route("/account-names/{id}/check", post(group::check_account_name))
        .route("/account-names/{id}/problems", get(group::account_problems))
        // history
        .route("/history", get(history::list_history))
        .route("/history/{id}", get(history::get_history).delete(history::delete_history))
        .route("/history/{id}/diff", get(history::diff_history))
        // monitoring
        .route(
            "/rpc-monitoring",
            get(bot::list_rpc_monitoring).delete(bot::delete_rpc_monitoring),
        )
        .route("/rpc-monitoring/{id}", get(bot::get_rpc_monitoring))
        .route(
            "/naming-problems",
            get(bot::list_naming_problems).delete(bot::delete_naming_problems),
        )
        // bot
        .route("/bot", get(bot::status))
        .route("/bot/toggle-balances", post(bot::toggle_balances))
        .route("/bot/toggle-namings", post(bot::toggle_namings))
        .route("/bot/update-proxies", post(bot::update_proxies))
        .route("/bot/update-node-checker", post(bot::update_node_checker))
        .route("/bot/settings", get(bot::get_settings).put(bot::update_settings))
        // stats
        .route("/stats/networks", get(registry::network_stats))
        .route("/stats/coins", get(registry::coin_stats))
        .route("/stats/namings", get(registry::naming_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(services)
}
