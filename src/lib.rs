//! Billet: event ticketing backend.
//!
//! Admins create events and sellers, sellers generate tickets for buyers
//! within their quota, and door staff scan ticket codes to admit entry.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod tickets;
pub mod utils;

use axum::Router;

use config::Config;
use state::AppState;
use store::Store;
use utils::error::AppError;

/// Connects the store, creates the bootstrap admin if configured, and
/// returns the router.
pub async fn build_app(config: Config) -> Result<Router, AppError> {
    let store = Store::from_config(&config).await?;
    if let Some(admin) = &config.bootstrap_admin {
        store::ensure_bootstrap_admin(&store, admin).await?;
    }
    Ok(routes::create_routes(AppState::new(store, config)))
}
