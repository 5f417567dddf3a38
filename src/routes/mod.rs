use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    admin, auth, events, health_check, method_not_allowed, public, qr, route_not_found, sellers,
    tickets,
};
use crate::state::AppState;

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/me", get(auth::me))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event).put(events::update_event),
        )
        .route(
            "/events/:id/admins",
            get(events::list_admins).post(events::add_admin),
        )
        .route(
            "/events/:id/admins/:account_id",
            delete(events::remove_admin),
        )
        .route(
            "/sellers",
            get(sellers::list_sellers).post(sellers::create_seller),
        )
        .route("/sellers/:id", get(sellers::get_seller))
        .route("/sellers/:id/quota", put(sellers::update_quota))
        .route("/sellers/:id/revoke", post(sellers::revoke_seller))
        .route("/sellers/:id/restore", post(sellers::restore_seller))
        .route("/tickets", get(tickets::admin_tickets))
        .route("/tickets/:id/revoke", post(tickets::revoke_ticket))
        .route("/tickets/:id/restore", post(tickets::restore_ticket))
}

fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(tickets::generate))
        .route("/seller", get(tickets::seller_tickets))
        .route("/:id", get(tickets::get_ticket))
        .route("/:id/link", post(tickets::ticket_link))
}

fn qr_routes() -> Router<AppState> {
    Router::new()
        .route("/verify", post(qr::verify))
        .route("/lookup", post(qr::lookup))
        .route("/:id/payload", get(qr::payload))
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/ticket/:id/:token/info", get(public::ticket_info))
        .route("/download/:id/:token", get(public::download))
}

pub fn create_routes(state: AppState) -> Router {
    let security_headers = create_security_headers_layer(&state.config);
    let cors = create_cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes())
        .nest("/api/admin", admin_routes())
        .nest("/api/tickets", ticket_routes())
        .route("/api/seller/dashboard", get(tickets::seller_dashboard))
        .nest("/api/qr", qr_routes())
        .nest("/api/public", public_routes())
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers)
        .layer(cors)
        .with_state(state)
}
