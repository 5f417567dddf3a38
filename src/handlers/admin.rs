use axum::extract::State;
use axum::response::Response;

use crate::auth::AdminUser;
use crate::models::DashboardStats;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn dashboard(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Response, AppError> {
    let events = state.store.events_for_admin(admin.id).await?;
    let ids: Vec<_> = events.iter().map(|e| e.id).collect();
    let totals = state.store.event_totals(&ids).await?;
    Ok(success(
        DashboardStats::aggregate(&events, &totals),
        "Dashboard retrieved",
    ))
}
