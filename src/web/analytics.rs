use crate::engine::AnalyticsReport;
use crate::state::SharedState;
use crate::web::identity::UserId;
use crate::web::{engine_status, resolve_day, DayQuery};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

pub fn router(state: SharedState) -> Router {
    Router::new().route("/", get(get_analytics)).with_state(state)
}

async fn get_analytics(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Query(query): Query<DayQuery>,
) -> Result<Json<AnalyticsReport>, StatusCode> {
    let today = resolve_day(&state, user_id, query.date.as_deref()).await?;
    let report = state
        .engine
        .analytics(user_id, today)
        .await
        .map_err(engine_status)?;
    Ok(Json(report))
}
