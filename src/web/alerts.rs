use crate::analytics::alerts::ProactiveAlert;
use crate::state::SharedState;
use crate::web::identity::UserId;
use crate::web::{engine_status, resolve_day, DayQuery};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(current_alert))
        .route("/refresh", post(refresh_alert))
        .route("/dismiss", post(dismiss_alert))
        .with_state(state)
}

async fn current_alert(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
) -> Result<Json<Option<ProactiveAlert>>, StatusCode> {
    let alert = state
        .engine
        .current_alert(user_id)
        .await
        .map_err(engine_status)?;
    Ok(Json(alert))
}

async fn refresh_alert(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Option<ProactiveAlert>>, StatusCode> {
    let today = resolve_day(&state, user_id, query.date.as_deref()).await?;
    let alert = state
        .engine
        .refresh_alert(user_id, today)
        .await
        .map_err(engine_status)?
        .filter(|alert| !alert.dismissed);
    Ok(Json(alert))
}

async fn dismiss_alert(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
) -> Result<StatusCode, StatusCode> {
    match state
        .engine
        .dismiss_alert(user_id)
        .await
        .map_err(engine_status)?
    {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(StatusCode::NOT_FOUND),
    }
}
