use crate::domain::crisis::CrisisEvent;
use crate::state::SharedState;
use crate::web::engine_status;
use crate::web::identity::UserId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_events))
        .route("/:id/ack", post(acknowledge))
        .with_state(state)
}

async fn list_events(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
) -> Result<Json<Vec<CrisisEvent>>, StatusCode> {
    let events = state
        .engine
        .crisis_events(user_id)
        .await
        .map_err(engine_status)?;
    Ok(Json(events))
}

async fn acknowledge(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    state
        .engine
        .acknowledge_crisis_event(user_id, event_id)
        .await
        .map_err(engine_status)?;
    Ok(StatusCode::NO_CONTENT)
}
