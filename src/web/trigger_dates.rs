use crate::domain::metrics::parse_checkin_date;
use crate::domain::trigger_date::TriggerDate;
use crate::state::SharedState;
use crate::web::engine_status;
use crate::web::identity::UserId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct TriggerDatePayload {
    date: String,
    label: String,
    #[serde(default)]
    repeat_annually: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", put(update).delete(remove))
        .with_state(state)
}

fn validate(payload: &TriggerDatePayload) -> Result<chrono::NaiveDate, StatusCode> {
    if payload.label.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    parse_checkin_date(&payload.date).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn list(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
) -> Result<Json<Vec<TriggerDate>>, StatusCode> {
    let dates = state
        .engine
        .trigger_dates(user_id)
        .await
        .map_err(engine_status)?;
    Ok(Json(dates))
}

async fn create(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Json(payload): Json<TriggerDatePayload>,
) -> Result<(StatusCode, Json<TriggerDate>), StatusCode> {
    let date = validate(&payload)?;
    let trigger = state
        .engine
        .add_trigger_date(user_id, date, payload.label, payload.repeat_annually)
        .await
        .map_err(engine_status)?;
    Ok((StatusCode::CREATED, Json(trigger)))
}

async fn update(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TriggerDatePayload>,
) -> Result<Json<TriggerDate>, StatusCode> {
    let date = validate(&payload)?;
    let trigger = state
        .engine
        .update_trigger_date(
            user_id,
            TriggerDate {
                id,
                date,
                label: payload.label.trim().to_string(),
                repeat_annually: payload.repeat_annually,
            },
        )
        .await
        .map_err(engine_status)?;
    Ok(Json(trigger))
}

async fn remove(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    state
        .engine
        .delete_trigger_date(user_id, id)
        .await
        .map_err(engine_status)?;
    Ok(StatusCode::NO_CONTENT)
}
