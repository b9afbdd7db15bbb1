use crate::services::adaptive_mode::{AdaptiveModeState, ModeTransition};
use crate::state::SharedState;
use crate::web::engine_status;
use crate::web::identity::UserId;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(get_mode))
        .route("/check", post(check_mode))
        .route("/deactivate", post(deactivate))
        .with_state(state)
}

async fn get_mode(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
) -> Result<Json<AdaptiveModeState>, StatusCode> {
    let mode = state.engine.mode(user_id).await.map_err(engine_status)?;
    Ok(Json(mode))
}

async fn check_mode(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
) -> Result<Json<ModeTransition>, StatusCode> {
    let clock = state.engine.local_clock(user_id, Utc::now()).await;
    let transition = state
        .engine
        .check_bad_day_mode(user_id, clock)
        .await
        .map_err(engine_status)?;
    Ok(Json(transition))
}

async fn deactivate(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
) -> Result<Json<AdaptiveModeState>, StatusCode> {
    let today = state.engine.local_clock(user_id, Utc::now()).await.date;
    let mode = state
        .engine
        .deactivate_bad_day_mode(user_id, today)
        .await
        .map_err(engine_status)?;
    Ok(Json(mode))
}

#[cfg(test)]
mod tests {
    use crate::web::test_support::{app, call};
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn sos_checkin_turns_mode_on_and_manual_switch_turns_it_off() {
        let app = app();
        let user = Some(Uuid::new_v4());
        let today = chrono::Utc::now().date_naive().to_string();
        let (status, _) = call(
            &app,
            "POST",
            "/checkins",
            user,
            Some(json!({
                "date": today,
                "mood": 5, "stress": 4, "sleep": 6, "energy": 6, "focus": 5, "anxiety": 3,
                "sos": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, mode) = call(&app, "GET", "/mode", user, None).await;
        assert_eq!(mode["active"], json!(true));

        let (status, mode) = call(&app, "POST", "/mode/deactivate", user, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mode["active"], json!(false));

        let (_, transition) = call(&app, "POST", "/mode/check", user, None).await;
        assert_eq!(transition["change"]["change"], json!("unchanged"));
    }
}
