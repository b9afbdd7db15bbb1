use crate::domain::metrics::CheckinMetrics;
use crate::engine::{CheckinOutcome, CheckinSubmission};
use crate::state::SharedState;
use crate::web::identity::UserId;
use crate::web::{engine_status, resolve_day};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CheckinPayload {
    date: Option<String>,
    mood: i16,
    stress: i16,
    sleep: i16,
    energy: i16,
    focus: i16,
    anxiety: i16,
    #[serde(default)]
    journal_text: Option<String>,
    #[serde(default)]
    sos: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new().route("/", post(submit)).with_state(state)
}

async fn submit(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Json(payload): Json<CheckinPayload>,
) -> Result<Json<CheckinOutcome>, StatusCode> {
    let date = resolve_day(&state, user_id, payload.date.as_deref()).await?;
    let metrics = CheckinMetrics::new(
        payload.mood,
        payload.stress,
        payload.sleep,
        payload.energy,
        payload.focus,
        payload.anxiety,
    )
    .map_err(|_| StatusCode::BAD_REQUEST)?;

    let journal_text = payload
        .journal_text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let outcome = state
        .engine
        .submit_checkin(
            user_id,
            CheckinSubmission {
                date,
                metrics,
                journal_text,
                sos_invoked: payload.sos,
            },
        )
        .await
        .map_err(engine_status)?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use crate::web::test_support::{app, call};
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn checkin_returns_plan_and_verdict() {
        let app = app();
        let user = Uuid::new_v4();
        let (status, body) = call(
            &app,
            "POST",
            "/checkins",
            Some(user),
            Some(json!({
                "date": "2026-03-02",
                "mood": 6, "stress": 3, "sleep": 7, "energy": 7, "focus": 6, "anxiety": 2
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["crisis"]["detected"], json!(false));
        assert_eq!(body["plan"]["actions"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn high_risk_text_surfaces_emergency_resources() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/checkins",
            Some(Uuid::new_v4()),
            Some(json!({
                "date": "2026-03-02",
                "mood": 5, "stress": 5, "sleep": 5, "energy": 5, "focus": 5, "anxiety": 5,
                "journal_text": "I have been thinking about suicide"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["crisis"]["severity"], json!("high"));
        assert_eq!(body["resources"][0]["kind"], json!("emergency"));
    }

    #[tokio::test]
    async fn bad_input_is_rejected() {
        let app = app();
        let user = Some(Uuid::new_v4());
        let out_of_range = json!({
            "date": "2026-03-02",
            "mood": 0, "stress": 3, "sleep": 7, "energy": 7, "focus": 6, "anxiety": 2
        });
        let (status, _) = call(&app, "POST", "/checkins", user, Some(out_of_range)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_date = json!({
            "date": "02/03/2026",
            "mood": 5, "stress": 3, "sleep": 7, "energy": 7, "focus": 6, "anxiety": 2
        });
        let (status, _) = call(&app, "POST", "/checkins", user, Some(bad_date)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let app = app();
        let (status, _) = call(
            &app,
            "POST",
            "/checkins",
            None,
            Some(json!({"mood": 5, "stress": 3, "sleep": 7, "energy": 7, "focus": 6, "anxiety": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
