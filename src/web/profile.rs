use crate::state::SharedState;
use crate::store::UserProfile;
use crate::web::engine_status;
use crate::web::identity::UserId;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(get_profile).put(put_profile))
        .with_state(state)
}

async fn get_profile(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
) -> Result<Json<UserProfile>, StatusCode> {
    let profile = state.engine.profile(user_id).await.map_err(engine_status)?;
    Ok(Json(profile))
}

async fn put_profile(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<UserProfile>, StatusCode> {
    let profile = state
        .engine
        .update_profile(user_id, profile)
        .await
        .map_err(engine_status)?;
    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use crate::web::test_support::{app, call};
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn timezone_is_normalized_or_rejected() {
        let app = app();
        let user = Some(Uuid::new_v4());
        let (status, saved) = call(
            &app,
            "PUT",
            "/profile",
            user,
            Some(json!({"focus_areas": ["Sleep"], "timezone": "Europe/Kiev"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["timezone"], json!("Europe/Kyiv"));
        assert_eq!(saved["focus_areas"], json!(["sleep"]));

        let (status, _) = call(
            &app,
            "PUT",
            "/profile",
            user,
            Some(json!({"timezone": "Nowhere/Real"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
