use crate::domain::plan::{DailyPlan, PlanCounts};
use crate::services::adherence::Insight;
use crate::state::SharedState;
use crate::web::identity::UserId;
use crate::web::{engine_status, resolve_day, DayQuery};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct PlanResponse {
    plan: DailyPlan,
    counts: PlanCounts,
}

impl From<DailyPlan> for PlanResponse {
    fn from(plan: DailyPlan) -> Self {
        Self {
            counts: plan.counts(),
            plan,
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(get_plan).put(put_plan))
        .route("/insights", get(get_insights))
        .route("/actions/:id/complete", post(complete_action))
        .route("/actions/:id/skip", post(skip_action))
        .route("/actions/:id/swap", post(swap_action))
        .with_state(state)
}

async fn get_plan(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Query(query): Query<DayQuery>,
) -> Result<Json<PlanResponse>, StatusCode> {
    let date = resolve_day(&state, user_id, query.date.as_deref()).await?;
    let plan = state
        .engine
        .plan(user_id, date)
        .await
        .map_err(engine_status)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(plan.into()))
}

async fn put_plan(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Json(plan): Json<DailyPlan>,
) -> Result<Json<PlanResponse>, StatusCode> {
    let plan = state
        .engine
        .set_plan(user_id, plan)
        .await
        .map_err(engine_status)?;
    Ok(Json(plan.into()))
}

async fn complete_action(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Path(action_id): Path<Uuid>,
    Query(query): Query<DayQuery>,
) -> Result<Json<PlanResponse>, StatusCode> {
    let date = resolve_day(&state, user_id, query.date.as_deref()).await?;
    let plan = state
        .engine
        .complete_action(user_id, date, action_id)
        .await
        .map_err(engine_status)?;
    Ok(Json(plan.into()))
}

async fn skip_action(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Path(action_id): Path<Uuid>,
    Query(query): Query<DayQuery>,
) -> Result<Json<PlanResponse>, StatusCode> {
    let date = resolve_day(&state, user_id, query.date.as_deref()).await?;
    let plan = state
        .engine
        .skip_action(user_id, date, action_id)
        .await
        .map_err(engine_status)?;
    Ok(Json(plan.into()))
}

async fn swap_action(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Path(action_id): Path<Uuid>,
    Query(query): Query<DayQuery>,
) -> Result<Json<PlanResponse>, StatusCode> {
    let date = resolve_day(&state, user_id, query.date.as_deref()).await?;
    let plan = state
        .engine
        .swap_action(user_id, date, action_id)
        .await
        .map_err(engine_status)?;
    Ok(Json(plan.into()))
}

async fn get_insights(
    UserId(user_id): UserId,
    State(state): State<SharedState>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<Insight>>, StatusCode> {
    let date = resolve_day(&state, user_id, query.date.as_deref()).await?;
    let insights = state
        .engine
        .insights(user_id, date)
        .await
        .map_err(engine_status)?;
    Ok(Json(insights))
}

#[cfg(test)]
mod tests {
    use crate::web::test_support::{app, call};
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn complete_then_read_back_counts() {
        let app = app();
        let user = Some(Uuid::new_v4());
        let (_, body) = call(
            &app,
            "POST",
            "/checkins",
            user,
            Some(json!({
                "date": "2026-03-05",
                "mood": 6, "stress": 3, "sleep": 7, "energy": 7, "focus": 6, "anxiety": 2
            })),
        )
        .await;
        let action_id = body["plan"]["actions"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/plan/actions/{action_id}/complete?date=2026-03-05"),
            user,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["counts"]["completed"], json!(1));
        assert_eq!(body["counts"]["pending"], json!(2));

        let (status, body) = call(&app, "GET", "/plan?date=2026-03-05", user, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plan"]["actions"][0]["status"], json!("completed"));
    }

    #[tokio::test]
    async fn missing_plan_is_not_found() {
        let app = app();
        let user = Some(Uuid::new_v4());
        let (status, _) = call(&app, "GET", "/plan?date=2026-03-05", user, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/plan/actions/{}/skip?date=2026-03-05", Uuid::new_v4()),
            user,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
