pub mod alerts;
pub mod analytics;
pub mod checkin;
pub mod crisis;
pub mod identity;
pub mod mode;
pub mod plan;
pub mod profile;
pub mod trigger_dates;

use crate::domain::metrics::parse_checkin_date;
use crate::error::{EngineError, StoreError};
use crate::state::SharedState;
use axum::{http::StatusCode, routing::get, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/checkins", checkin::router(state.clone()))
        .nest("/plan", plan::router(state.clone()))
        .nest("/mode", mode::router(state.clone()))
        .nest("/alerts", alerts::router(state.clone()))
        .nest("/analytics", analytics::router(state.clone()))
        .nest("/trigger-dates", trigger_dates::router(state.clone()))
        .nest("/crisis-events", crisis::router(state.clone()))
        .nest("/profile", profile::router(state))
}

/// `?date=YYYY-MM-DD`; absent means the user's local today.
#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

pub(crate) async fn resolve_day(
    state: &SharedState,
    user_id: Uuid,
    raw: Option<&str>,
) -> Result<NaiveDate, StatusCode> {
    match raw {
        Some(raw) => parse_checkin_date(raw).map_err(|_| StatusCode::BAD_REQUEST),
        None => Ok(state.engine.local_clock(user_id, Utc::now()).await.date),
    }
}

pub(crate) fn engine_status(err: EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_)
        | EngineError::ActionNotPending(_)
        | EngineError::InvalidTimezone(_) => StatusCode::BAD_REQUEST,
        EngineError::PlanNotFound
        | EngineError::ActionNotFound(_)
        | EngineError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        EngineError::NoSwapCandidate => StatusCode::CONFLICT,
        EngineError::ForeignPlan => StatusCode::FORBIDDEN,
        EngineError::Store(e) => {
            tracing::error!("Storage failure: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::EngineConfig;
    use crate::db::seed::default_catalog;
    use crate::engine::Engine;
    use crate::services::planner::SeededRandom;
    use crate::state::{AppState, SharedState};
    use crate::store::memory::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    pub fn app() -> Router {
        let store = Arc::new(MemoryStore::with_catalog(default_catalog()));
        let engine = Engine::new(store, EngineConfig::default())
            .with_random(Arc::new(SeededRandom::new(11)));
        let state: SharedState = Arc::new(AppState {
            engine: Arc::new(engine),
        });
        super::routes(state)
    }

    pub async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<Uuid>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}
