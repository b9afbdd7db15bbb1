use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

pub const USER_HEADER: &str = "x-user-id";

/// Caller identity set by the upstream gateway in `X-User-Id`.
///
/// ```rust,ignore
/// async fn handler(UserId(user_id): UserId) -> Result<...> { ... }
/// ```
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let user_id = Uuid::parse_str(raw.trim()).map_err(|_| {
            tracing::warn!("Rejected malformed {} header", USER_HEADER);
            StatusCode::UNAUTHORIZED
        })?;
        Ok(UserId(user_id))
    }
}
