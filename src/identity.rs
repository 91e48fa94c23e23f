use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Opaque authenticated caller identity, threaded explicitly into every
/// operation instead of living in ambient session state. The upstream
/// identity provider has already authenticated the caller; this extractor
/// only reads the identity it forwarded in the `x-actor-id` header.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-actor-id")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("missing x-actor-id header".to_string()))?;

        let id = raw
            .parse::<Uuid>()
            .map_err(|_| AppError::Unauthenticated(format!("invalid actor id: {raw}")))?;

        Ok(Actor(id))
    }
}
