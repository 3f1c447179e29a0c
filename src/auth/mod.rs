//! Caller identity.
//!
//! Authentication happens in front of this service; the gateway forwards the
//! authenticated user in `X-Actor-Id` and every mutating operation records it.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::ServiceError;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// The user on whose behalf a request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| ServiceError::Unauthorized(format!("missing {} header", ACTOR_HEADER)))?;

        let actor = value
            .to_str()
            .map_err(|_| {
                ServiceError::Unauthorized(format!("{} header is not valid text", ACTOR_HEADER))
            })?
            .trim();

        if actor.is_empty() {
            return Err(ServiceError::Unauthorized(format!(
                "{} header must not be blank",
                ACTOR_HEADER
            )));
        }

        Ok(Actor(actor.to_string()))
    }
}
