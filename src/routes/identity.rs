//! Caller identity. The identity provider in front of us authenticates the request
//! and forwards the opaque user id in `x-user-id`; we trust it as-is.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::QuestError;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
  type Rejection = QuestError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(USER_ID_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|id| !id.is_empty())
      .map(|id| CallerId(id.to_string()))
      .ok_or(QuestError::Unauthorized)
  }
}
