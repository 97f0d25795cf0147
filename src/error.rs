//! Error types for the store, the content generator and the user-facing operations.

use std::time::Duration;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
  /// The (fingerprint, user) pair is already taken by another quest.
  #[error("quest fingerprint {fingerprint} already stored for user {user_id}")]
  Conflict { fingerprint: String, user_id: String },
  #[error("store backend error: {0}")]
  Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
  #[error("HTTP error: {0}")]
  Http(String),
  #[error("provider returned {status}: {message}")]
  Status { status: u16, message: String },
  #[error("generation timed out after {0:?}")]
  Timeout(Duration),
  #[error("provider error: {0}")]
  Provider(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuestError {
  #[error("unauthorized")]
  Unauthorized,
  #[error("invalid request: {0}")]
  InvalidRequest(&'static str),
  #[error("quota exceeded: {0}")]
  QuotaExceeded(&'static str),
  #[error("{0}")]
  AdLimitReached(&'static str),
  #[error("{0} not found")]
  NotFound(&'static str),
  #[error("quest generation failed: {0}")]
  GenerationFailed(#[from] GenerationError),
  #[error("quest content already stored for this user (fingerprint {0})")]
  PersistenceConflict(String),
  #[error("quest already submitted")]
  AlreadySubmitted,
  #[error("internal error: {0}")]
  Internal(String),
}

impl From<StoreError> for QuestError {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::Conflict { fingerprint, .. } => QuestError::PersistenceConflict(fingerprint),
      StoreError::Backend(msg) => QuestError::Internal(msg),
    }
  }
}

impl QuestError {
  pub fn code(&self) -> &'static str {
    match self {
      QuestError::Unauthorized => "unauthorized",
      QuestError::InvalidRequest(_) => "invalid_request",
      QuestError::QuotaExceeded(_) => "quota_exceeded",
      QuestError::AdLimitReached(_) => "limit_reached",
      QuestError::NotFound(_) => "not_found",
      QuestError::GenerationFailed(_) => "generation_failed",
      QuestError::PersistenceConflict(_) => "persistence_conflict",
      QuestError::AlreadySubmitted => "already_submitted",
      QuestError::Internal(_) => "internal",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      QuestError::Unauthorized => StatusCode::UNAUTHORIZED,
      QuestError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
      QuestError::QuotaExceeded(_) | QuestError::AdLimitReached(_) => StatusCode::FORBIDDEN,
      QuestError::NotFound(_) => StatusCode::NOT_FOUND,
      QuestError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
      QuestError::PersistenceConflict(_) | QuestError::AlreadySubmitted => StatusCode::CONFLICT,
      QuestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Message safe to show to the caller. Internal details stay in the logs.
  pub fn public_message(&self) -> String {
    match self {
      QuestError::Internal(_) => "Internal Server Error".into(),
      QuestError::QuotaExceeded(_) => "Daily quest limit reached. Watch an ad or subscribe.".into(),
      other => other.to_string(),
    }
  }
}

impl IntoResponse for QuestError {
  fn into_response(self) -> Response {
    if let QuestError::Internal(msg) = &self {
      tracing::error!(target: "quest_engine", error = %msg, "Internal failure");
    }
    let body = json!({ "error": self.public_message(), "code": self.code() });
    (self.status(), Json(body)).into_response()
  }
}
