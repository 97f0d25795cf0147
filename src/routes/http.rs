//! HTTP endpoint handlers. These are thin wrappers that forward to the quest engine.
//! Each handler is instrumented and logs the caller and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  Json,
};
use tracing::{info, instrument};

use super::identity::CallerId;
use crate::error::QuestError;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut { ok: true, provider: state.engine.provider() })
}

#[instrument(level = "info", skip(state, body), fields(user = %caller.0, subject = %body.subject))]
pub async fn http_request_quest(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
  Json(body): Json<RequestQuestIn>,
) -> Result<Json<QuestEnvelope>, QuestError> {
  let quest = state.engine.request_quest(&caller.0, &body.subject, body.difficulty).await?;
  info!(target: "quest", id = %quest.id, difficulty = quest.difficulty, "HTTP quest served");
  Ok(Json(QuestEnvelope { quest: to_out(&quest) }))
}

#[instrument(level = "info", skip(state, body), fields(user = %caller.0, quest_id = %body.quest_id))]
pub async fn http_submit_answer(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
  Json(body): Json<SubmitAnswerIn>,
) -> Result<Json<AnswerOut>, QuestError> {
  let outcome = state
    .engine
    .submit_answer(&caller.0, &body.quest_id, body.answer.as_deref(), body.explanation.as_deref())
    .await?;
  info!(target: "quest", id = %body.quest_id, score = outcome.score, flags = outcome.cheat_flags.len(), "HTTP submit_answer evaluated");
  Ok(Json(outcome.into()))
}

#[instrument(level = "info", skip(state), fields(user = %caller.0))]
pub async fn http_refill_via_ad(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
) -> Result<Json<RefillOut>, QuestError> {
  let outcome = state.engine.refill_via_ad(&caller.0).await?;
  Ok(Json(outcome.into()))
}

#[instrument(level = "info", skip(state), fields(user = %caller.0))]
pub async fn http_subscription_status(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
) -> Result<Json<SubscriptionOut>, QuestError> {
  let is_subscribed = state.engine.subscription_status(&caller.0).await?;
  Ok(Json(SubscriptionOut { is_subscribed }))
}

#[instrument(level = "info", skip(state), fields(user = %caller.0, %quest_id))]
pub async fn http_get_quest(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
  Path(quest_id): Path<String>,
) -> Result<Json<QuestEnvelope>, QuestError> {
  let quest = state.engine.get_quest(&caller.0, &quest_id).await?;
  Ok(Json(QuestEnvelope { quest: to_out(&quest) }))
}

#[instrument(level = "info", skip(state, body), fields(user = %caller.0, subject = %body.subject))]
pub async fn http_generate_preview(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
  Json(body): Json<GenerateIn>,
) -> Result<Json<GenerateOut>, QuestError> {
  let preview = state.engine.preview(&body.subject, body.difficulty).await?;
  info!(target: "quest", cached = preview.cached, provider = preview.provider, "HTTP generation preview served");
  Ok(Json(preview.into()))
}
