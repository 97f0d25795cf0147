//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to the quest engine. We reply with a single JSON message per request.
//! The caller identity is fixed at upgrade time.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use super::identity::CallerId;
use crate::error::QuestError;
use crate::protocol::{to_out, ClientWsMessage, ServerWsMessage, SubscriptionOut};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state), fields(user = %caller.0))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, caller: CallerId, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "quest_engine", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, caller))
}

#[instrument(level = "info", skip(socket, state), fields(user = %caller.0))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, caller: CallerId) {
  info!(target: "quest_engine", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "quest_engine", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &caller).await
          }
          Err(e) => ServerWsMessage::Error { code: "invalid_request".into(), message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "code": "internal", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "quest_engine", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "quest_engine", "WebSocket disconnected");
}

fn ws_error(e: QuestError) -> ServerWsMessage {
  if let QuestError::Internal(msg) = &e {
    error!(target: "quest_engine", error = %msg, "Internal failure");
  }
  ServerWsMessage::Error { code: e.code().into(), message: e.public_message() }
}

#[instrument(level = "info", skip(state, msg), fields(user = %caller.0))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, caller: &CallerId) -> ServerWsMessage {
  let user = caller.0.as_str();
  let result = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::RequestQuest { subject, difficulty } => {
      state.engine.request_quest(user, &subject, difficulty).await.map(|q| {
        info!(target: "quest", id = %q.id, difficulty = q.difficulty, "WS quest served");
        ServerWsMessage::Quest { quest: to_out(&q) }
      })
    }

    ClientWsMessage::SubmitAnswer { quest_id, answer, explanation } => {
      state
        .engine
        .submit_answer(user, &quest_id, answer.as_deref(), explanation.as_deref())
        .await
        .map(|o| {
          info!(target: "quest", id = %quest_id, score = o.score, "WS submit_answer evaluated");
          ServerWsMessage::AnswerResult(o.into())
        })
    }

    ClientWsMessage::GetQuest { quest_id } => state
      .engine
      .get_quest(user, &quest_id)
      .await
      .map(|q| ServerWsMessage::Quest { quest: to_out(&q) }),

    ClientWsMessage::RefillViaAd => state.engine.refill_via_ad(user).await.map(|o| ServerWsMessage::Refill(o.into())),

    ClientWsMessage::SubscriptionStatus => state
      .engine
      .subscription_status(user)
      .await
      .map(|is_subscribed| ServerWsMessage::Subscription(SubscriptionOut { is_subscribed })),
  };
  result.unwrap_or_else(ws_error)
}
