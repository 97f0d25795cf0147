//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CheatFlag, Quest, QuestType};
use crate::generator::GeneratedQuest;
use crate::session::{Preview, RefillOutcome, SubmitOutcome};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    RequestQuest {
        subject: String,
        #[serde(default)]
        difficulty: Option<u8>,
    },
    SubmitAnswer {
        #[serde(rename = "questId")]
        quest_id: String,
        #[serde(default)]
        answer: Option<String>,
        #[serde(default)]
        explanation: Option<String>,
    },
    GetQuest {
        #[serde(rename = "questId")]
        quest_id: String,
    },
    RefillViaAd,
    SubscriptionStatus,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Quest {
        quest: QuestOut,
    },
    AnswerResult(AnswerOut),
    Refill(RefillOut),
    Subscription(SubscriptionOut),
    Error {
        code: String,
        message: String,
    },
}

/// DTO used by both WS and HTTP for quest delivery.
/// The canonical answer and explanation only appear once the quest was submitted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestOut {
    pub id: String,
    pub subject: String,
    #[serde(rename = "type")]
    pub quest_type: QuestType,
    pub difficulty: u8,
    pub question: String,
    pub choices: Vec<String>,
    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    pub solved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub cheat_flags: BTreeSet<CheatFlag>,
}

/// Convert the internal `Quest` to the public DTO.
pub fn to_out(q: &Quest) -> QuestOut {
    let submitted = q.is_submitted();
    QuestOut {
        id: q.id.clone(),
        subject: q.subject.clone(),
        quest_type: q.quest_type,
        difficulty: q.difficulty,
        question: q.question.clone(),
        choices: q.choices.clone(),
        created_at: q.created_at,

        user_answer: q.user_answer.clone(),
        score: q.score,
        solved: q.solved,
        correct_answer: if submitted { q.correct_answer.clone() } else { None },
        explanation: if submitted { Some(q.explanation.clone()) } else { None },
        cheat_flags: q.cheat_flags.clone(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct RequestQuestIn {
    pub subject: String,
    #[serde(default)]
    pub difficulty: Option<u8>,
}
#[derive(Debug, Serialize)]
pub struct QuestEnvelope {
    pub quest: QuestOut,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerIn {
    #[serde(rename = "questId")]
    pub quest_id: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub correct: bool,
    pub solved: bool,
    pub score: u8,
    pub cheat_flags: BTreeSet<CheatFlag>,
    pub explanation: String,
    pub next_difficulty: u8,
    pub xp_awarded: u64,
}
impl From<SubmitOutcome> for AnswerOut {
    fn from(o: SubmitOutcome) -> Self {
        Self {
            correct: o.correct,
            solved: o.solved,
            score: o.score,
            cheat_flags: o.cheat_flags,
            explanation: o.explanation,
            next_difficulty: o.next_difficulty,
            xp_awarded: o.xp_awarded,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefillOut {
    pub success: bool,
    pub remaining: u32,
}
impl From<RefillOutcome> for RefillOut {
    fn from(o: RefillOutcome) -> Self {
        Self { success: o.success, remaining: o.remaining }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOut {
    pub is_subscribed: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    pub subject: String,
    #[serde(default)]
    pub difficulty: Option<u8>,
}
#[derive(Debug, Serialize)]
pub struct GenerateOut {
    pub cached: bool,
    pub provider: &'static str,
    pub data: GeneratedQuest,
}
impl From<Preview> for GenerateOut {
    fn from(p: Preview) -> Self {
        Self { cached: p.cached, provider: p.provider, data: p.data }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub provider: &'static str,
}
