//! Placeholder backend used when no provider key is configured.
//! Keeps the service usable end to end without network access.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{ContentGenerator, GeneratedQuest, GenerationRequest};
use crate::error::GenerationError;

#[derive(Debug, Default)]
pub struct OfflineGenerator {
  // Numbering keeps repeated placeholders distinct so they never share a fingerprint.
  counter: AtomicU64,
}

#[async_trait]
impl ContentGenerator for OfflineGenerator {
  fn provider(&self) -> &'static str { "offline" }

  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedQuest, GenerationError> {
    let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
    Ok(GeneratedQuest {
      question: format!(
        "Placeholder question #{} about {} (difficulty {}): what is six times seven?",
        n, req.subject, req.difficulty
      ),
      choices: vec!["42".into(), "48".into(), "36".into()],
      correct_answer: Some("42".into()),
      explanation: "Placeholder explanation: 6 x 7 = 42.".into(),
      quest_type: Some(req.quest_type),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuestType;

  #[tokio::test]
  async fn placeholders_are_gradable_and_distinct() {
    let g = OfflineGenerator::default();
    let req = GenerationRequest { subject: "algebra".into(), difficulty: 2, quest_type: QuestType::MicroQuiz };
    let a = g.generate(&req).await.unwrap();
    let b = g.generate(&req).await.unwrap();
    assert_eq!(a.correct_answer.as_deref(), Some("42"));
    assert_ne!(a.question, b.question);
    assert!(a.question.contains("algebra"));
  }
}
