use serde::{Deserialize, Serialize};

use crate::engine::pillar::QuestionKey;
use crate::engine::scoring::RawScore;
use crate::models::question::Question;

/// One recorded answer: the chosen option and its normalized score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub option_id: String,
    #[serde(default)]
    pub option_index: usize,
    /// Raw score in `[0, 1]`.
    pub score: f64,
}

impl Answer {
    pub fn from_option(question: &Question, option_index: usize) -> Option<Self> {
        let option = question.options.get(option_index)?;
        Some(Answer {
            question_id: question.id.clone(),
            option_id: option.id.clone(),
            option_index,
            score: option.score.clamp(0.0, 1.0),
        })
    }
}

/// Score-only answer accepted by the stateless scoring endpoint. Other
/// fields sent by the client are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScoredAnswer {
    pub score: f64,
}

impl RawScore for ScoredAnswer {
    fn raw_score(&self) -> f64 {
        self.score
    }
}

/// Answer row persisted with a finalized assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub key: String,
    pub question_id: String,
    pub option_id: String,
    pub option_index: usize,
    pub score: f64,
}

impl AnswerRecord {
    pub fn new(key: &QuestionKey, answer: &Answer) -> Self {
        AnswerRecord {
            key: key.to_string(),
            question_id: answer.question_id.clone(),
            option_id: answer.option_id.clone(),
            option_index: answer.option_index,
            score: answer.score,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswerRequest {
    pub pillar_index: usize,
    pub question_index: usize,
    pub option_index: usize,
}
