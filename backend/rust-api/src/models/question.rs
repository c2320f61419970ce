use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::pillar::{Pillar, QuestionKey};

pub const OPTIONS_PER_QUESTION: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    /// Normalized score in `[0, 1]`.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarQuestions {
    pub pillar: Pillar,
    pub questions: Vec<Question>,
}

/// Ordered catalog: one entry per pillar, in `Pillar::ALL` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub pillars: Vec<PillarQuestions>,
}

impl QuestionBank {
    pub fn questions(&self, pillar: Pillar) -> &[Question] {
        self.pillars
            .iter()
            .find(|entry| entry.pillar == pillar)
            .map(|entry| entry.questions.as_slice())
            .unwrap_or(&[])
    }

    pub fn question_count(&self, pillar_index: usize) -> usize {
        Pillar::from_index(pillar_index)
            .map(|pillar| self.questions(pillar).len())
            .unwrap_or(0)
    }

    pub fn question(&self, key: &QuestionKey) -> Option<&Question> {
        self.questions(key.pillar).get(key.index)
    }

    pub fn total_questions(&self) -> usize {
        self.pillars.iter().map(|entry| entry.questions.len()).sum()
    }

    /// Every question key in questionnaire order.
    pub fn keys(&self) -> Vec<QuestionKey> {
        Pillar::ALL
            .iter()
            .flat_map(|pillar| {
                (0..self.questions(*pillar).len()).map(move |idx| QuestionKey::new(*pillar, idx))
            })
            .collect()
    }

    /// Structural checks applied before an admin override is stored.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        for pillar in Pillar::ALL {
            let count = self.pillars.iter().filter(|e| e.pillar == pillar).count();
            match count {
                0 => problems.push(format!("pillar '{}' is missing", pillar)),
                1 => {}
                _ => problems.push(format!("pillar '{}' appears {} times", pillar, count)),
            }
        }

        for entry in &self.pillars {
            if entry.questions.is_empty() {
                problems.push(format!("pillar '{}' has no questions", entry.pillar));
            }
            for (q_idx, question) in entry.questions.iter().enumerate() {
                let label = format!("{}-{}", entry.pillar, q_idx);
                if question.id.trim().is_empty() {
                    problems.push(format!("question {} has an empty id", label));
                }
                if question.text.trim().is_empty() {
                    problems.push(format!("question {} has empty text", label));
                }
                if question.options.len() != OPTIONS_PER_QUESTION {
                    problems.push(format!(
                        "question {} has {} options, expected {}",
                        label,
                        question.options.len(),
                        OPTIONS_PER_QUESTION
                    ));
                }
                for (o_idx, option) in question.options.iter().enumerate() {
                    if option.text.trim().is_empty() {
                        problems.push(format!("option {} of question {} has empty text", o_idx, label));
                    }
                    if !(0.0..=1.0).contains(&option.score) {
                        problems.push(format!(
                            "option {} of question {} has score {} outside [0, 1]",
                            o_idx, label, option.score
                        ));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Returns a copy with pillars sorted into canonical order.
    pub fn normalized(mut self) -> Self {
        self.pillars.sort_by_key(|entry| entry.pillar);
        self
    }
}

/// Admin-maintained replacement for the built-in catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOverride {
    pub version: u32,
    pub bank: QuestionBank,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankSource {
    Default,
    Override,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionBankResponse {
    pub source: BankSource,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub total_questions: usize,
    pub pillars: Vec<PillarQuestions>,
}

/// Effective bank plus where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedBank {
    pub bank: QuestionBank,
    pub source: BankSource,
    /// 0 for the built-in catalog.
    pub version: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ResolvedBank> for QuestionBankResponse {
    fn from(resolved: ResolvedBank) -> Self {
        QuestionBankResponse {
            source: resolved.source,
            version: resolved.version,
            updated_at: resolved.updated_at,
            total_questions: resolved.bank.total_questions(),
            pillars: resolved.bank.pillars,
        }
    }
}
