use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::engine::navigation::Cursor;
use crate::engine::pillar::QuestionKey;
use crate::models::answer::Answer;
use crate::models::assessment::AssessmentSummary;
use crate::models::question::{Question, QuestionBank};

/// In-progress questionnaire attempt; at most one per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Becomes the finalized assessment id.
    pub attempt_id: String,
    pub user_id: String,
    pub cursor: Cursor,
    pub answers: BTreeMap<String, Answer>,
    pub bank_version: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub reminders_sent: u32,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    /// Last reminder attempt, delivered or not.
    #[serde(default)]
    pub last_reminder_attempt_at: Option<DateTime<Utc>>,
}

impl Draft {
    pub fn new(user_id: &str, cursor: Cursor, bank_version: u32, now: DateTime<Utc>) -> Self {
        Draft {
            attempt_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            cursor,
            answers: BTreeMap::new(),
            bank_version,
            created_at: now,
            last_updated: now,
            reminders_sent: 0,
            last_reminder_sent_at: None,
            last_reminder_attempt_at: None,
        }
    }

    /// Records or replaces the answer for `key` and refreshes `last_updated`.
    pub fn record_answer(&mut self, key: &QuestionKey, answer: Answer, now: DateTime<Utc>) {
        self.answers.insert(key.to_string(), answer);
        self.last_updated = now;
    }

    /// Carries the draft over to another bank version. Answers whose key,
    /// question id or option id no longer exist are dropped; surviving ones
    /// take the option's current index and score. A cursor left outside the
    /// bank moves to the first unanswered question. Returns how many answers
    /// were dropped.
    pub fn rebase(&mut self, bank: &QuestionBank, bank_version: u32) -> usize {
        let before = self.answers.len();
        let mut kept = BTreeMap::new();
        for key in bank.keys() {
            let id = key.to_string();
            let Some(previous) = self.answers.remove(&id) else {
                continue;
            };
            let Some(question) = bank.question(&key) else {
                continue;
            };
            if question.id != previous.question_id {
                continue;
            }
            let position = question
                .options
                .iter()
                .position(|option| option.id == previous.option_id);
            if let Some(answer) = position.and_then(|idx| Answer::from_option(question, idx)) {
                kept.insert(id, answer);
            }
        }
        self.answers = kept;
        self.bank_version = bank_version;

        if !self.cursor.is_valid(bank) {
            if let Some(cursor) = self
                .missing_keys(bank)
                .first()
                .map(Cursor::from_key)
                .or_else(|| Cursor::first(bank))
            {
                self.cursor = cursor;
            }
        }
        before - self.answers.len()
    }

    /// Answers restricted to the keys of `bank`.
    pub fn answers_in(&self, bank: &QuestionBank) -> BTreeMap<String, Answer> {
        bank.keys()
            .iter()
            .filter_map(|key| {
                let id = key.to_string();
                self.answers.get(&id).map(|answer| (id, answer.clone()))
            })
            .collect()
    }

    pub fn selected_option(&self, key: &QuestionKey) -> Option<usize> {
        self.answers
            .get(&key.to_string())
            .map(|answer| answer.option_index)
    }

    /// Keys of the bank that have no recorded answer, in questionnaire order.
    pub fn missing_keys(&self, bank: &QuestionBank) -> Vec<QuestionKey> {
        bank.keys()
            .into_iter()
            .filter(|key| !self.answers.contains_key(&key.to_string()))
            .collect()
    }

    pub fn answered_count(&self, bank: &QuestionBank) -> usize {
        bank.keys()
            .iter()
            .filter(|key| self.answers.contains_key(&key.to_string()))
            .count()
    }
}

/// What the questionnaire screen needs to render the current step.
#[derive(Debug, Clone, Serialize)]
pub struct DraftView {
    pub attempt_id: String,
    pub cursor: Cursor,
    pub question_key: Option<String>,
    pub question: Option<Question>,
    /// Option chosen earlier for the question at the cursor, if any.
    pub selected_option: Option<usize>,
    pub answered: usize,
    pub total_questions: usize,
    pub can_go_back: bool,
    pub answers: BTreeMap<String, Answer>,
    pub last_updated: DateTime<Utc>,
}

impl DraftView {
    pub fn build(draft: &Draft, bank: &QuestionBank) -> Self {
        let key = draft.cursor.key();
        DraftView {
            attempt_id: draft.attempt_id.clone(),
            cursor: draft.cursor,
            question_key: key.map(|k| k.to_string()),
            question: key.and_then(|k| bank.question(&k).cloned()),
            selected_option: key.and_then(|k| draft.selected_option(&k)),
            answered: draft.answered_count(bank),
            total_questions: bank.total_questions(),
            can_go_back: draft.cursor.previous(bank).is_some(),
            answers: draft.answers.clone(),
            last_updated: draft.last_updated,
        }
    }
}

/// Result of submitting an answer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    InProgress { draft: DraftView },
    Completed {
        summary: AssessmentSummary,
        results_email: DeliveryStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
    Skipped,
}

/// Admin listing row for an active draft.
#[derive(Debug, Clone, Serialize)]
pub struct DraftOverview {
    pub user_id: String,
    pub attempt_id: String,
    pub cursor: Cursor,
    pub answered: usize,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub reminders_sent: u32,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub last_reminder_attempt_at: Option<DateTime<Utc>>,
}

impl From<&Draft> for DraftOverview {
    fn from(draft: &Draft) -> Self {
        DraftOverview {
            user_id: draft.user_id.clone(),
            attempt_id: draft.attempt_id.clone(),
            cursor: draft.cursor,
            answered: draft.answers.len(),
            created_at: draft.created_at,
            last_updated: draft.last_updated,
            reminders_sent: draft.reminders_sent,
            last_reminder_sent_at: draft.last_reminder_sent_at,
            last_reminder_attempt_at: draft.last_reminder_attempt_at,
        }
    }
}
