use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use super::{AssessmentStore, InsertOutcome, StoreError, StoreResult};
use crate::engine::lifecycle::{mark_reminder_failed, mark_reminder_sent};
use crate::models::assessment::Assessment;
use crate::models::draft::Draft;
use crate::models::question::{QuestionBank, QuestionOverride};
use crate::models::user::User;

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    drafts: BTreeMap<String, Draft>,
    assessments: BTreeMap<String, Assessment>,
    question_override: Option<QuestionOverride>,
    settings: BTreeMap<String, serde_json::Value>,
}

/// Process-local store for tests and local runs.
///
/// Operations named through [`InMemoryStore::fail_on`] return
/// `StoreError::Unavailable` until [`InMemoryStore::clear_failures`] is called.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    failing: RwLock<HashSet<&'static str>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_on(&self, operation: &'static str) {
        self.failing.write().await.insert(operation);
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    async fn check(&self, operation: &'static str) -> StoreResult<()> {
        if self.failing.read().await.contains(operation) {
            return Err(StoreError::Unavailable(format!("{} failed (injected)", operation)));
        }
        Ok(())
    }
}

fn page<T: Clone>(items: Vec<&T>, limit: i64, offset: u64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl AssessmentStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check("ping").await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.check("find_user_by_email").await?;
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        self.check("get_user").await?;
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.check("insert_user").await?;
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) || tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict);
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        self.check("count_users").await?;
        Ok(self.tables.read().await.users.len() as u64)
    }

    async fn get_draft(&self, user_id: &str) -> StoreResult<Option<Draft>> {
        self.check("get_draft").await?;
        Ok(self.tables.read().await.drafts.get(user_id).cloned())
    }

    async fn upsert_draft(&self, draft: &Draft) -> StoreResult<()> {
        self.check("upsert_draft").await?;
        let mut tables = self.tables.write().await;
        let mut next = draft.clone();
        // Reminder bookkeeping is owned by the reminder batch
        if let Some(current) = tables.drafts.get(&draft.user_id) {
            next.reminders_sent = current.reminders_sent;
            next.last_reminder_sent_at = current.last_reminder_sent_at;
            next.last_reminder_attempt_at = current.last_reminder_attempt_at;
        }
        tables.drafts.insert(draft.user_id.clone(), next);
        Ok(())
    }

    async fn delete_draft(&self, user_id: &str) -> StoreResult<bool> {
        self.check("delete_draft").await?;
        Ok(self.tables.write().await.drafts.remove(user_id).is_some())
    }

    async fn list_drafts(&self, limit: i64, offset: u64) -> StoreResult<Vec<Draft>> {
        self.check("list_drafts").await?;
        let tables = self.tables.read().await;
        let mut drafts: Vec<&Draft> = tables.drafts.values().collect();
        drafts.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(page(drafts, limit, offset))
    }

    async fn count_drafts(&self) -> StoreResult<u64> {
        self.check("count_drafts").await?;
        Ok(self.tables.read().await.drafts.len() as u64)
    }

    async fn drafts_due_for_reminder(
        &self,
        cutoff: DateTime<Utc>,
        max_reminders: u32,
        limit: i64,
    ) -> StoreResult<Vec<Draft>> {
        self.check("drafts_due_for_reminder").await?;
        let tables = self.tables.read().await;
        let mut due: Vec<&Draft> = tables
            .drafts
            .values()
            .filter(|d| {
                d.last_updated <= cutoff
                    && d.reminders_sent < max_reminders
                    && d.last_reminder_attempt_at.map_or(true, |at| at <= cutoff)
            })
            .collect();
        due.sort_by_key(|d| d.last_updated);
        Ok(page(due, limit, 0))
    }

    async fn record_reminder_sent(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.check("record_reminder_sent").await?;
        let mut tables = self.tables.write().await;
        let draft = tables.drafts.get_mut(user_id).ok_or(StoreError::NotFound)?;
        mark_reminder_sent(draft, at);
        Ok(())
    }

    async fn record_reminder_failed(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.check("record_reminder_failed").await?;
        let mut tables = self.tables.write().await;
        let draft = tables.drafts.get_mut(user_id).ok_or(StoreError::NotFound)?;
        mark_reminder_failed(draft, at);
        Ok(())
    }

    async fn delete_drafts_updated_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        self.check("delete_drafts_updated_before").await?;
        let mut tables = self.tables.write().await;
        let before = tables.drafts.len();
        tables.drafts.retain(|_, d| d.last_updated >= cutoff);
        Ok((before - tables.drafts.len()) as u64)
    }

    async fn insert_assessment(&self, assessment: &Assessment) -> StoreResult<InsertOutcome> {
        self.check("insert_assessment").await?;
        let mut tables = self.tables.write().await;
        if tables.assessments.contains_key(&assessment.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        tables
            .assessments
            .insert(assessment.id.clone(), assessment.clone());
        Ok(InsertOutcome::Created)
    }

    async fn get_assessment(&self, id: &str) -> StoreResult<Option<Assessment>> {
        self.check("get_assessment").await?;
        Ok(self.tables.read().await.assessments.get(id).cloned())
    }

    async fn list_user_assessments(&self, user_id: &str) -> StoreResult<Vec<Assessment>> {
        self.check("list_user_assessments").await?;
        let tables = self.tables.read().await;
        let mut list: Vec<Assessment> = tables
            .assessments
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(list)
    }

    async fn list_assessments(&self, limit: i64, offset: u64) -> StoreResult<Vec<Assessment>> {
        self.check("list_assessments").await?;
        let tables = self.tables.read().await;
        let mut list: Vec<&Assessment> = tables.assessments.values().collect();
        list.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(page(list, limit, offset))
    }

    async fn assessment_stats(&self) -> StoreResult<(u64, Option<f64>)> {
        self.check("assessment_stats").await?;
        let tables = self.tables.read().await;
        let count = tables.assessments.len() as u64;
        if count == 0 {
            return Ok((0, None));
        }
        let sum: f64 = tables.assessments.values().map(|a| a.overall_score).sum();
        Ok((count, Some(sum / count as f64)))
    }

    async fn get_question_override(&self) -> StoreResult<Option<QuestionOverride>> {
        self.check("get_question_override").await?;
        Ok(self.tables.read().await.question_override.clone())
    }

    async fn save_question_override(
        &self,
        bank: &QuestionBank,
        updated_by: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<QuestionOverride> {
        self.check("save_question_override").await?;
        let mut tables = self.tables.write().await;
        let version = tables
            .question_override
            .as_ref()
            .map(|o| o.version + 1)
            .unwrap_or(1);
        let stored = QuestionOverride {
            version,
            bank: bank.clone(),
            updated_by: updated_by.to_string(),
            updated_at: at,
        };
        tables.question_override = Some(stored.clone());
        Ok(stored)
    }

    async fn delete_question_override(&self) -> StoreResult<bool> {
        self.check("delete_question_override").await?;
        Ok(self.tables.write().await.question_override.take().is_some())
    }

    async fn get_setting(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        self.check("get_setting").await?;
        Ok(self.tables.read().await.settings.get(key).cloned())
    }

    async fn put_setting(
        &self,
        key: &str,
        value: serde_json::Value,
        _updated_by: &str,
    ) -> StoreResult<()> {
        self.check("put_setting").await?;
        self.tables
            .write()
            .await
            .settings
            .insert(key.to_string(), value);
        Ok(())
    }
}
