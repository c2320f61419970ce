//! Persistence boundary for users, drafts, assessments, question overrides
//! and settings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::Config;
use crate::models::assessment::Assessment;
use crate::models::draft::Draft;
use crate::models::question::{QuestionBank, QuestionOverride};
use crate::models::user::User;

pub mod memory;
pub mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is malformed: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// An assessment with the same id was stored by an earlier attempt.
    AlreadyExists,
}

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // users
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn get_user(&self, id: &str) -> StoreResult<Option<User>>;
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn count_users(&self) -> StoreResult<u64>;

    // drafts, keyed by user id
    async fn get_draft(&self, user_id: &str) -> StoreResult<Option<Draft>>;
    async fn upsert_draft(&self, draft: &Draft) -> StoreResult<()>;
    async fn delete_draft(&self, user_id: &str) -> StoreResult<bool>;
    async fn list_drafts(&self, limit: i64, offset: u64) -> StoreResult<Vec<Draft>>;
    async fn count_drafts(&self) -> StoreResult<u64>;
    /// Drafts idle since `cutoff`, with fewer than `max_reminders` reminders
    /// and no reminder attempt after `cutoff`, oldest first.
    async fn drafts_due_for_reminder(
        &self,
        cutoff: DateTime<Utc>,
        max_reminders: u32,
        limit: i64,
    ) -> StoreResult<Vec<Draft>>;
    /// Increments the reminder counter and stamps the attempt without
    /// touching `last_updated`.
    async fn record_reminder_sent(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()>;
    /// Stamps a failed reminder attempt; the counter is unchanged.
    async fn record_reminder_failed(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()>;
    async fn delete_drafts_updated_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    // assessments
    async fn insert_assessment(&self, assessment: &Assessment) -> StoreResult<InsertOutcome>;
    async fn get_assessment(&self, id: &str) -> StoreResult<Option<Assessment>>;
    /// Newest first.
    async fn list_user_assessments(&self, user_id: &str) -> StoreResult<Vec<Assessment>>;
    /// Newest first.
    async fn list_assessments(&self, limit: i64, offset: u64) -> StoreResult<Vec<Assessment>>;
    /// Count and mean overall score.
    async fn assessment_stats(&self) -> StoreResult<(u64, Option<f64>)>;

    // question bank override
    async fn get_question_override(&self) -> StoreResult<Option<QuestionOverride>>;
    /// Stores `bank` as the next override version.
    async fn save_question_override(
        &self,
        bank: &QuestionBank,
        updated_by: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<QuestionOverride>;
    async fn delete_question_override(&self) -> StoreResult<bool>;

    // settings
    async fn get_setting(&self, key: &str) -> StoreResult<Option<serde_json::Value>>;
    async fn put_setting(
        &self,
        key: &str,
        value: serde_json::Value,
        updated_by: &str,
    ) -> StoreResult<()>;
}

/// Builds the store selected by `storage_backend`.
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn AssessmentStore>> {
    match config.storage_backend.as_str() {
        "memory" => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        _ => {
            let store = MongoStore::connect(&config.mongo_uri, &config.mongo_database).await?;
            store.ensure_indexes().await?;
            Ok(Arc::new(store))
        }
    }
}
