use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AssessmentStore, InsertOutcome, StoreError, StoreResult};
use crate::engine::navigation::Cursor;
use crate::metrics::track_db_operation;
use crate::models::answer::{Answer, AnswerRecord};
use crate::models::assessment::{Assessment, PillarScore};
use crate::models::draft::Draft;
use crate::models::question::{QuestionBank, QuestionOverride};
use crate::models::user::User;
use crate::utils::time::{bson_datetime_as_chrono, bson_datetime_as_chrono_option, chrono_to_bson};

const USERS: &str = "users";
const DRAFTS: &str = "drafts";
const ASSESSMENTS: &str = "assessments";
const QUESTION_OVERRIDES: &str = "question_overrides";
const SYSTEM_SETTINGS: &str = "system_settings";
const OVERRIDE_ID: &str = "current";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    email: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(rename = "marketingConsent", default)]
    marketing_consent: bool,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    updated_at: DateTime<Utc>,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            marketing_consent: user.marketing_consent,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id,
            email: doc.email,
            name: doc.name,
            phone: doc.phone,
            marketing_consent: doc.marketing_consent,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// One draft per user: `_id` is the user id.
#[derive(Debug, Serialize, Deserialize)]
struct DraftDocument {
    #[serde(rename = "_id")]
    user_id: String,
    #[serde(rename = "attemptId")]
    attempt_id: String,
    cursor: Cursor,
    answers: BTreeMap<String, Answer>,
    #[serde(rename = "bankVersion", default)]
    bank_version: u32,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
    #[serde(rename = "lastUpdated", with = "bson_datetime_as_chrono")]
    last_updated: DateTime<Utc>,
    #[serde(rename = "remindersSent", default)]
    reminders_sent: u32,
    #[serde(
        rename = "lastReminderSentAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    last_reminder_sent_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "lastReminderAttemptAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    last_reminder_attempt_at: Option<DateTime<Utc>>,
}

/// Draft fields written only on insert; afterwards the reminder batch owns
/// them through `$inc` / `$set`.
const DRAFT_INSERT_ONLY_FIELDS: [&str; 4] = [
    "createdAt",
    "remindersSent",
    "lastReminderSentAt",
    "lastReminderAttemptAt",
];

impl From<&Draft> for DraftDocument {
    fn from(draft: &Draft) -> Self {
        DraftDocument {
            user_id: draft.user_id.clone(),
            attempt_id: draft.attempt_id.clone(),
            cursor: draft.cursor,
            answers: draft.answers.clone(),
            bank_version: draft.bank_version,
            created_at: draft.created_at,
            last_updated: draft.last_updated,
            reminders_sent: draft.reminders_sent,
            last_reminder_sent_at: draft.last_reminder_sent_at,
            last_reminder_attempt_at: draft.last_reminder_attempt_at,
        }
    }
}

impl From<DraftDocument> for Draft {
    fn from(doc: DraftDocument) -> Self {
        Draft {
            attempt_id: doc.attempt_id,
            user_id: doc.user_id,
            cursor: doc.cursor,
            answers: doc.answers,
            bank_version: doc.bank_version,
            created_at: doc.created_at,
            last_updated: doc.last_updated,
            reminders_sent: doc.reminders_sent,
            last_reminder_sent_at: doc.last_reminder_sent_at,
            last_reminder_attempt_at: doc.last_reminder_attempt_at,
        }
    }
}

/// Assessment, pillar scores and answers embedded in one document so the
/// group is written atomically.
#[derive(Debug, Serialize, Deserialize)]
struct AssessmentDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "overallScore")]
    overall_score: f64,
    #[serde(rename = "pillarScores")]
    pillar_scores: Vec<PillarScore>,
    answers: Vec<AnswerRecord>,
    #[serde(rename = "bankVersion", default)]
    bank_version: u32,
    #[serde(rename = "completedAt", with = "bson_datetime_as_chrono")]
    completed_at: DateTime<Utc>,
}

impl From<&Assessment> for AssessmentDocument {
    fn from(a: &Assessment) -> Self {
        AssessmentDocument {
            id: a.id.clone(),
            user_id: a.user_id.clone(),
            overall_score: a.overall_score,
            pillar_scores: a.pillar_scores.clone(),
            answers: a.answers.clone(),
            bank_version: a.bank_version,
            completed_at: a.completed_at,
        }
    }
}

impl From<AssessmentDocument> for Assessment {
    fn from(doc: AssessmentDocument) -> Self {
        Assessment {
            id: doc.id,
            user_id: doc.user_id,
            overall_score: doc.overall_score,
            pillar_scores: doc.pillar_scores,
            answers: doc.answers,
            bank_version: doc.bank_version,
            completed_at: doc.completed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OverrideDocument {
    version: u32,
    bank: QuestionBank,
    #[serde(rename = "updatedBy")]
    updated_by: String,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    updated_at: DateTime<Utc>,
}

/// Settings rows are written with `$set`; only the value is read back.
#[derive(Debug, Serialize, Deserialize)]
struct SettingDocument {
    value: Bson,
}

fn unavailable(err: MongoError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn malformed(err: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(err.to_string())
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("Failed to create MongoDB client")?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        tracing::info!("Connected to MongoDB database {}", database);
        Ok(Self { db })
    }

    /// Unique indexes backing one-draft-per-user and unique emails.
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.db
            .collection::<Document>(USERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .context("Failed to create users.email index")?;

        self.db
            .collection::<Document>(DRAFTS)
            .create_index(IndexModel::builder().keys(doc! { "lastUpdated": 1 }).build())
            .await
            .context("Failed to create drafts.lastUpdated index")?;

        self.db
            .collection::<Document>(ASSESSMENTS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "userId": 1, "completedAt": -1 })
                    .build(),
            )
            .await
            .context("Failed to create assessments.userId index")?;

        self.db
            .collection::<Document>(SYSTEM_SETTINGS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "key": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .context("Failed to create system_settings.key index")?;

        Ok(())
    }

    fn users(&self) -> Collection<UserDocument> {
        self.db.collection(USERS)
    }

    fn drafts(&self) -> Collection<DraftDocument> {
        self.db.collection(DRAFTS)
    }

    fn assessments(&self) -> Collection<AssessmentDocument> {
        self.db.collection(ASSESSMENTS)
    }

    fn overrides(&self) -> Collection<OverrideDocument> {
        self.db.collection(QUESTION_OVERRIDES)
    }

    fn settings(&self) -> Collection<SettingDocument> {
        self.db.collection(SYSTEM_SETTINGS)
    }
}

#[async_trait]
impl AssessmentStore for MongoStore {
    async fn ping(&self) -> StoreResult<()> {
        track_db_operation("ping", "admin", async {
            self.db.run_command(doc! { "ping": 1 }).await.map_err(unavailable)?;
            Ok(())
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        track_db_operation("find_one", USERS, async {
            let found = self
                .users()
                .find_one(doc! { "email": email })
                .await
                .map_err(unavailable)?;
            Ok(found.map(User::from))
        })
        .await
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        track_db_operation("find_one", USERS, async {
            let found = self
                .users()
                .find_one(doc! { "_id": id })
                .await
                .map_err(unavailable)?;
            Ok(found.map(User::from))
        })
        .await
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        track_db_operation("insert_one", USERS, async {
            match self.users().insert_one(UserDocument::from(user)).await {
                Ok(_) => Ok(()),
                Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict),
                Err(e) => Err(unavailable(e)),
            }
        })
        .await
    }

    async fn count_users(&self) -> StoreResult<u64> {
        track_db_operation("count", USERS, async {
            self.users().count_documents(doc! {}).await.map_err(unavailable)
        })
        .await
    }

    async fn get_draft(&self, user_id: &str) -> StoreResult<Option<Draft>> {
        track_db_operation("find_one", DRAFTS, async {
            let found = self
                .drafts()
                .find_one(doc! { "_id": user_id })
                .await
                .map_err(unavailable)?;
            Ok(found.map(Draft::from))
        })
        .await
    }

    async fn upsert_draft(&self, draft: &Draft) -> StoreResult<()> {
        track_db_operation("update_one", DRAFTS, async {
            let mut fields =
                bson::to_document(&DraftDocument::from(draft)).map_err(malformed)?;
            fields.remove("_id");
            let mut on_insert = Document::new();
            for name in DRAFT_INSERT_ONLY_FIELDS {
                if let Some(value) = fields.remove(name) {
                    on_insert.insert(name, value);
                }
            }

            self.drafts()
                .update_one(
                    doc! { "_id": &draft.user_id },
                    doc! { "$set": fields, "$setOnInsert": on_insert },
                )
                .upsert(true)
                .await
                .map_err(unavailable)?;
            Ok(())
        })
        .await
    }

    async fn delete_draft(&self, user_id: &str) -> StoreResult<bool> {
        track_db_operation("delete_one", DRAFTS, async {
            let result = self
                .drafts()
                .delete_one(doc! { "_id": user_id })
                .await
                .map_err(unavailable)?;
            Ok(result.deleted_count > 0)
        })
        .await
    }

    async fn list_drafts(&self, limit: i64, offset: u64) -> StoreResult<Vec<Draft>> {
        track_db_operation("find", DRAFTS, async {
            let cursor = self
                .drafts()
                .find(doc! {})
                .sort(doc! { "lastUpdated": -1 })
                .skip(offset)
                .limit(limit)
                .await
                .map_err(unavailable)?;
            let docs: Vec<DraftDocument> = cursor.try_collect().await.map_err(unavailable)?;
            Ok(docs.into_iter().map(Draft::from).collect())
        })
        .await
    }

    async fn count_drafts(&self) -> StoreResult<u64> {
        track_db_operation("count", DRAFTS, async {
            self.drafts().count_documents(doc! {}).await.map_err(unavailable)
        })
        .await
    }

    async fn drafts_due_for_reminder(
        &self,
        cutoff: DateTime<Utc>,
        max_reminders: u32,
        limit: i64,
    ) -> StoreResult<Vec<Draft>> {
        track_db_operation("find", DRAFTS, async {
            let cutoff = chrono_to_bson(cutoff);
            let cursor = self
                .drafts()
                .find(doc! {
                    "lastUpdated": { "$lte": cutoff },
                    "remindersSent": { "$lt": i64::from(max_reminders) },
                    "$or": [
                        { "lastReminderAttemptAt": Bson::Null },
                        { "lastReminderAttemptAt": { "$lte": cutoff } },
                    ],
                })
                .sort(doc! { "lastUpdated": 1 })
                .limit(limit)
                .await
                .map_err(unavailable)?;
            let docs: Vec<DraftDocument> = cursor.try_collect().await.map_err(unavailable)?;
            Ok(docs.into_iter().map(Draft::from).collect())
        })
        .await
    }

    async fn record_reminder_sent(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        track_db_operation("update_one", DRAFTS, async {
            let result = self
                .drafts()
                .update_one(
                    doc! { "_id": user_id },
                    doc! {
                        "$inc": { "remindersSent": 1 },
                        "$set": {
                            "lastReminderSentAt": chrono_to_bson(at),
                            "lastReminderAttemptAt": chrono_to_bson(at),
                        },
                    },
                )
                .await
                .map_err(unavailable)?;
            if result.matched_count == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn record_reminder_failed(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        track_db_operation("update_one", DRAFTS, async {
            let result = self
                .drafts()
                .update_one(
                    doc! { "_id": user_id },
                    doc! { "$set": { "lastReminderAttemptAt": chrono_to_bson(at) } },
                )
                .await
                .map_err(unavailable)?;
            if result.matched_count == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn delete_drafts_updated_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        track_db_operation("delete_many", DRAFTS, async {
            let result = self
                .drafts()
                .delete_many(doc! { "lastUpdated": { "$lt": chrono_to_bson(cutoff) } })
                .await
                .map_err(unavailable)?;
            Ok(result.deleted_count)
        })
        .await
    }

    async fn insert_assessment(&self, assessment: &Assessment) -> StoreResult<InsertOutcome> {
        track_db_operation("insert_one", ASSESSMENTS, async {
            match self
                .assessments()
                .insert_one(AssessmentDocument::from(assessment))
                .await
            {
                Ok(_) => Ok(InsertOutcome::Created),
                Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::AlreadyExists),
                Err(e) => Err(unavailable(e)),
            }
        })
        .await
    }

    async fn get_assessment(&self, id: &str) -> StoreResult<Option<Assessment>> {
        track_db_operation("find_one", ASSESSMENTS, async {
            let found = self
                .assessments()
                .find_one(doc! { "_id": id })
                .await
                .map_err(unavailable)?;
            Ok(found.map(Assessment::from))
        })
        .await
    }

    async fn list_user_assessments(&self, user_id: &str) -> StoreResult<Vec<Assessment>> {
        track_db_operation("find", ASSESSMENTS, async {
            let cursor = self
                .assessments()
                .find(doc! { "userId": user_id })
                .sort(doc! { "completedAt": -1 })
                .await
                .map_err(unavailable)?;
            let docs: Vec<AssessmentDocument> = cursor.try_collect().await.map_err(unavailable)?;
            Ok(docs.into_iter().map(Assessment::from).collect())
        })
        .await
    }

    async fn list_assessments(&self, limit: i64, offset: u64) -> StoreResult<Vec<Assessment>> {
        track_db_operation("find", ASSESSMENTS, async {
            let cursor = self
                .assessments()
                .find(doc! {})
                .sort(doc! { "completedAt": -1 })
                .skip(offset)
                .limit(limit)
                .await
                .map_err(unavailable)?;
            let docs: Vec<AssessmentDocument> = cursor.try_collect().await.map_err(unavailable)?;
            Ok(docs.into_iter().map(Assessment::from).collect())
        })
        .await
    }

    async fn assessment_stats(&self) -> StoreResult<(u64, Option<f64>)> {
        track_db_operation("aggregate", ASSESSMENTS, async {
            let pipeline = vec![doc! {
                "$group": {
                    "_id": Bson::Null,
                    "count": { "$sum": 1 },
                    "avg": { "$avg": "$overallScore" },
                }
            }];
            let mut cursor = self
                .assessments()
                .aggregate(pipeline)
                .await
                .map_err(unavailable)?;
            let Some(group) = cursor.try_next().await.map_err(unavailable)? else {
                return Ok((0, None));
            };
            let count = match group.get("count") {
                Some(Bson::Int32(n)) => *n as u64,
                Some(Bson::Int64(n)) => *n as u64,
                _ => 0,
            };
            let avg = group.get_f64("avg").ok();
            Ok((count, avg))
        })
        .await
    }

    async fn get_question_override(&self) -> StoreResult<Option<QuestionOverride>> {
        track_db_operation("find_one", QUESTION_OVERRIDES, async {
            let found = self
                .overrides()
                .find_one(doc! { "_id": OVERRIDE_ID })
                .await
                .map_err(unavailable)?;
            Ok(found.map(|doc| QuestionOverride {
                version: doc.version,
                bank: doc.bank,
                updated_by: doc.updated_by,
                updated_at: doc.updated_at,
            }))
        })
        .await
    }

    async fn save_question_override(
        &self,
        bank: &QuestionBank,
        updated_by: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<QuestionOverride> {
        track_db_operation("find_one_and_update", QUESTION_OVERRIDES, async {
            let bank_bson = bson::to_bson(bank).map_err(malformed)?;
            let stored = self
                .overrides()
                .find_one_and_update(
                    doc! { "_id": OVERRIDE_ID },
                    doc! {
                        "$inc": { "version": 1 },
                        "$set": {
                            "bank": bank_bson,
                            "updatedBy": updated_by,
                            "updatedAt": chrono_to_bson(at),
                        },
                    },
                )
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await
                .map_err(unavailable)?
                .ok_or(StoreError::NotFound)?;
            Ok(QuestionOverride {
                version: stored.version,
                bank: stored.bank,
                updated_by: stored.updated_by,
                updated_at: stored.updated_at,
            })
        })
        .await
    }

    async fn delete_question_override(&self) -> StoreResult<bool> {
        track_db_operation("delete_one", QUESTION_OVERRIDES, async {
            let result = self
                .overrides()
                .delete_one(doc! { "_id": OVERRIDE_ID })
                .await
                .map_err(unavailable)?;
            Ok(result.deleted_count > 0)
        })
        .await
    }

    async fn get_setting(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        track_db_operation("find_one", SYSTEM_SETTINGS, async {
            let found = self
                .settings()
                .find_one(doc! { "key": key })
                .await
                .map_err(unavailable)?;
            found
                .map(|setting| bson::from_bson::<serde_json::Value>(setting.value).map_err(malformed))
                .transpose()
        })
        .await
    }

    async fn put_setting(
        &self,
        key: &str,
        value: serde_json::Value,
        updated_by: &str,
    ) -> StoreResult<()> {
        track_db_operation("update_one", SYSTEM_SETTINGS, async {
            let value = bson::to_bson(&value).map_err(malformed)?;
            self.settings()
                .update_one(
                    doc! { "key": key },
                    doc! {
                        "$set": {
                            "key": key,
                            "value": value,
                            "updatedBy": updated_by,
                            "updatedAt": chrono_to_bson(Utc::now()),
                        }
                    },
                )
                .upsert(true)
                .await
                .map_err(unavailable)?;
            Ok(())
        })
        .await
    }
}
