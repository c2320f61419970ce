use chrono::Utc;
use std::sync::Arc;

use crate::config::Config;
use crate::engine::navigation::Cursor;
use crate::engine::pillar::{Pillar, QuestionKey};
use crate::engine::scoring::compute_scores;
use crate::errors::{ServiceError, ServiceResult};
use crate::metrics::{ANSWERS_RECORDED_TOTAL, ASSESSMENTS_FINALIZED_TOTAL};
use crate::models::admin::{ListQuery, Page};
use crate::models::answer::{Answer, SubmitAnswerRequest};
use crate::models::assessment::{Assessment, AssessmentSummary};
use crate::models::draft::{AnswerOutcome, Draft, DraftOverview, DraftView};
use crate::models::question::QuestionBank;
use crate::models::settings::SiteSettings;
use crate::services::assessment_service::AssessmentService;
use crate::services::email_service::Mailer;
use crate::services::question_bank_service::QuestionBankService;
use crate::services::system_settings_service::SystemSettingsService;
use crate::store::{AssessmentStore, InsertOutcome};

/// Walks a user's draft through answer, navigation and finalization.
pub struct DraftService {
    store: Arc<dyn AssessmentStore>,
    mailer: Arc<dyn Mailer>,
}

impl DraftService {
    pub fn new(store: Arc<dyn AssessmentStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    /// Records an answer and advances the cursor. Answering the last question
    /// with every question answered finalizes the draft into an assessment.
    pub async fn answer(
        &self,
        user_id: &str,
        req: SubmitAnswerRequest,
        config: &Config,
    ) -> ServiceResult<AnswerOutcome> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User {} not found", user_id)))?;
        let resolved = QuestionBankService::new(self.store.clone()).resolve().await?;
        let bank = &resolved.bank;

        let answered = Cursor::new(req.pillar_index, req.question_index);
        let (key, answer) = resolve_answer(bank, answered, req.option_index)?;

        let now = Utc::now();
        let mut draft = match self.store.get_draft(user_id).await? {
            Some(mut existing) => {
                rebase_if_stale(&mut existing, bank, resolved.version);
                existing
            }
            None => {
                tracing::info!(user_id, "Starting new draft");
                Draft::new(user_id, answered, resolved.version, now)
            }
        };
        draft.record_answer(&key, answer, now);
        ANSWERS_RECORDED_TOTAL.inc();

        if answered.is_last(bank) {
            let missing = draft.missing_keys(bank);
            match missing.first() {
                None => {
                    // Keep the final answer even if finalization fails below
                    draft.cursor = answered;
                    self.store.upsert_draft(&draft).await?;
                    let summary = self.finalize(&draft, bank).await?;
                    let site = SystemSettingsService::new(self.store.clone())
                        .get_site_settings(config)
                        .await
                        .unwrap_or_else(|err| {
                            tracing::warn!(error = %err, "Site settings unavailable; using defaults");
                            SiteSettings::with_base_url(&config.public_base_url)
                        });
                    let results_email = AssessmentService::new(self.store.clone(), self.mailer.clone())
                        .send_results_email(&user, &summary, &site)
                        .await;
                    return Ok(AnswerOutcome::Completed {
                        summary,
                        results_email,
                    });
                }
                Some(first_missing) => {
                    tracing::debug!(
                        user_id,
                        missing = missing.len(),
                        "Last question answered with gaps; moving to first unanswered"
                    );
                    draft.cursor = Cursor::from_key(first_missing);
                }
            }
        } else {
            draft.cursor = answered.next(bank).unwrap_or(answered);
        }

        self.store.upsert_draft(&draft).await?;
        Ok(AnswerOutcome::InProgress {
            draft: DraftView::build(&draft, bank),
        })
    }

    /// Scores the draft, stores the assessment under the draft's attempt id
    /// and deletes the draft. An assessment left by an earlier attempt is
    /// accepted so a retry only has to finish the delete. Only answers to
    /// questions of `bank` are scored.
    async fn finalize(
        &self,
        draft: &Draft,
        bank: &QuestionBank,
    ) -> ServiceResult<AssessmentSummary> {
        let answers = draft.answers_in(bank);
        let report = compute_scores(&answers);
        let assessment = Assessment::from_report(
            draft.attempt_id.clone(),
            draft.user_id.clone(),
            &report,
            &answers,
            draft.bank_version,
            Utc::now(),
        );

        let outcome = match self.store.insert_assessment(&assessment).await {
            Ok(outcome) => outcome,
            Err(err) => {
                ASSESSMENTS_FINALIZED_TOTAL.with_label_values(&["failed"]).inc();
                tracing::error!(
                    user_id = %draft.user_id,
                    attempt_id = %draft.attempt_id,
                    error = %err,
                    "Failed to persist assessment; draft kept"
                );
                return Err(err.into());
            }
        };

        let stored = match outcome {
            InsertOutcome::Created => assessment,
            InsertOutcome::AlreadyExists => {
                tracing::warn!(
                    attempt_id = %draft.attempt_id,
                    "Assessment already stored by an earlier attempt"
                );
                self.store
                    .get_assessment(&draft.attempt_id)
                    .await?
                    .unwrap_or(assessment)
            }
        };

        if let Err(err) = self.store.delete_draft(&draft.user_id).await {
            ASSESSMENTS_FINALIZED_TOTAL.with_label_values(&["failed"]).inc();
            tracing::error!(
                user_id = %draft.user_id,
                attempt_id = %draft.attempt_id,
                error = %err,
                "Assessment stored but draft delete failed"
            );
            return Err(err.into());
        }

        ASSESSMENTS_FINALIZED_TOTAL.with_label_values(&["completed"]).inc();
        tracing::info!(
            user_id = %stored.user_id,
            assessment_id = %stored.id,
            overall = stored.overall_score,
            "Assessment finalized"
        );
        Ok(AssessmentSummary::from(stored))
    }

    pub async fn resume(&self, user_id: &str) -> ServiceResult<DraftView> {
        let mut draft = self.require_draft(user_id).await?;
        let resolved = QuestionBankService::new(self.store.clone()).resolve().await?;
        rebase_if_stale(&mut draft, &resolved.bank, resolved.version);
        Ok(DraftView::build(&draft, &resolved.bank))
    }

    /// Moves the cursor one question back. `last_updated` is left alone.
    pub async fn previous(&self, user_id: &str) -> ServiceResult<DraftView> {
        let mut draft = self.require_draft(user_id).await?;
        let resolved = QuestionBankService::new(self.store.clone()).resolve().await?;
        let bank = &resolved.bank;
        rebase_if_stale(&mut draft, bank, resolved.version);

        let target = draft
            .cursor
            .previous(bank)
            .ok_or_else(|| ServiceError::validation("Already at the first question"))?;
        draft.cursor = target;
        self.store.upsert_draft(&draft).await?;

        Ok(DraftView::build(&draft, bank))
    }

    /// Throws away the in-progress draft so the user can start over.
    pub async fn discard(&self, user_id: &str) -> ServiceResult<()> {
        if !self.store.delete_draft(user_id).await? {
            return Err(ServiceError::not_found(format!(
                "No draft in progress for user {}",
                user_id
            )));
        }
        tracing::info!(user_id, "Draft discarded");
        Ok(())
    }

    pub async fn list_page(&self, query: &ListQuery) -> ServiceResult<Page<DraftOverview>> {
        let (limit, offset) = (query.limit(), query.offset());
        let drafts = self.store.list_drafts(limit, offset).await?;
        let total = self.store.count_drafts().await?;
        Ok(Page {
            items: drafts.iter().map(DraftOverview::from).collect(),
            total,
            limit,
            offset,
        })
    }

    async fn require_draft(&self, user_id: &str) -> ServiceResult<Draft> {
        self.store.get_draft(user_id).await?.ok_or_else(|| {
            ServiceError::not_found(format!("No draft in progress for user {}", user_id))
        })
    }
}

/// Brings a draft started under another bank version in line with `bank`.
fn rebase_if_stale(draft: &mut Draft, bank: &QuestionBank, version: u32) {
    if draft.bank_version == version {
        return;
    }
    let from_version = draft.bank_version;
    let dropped = draft.rebase(bank, version);
    tracing::info!(
        user_id = %draft.user_id,
        from_version,
        to_version = version,
        dropped,
        "Draft moved to the current question bank"
    );
}

fn resolve_answer(
    bank: &QuestionBank,
    cursor: Cursor,
    option_index: usize,
) -> ServiceResult<(QuestionKey, Answer)> {
    let pillar = Pillar::from_index(cursor.pillar_index).ok_or_else(|| {
        ServiceError::validation(format!("Unknown pillar index {}", cursor.pillar_index))
    })?;
    let key = QuestionKey::new(pillar, cursor.question_index);
    let question = bank
        .question(&key)
        .ok_or_else(|| ServiceError::validation(format!("Unknown question {}", key)))?;
    let answer = Answer::from_option(question, option_index).ok_or_else(|| {
        ServiceError::validation(format!(
            "Option {} is out of range for question {}",
            option_index, key
        ))
    })?;
    Ok((key, answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::default_bank;
    use crate::models::draft::DeliveryStatus;
    use crate::models::user::User;
    use crate::services::email_service::OutgoingEmail;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    struct NoopMailer;

    #[async_trait]
    impl Mailer for NoopMailer {
        async fn send(&self, _email: OutgoingEmail) -> anyhow::Result<()> {
            Ok(())
        }
    }

    async fn service() -> (DraftService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        store
            .insert_user(&User {
                id: "u1".into(),
                email: "u1@example.com".into(),
                name: "Jane".into(),
                phone: None,
                marketing_consent: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        (DraftService::new(store.clone(), Arc::new(NoopMailer)), store)
    }

    fn submit(pillar_index: usize, question_index: usize, option_index: usize) -> SubmitAnswerRequest {
        SubmitAnswerRequest {
            pillar_index,
            question_index,
            option_index,
        }
    }

    async fn answer_all(service: &DraftService, skip_last: bool) -> AnswerOutcome {
        let config = Config::local();
        let keys = default_bank().keys();
        let total = if skip_last { keys.len() - 1 } else { keys.len() };
        let mut last = None;
        for key in keys.into_iter().take(total) {
            let outcome = service
                .answer("u1", submit(key.pillar.index(), key.index, 4), &config)
                .await
                .unwrap();
            last = Some(outcome);
        }
        last.unwrap()
    }

    #[tokio::test]
    async fn first_answer_creates_draft_and_advances() {
        let (service, store) = service().await;
        let outcome = service
            .answer("u1", submit(0, 0, 2), &Config::local())
            .await
            .unwrap();

        let AnswerOutcome::InProgress { draft } = outcome else {
            panic!("expected in-progress draft");
        };
        assert_eq!(draft.cursor, Cursor::new(0, 1));
        assert_eq!(draft.answered, 1);

        let stored = store.get_draft("u1").await.unwrap().unwrap();
        assert_eq!(stored.reminders_sent, 0);
        assert_eq!(stored.answers["awareness-0"].score, 0.5);
    }

    #[tokio::test]
    async fn out_of_range_option_is_rejected() {
        let (service, store) = service().await;
        let result = service.answer("u1", submit(0, 0, 5), &Config::local()).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        let result = service.answer("u1", submit(8, 0, 0), &Config::local()).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(store.get_draft("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn previous_at_start_is_a_validation_error() {
        let (service, _) = service().await;
        service.answer("u1", submit(0, 0, 1), &Config::local()).await.unwrap();
        service.previous("u1").await.unwrap();
        assert!(matches!(
            service.previous("u1").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn answering_everything_finalizes() {
        let (service, store) = service().await;
        let outcome = answer_all(&service, false).await;
        let AnswerOutcome::Completed {
            summary,
            results_email,
        } = outcome
        else {
            panic!("expected completion");
        };
        assert_eq!(results_email, DeliveryStatus::Delivered);
        assert_eq!(summary.assessment.pillar_scores.len(), 8);
        assert_eq!(summary.assessment.answers.len(), 40);
        assert_eq!(summary.assessment.overall_score, 10.0);
        assert!(store.get_draft("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gaps_at_the_end_move_cursor_to_first_unanswered() {
        let (service, _) = service().await;
        let config = Config::local();
        service.answer("u1", submit(0, 0, 1), &config).await.unwrap();
        let outcome = service.answer("u1", submit(7, 4, 1), &config).await.unwrap();
        let AnswerOutcome::InProgress { draft } = outcome else {
            panic!("draft must stay active");
        };
        assert_eq!(draft.cursor, Cursor::new(0, 1));
    }

    #[tokio::test]
    async fn failed_persist_keeps_draft_and_retry_completes() {
        let (service, store) = service().await;
        answer_all(&service, true).await;
        store.fail_on("insert_assessment").await;

        let result = service.answer("u1", submit(7, 4, 0), &Config::local()).await;
        assert!(matches!(result, Err(ServiceError::Persistence(_))));
        let kept = store.get_draft("u1").await.unwrap().unwrap();
        assert_eq!(kept.answers.len(), 40);

        store.clear_failures().await;
        let retried = service.answer("u1", submit(7, 4, 0), &Config::local()).await.unwrap();
        let AnswerOutcome::Completed { summary, .. } = retried else {
            panic!("retry should finalize");
        };
        assert_eq!(summary.assessment.id, kept.attempt_id);
    }

    #[tokio::test]
    async fn failed_draft_delete_is_idempotent_on_retry() {
        let (service, store) = service().await;
        answer_all(&service, true).await;
        store.fail_on("delete_draft").await;

        let result = service.answer("u1", submit(7, 4, 3), &Config::local()).await;
        assert!(result.is_err());
        let kept = store.get_draft("u1").await.unwrap().unwrap();
        assert!(store.get_assessment(&kept.attempt_id).await.unwrap().is_some());

        store.clear_failures().await;
        service.answer("u1", submit(7, 4, 3), &Config::local()).await.unwrap();
        assert!(store.get_draft("u1").await.unwrap().is_none());
        assert_eq!(store.list_user_assessments("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bank_change_mid_draft_drops_stale_answers() {
        let (service, store) = service().await;
        let config = Config::local();
        for question in 0..5 {
            service.answer("u1", submit(0, question, 4), &config).await.unwrap();
        }

        let mut bank = default_bank();
        for entry in bank.pillars.iter_mut() {
            entry.questions.truncate(1);
        }
        bank.pillars[0].questions[0].id = "awareness-rewritten".into();
        QuestionBankService::new(store.clone())
            .save_override(bank, "admin@example.com")
            .await
            .unwrap();

        for pillar in 1..7 {
            service.answer("u1", submit(pillar, 0, 4), &config).await.unwrap();
        }
        let stored = store.get_draft("u1").await.unwrap().unwrap();
        assert_eq!(stored.bank_version, 1);
        assert_eq!(stored.answers.len(), 6);
        assert!(!stored.answers.contains_key("awareness-0"));

        // The replaced question still has to be answered
        let outcome = service.answer("u1", submit(7, 0, 4), &config).await.unwrap();
        let AnswerOutcome::InProgress { draft } = outcome else {
            panic!("awareness-0 is still open");
        };
        assert_eq!(draft.cursor, Cursor::new(0, 0));

        service.answer("u1", submit(0, 0, 2), &config).await.unwrap();
        let outcome = service.answer("u1", submit(7, 0, 4), &config).await.unwrap();
        let AnswerOutcome::Completed { summary, .. } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(summary.assessment.answers.len(), 8);
        assert_eq!(summary.assessment.bank_version, 1);
        let awareness = summary
            .assessment
            .pillar_scores
            .iter()
            .find(|score| score.pillar == Pillar::Awareness)
            .unwrap();
        assert_eq!(awareness.score, 5.0);
    }

    #[tokio::test]
    async fn resume_after_bank_change_moves_cursor_into_new_bank() {
        let (service, store) = service().await;
        let config = Config::local();
        for question in 0..4 {
            service.answer("u1", submit(0, question, 1), &config).await.unwrap();
        }

        let mut bank = default_bank();
        bank.pillars[0].questions.truncate(2);
        QuestionBankService::new(store.clone())
            .save_override(bank, "admin@example.com")
            .await
            .unwrap();

        let view = service.resume("u1").await.unwrap();
        assert_eq!(view.cursor, Cursor::new(1, 0));
        assert_eq!(view.answered, 2);
    }

    #[tokio::test]
    async fn discard_removes_draft() {
        let (service, store) = service().await;
        service.answer("u1", submit(0, 0, 1), &Config::local()).await.unwrap();
        service.discard("u1").await.unwrap();
        assert!(store.get_draft("u1").await.unwrap().is_none());
        assert!(matches!(
            service.discard("u1").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
