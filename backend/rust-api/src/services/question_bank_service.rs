use chrono::Utc;
use std::sync::Arc;

use crate::engine::catalog::default_bank;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::question::{BankSource, QuestionBank, QuestionOverride, ResolvedBank};
use crate::store::AssessmentStore;

pub struct QuestionBankService {
    store: Arc<dyn AssessmentStore>,
}

impl QuestionBankService {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    /// The stored override when present and valid, else the built-in catalog.
    pub async fn resolve(&self) -> ServiceResult<ResolvedBank> {
        let stored = self.store.get_question_override().await?;
        Ok(resolve_override(stored))
    }

    pub async fn save_override(
        &self,
        bank: QuestionBank,
        updated_by: &str,
    ) -> ServiceResult<QuestionOverride> {
        let bank = bank.normalized();
        if let Err(problems) = bank.validate() {
            return Err(ServiceError::validation(format!(
                "Invalid question bank: {}",
                problems.join("; ")
            )));
        }

        let stored = self
            .store
            .save_question_override(&bank, updated_by, Utc::now())
            .await?;
        tracing::info!(
            version = stored.version,
            updated_by,
            total_questions = bank.total_questions(),
            "Question bank override saved"
        );
        Ok(stored)
    }

    /// Reverts to the built-in catalog. Returns whether an override existed.
    pub async fn clear_override(&self, updated_by: &str) -> ServiceResult<bool> {
        let removed = self.store.delete_question_override().await?;
        if removed {
            tracing::info!(updated_by, "Question bank override removed");
        }
        Ok(removed)
    }
}

fn resolve_override(stored: Option<QuestionOverride>) -> ResolvedBank {
    match stored {
        Some(entry) => match entry.bank.validate() {
            Ok(()) => ResolvedBank {
                bank: entry.bank.normalized(),
                source: BankSource::Override,
                version: entry.version,
                updated_at: Some(entry.updated_at),
            },
            Err(problems) => {
                tracing::warn!(
                    version = entry.version,
                    problems = %problems.join("; "),
                    "Stored question override is invalid; serving default bank"
                );
                built_in()
            }
        },
        None => built_in(),
    }
}

fn built_in() -> ResolvedBank {
    ResolvedBank {
        bank: default_bank(),
        source: BankSource::Default,
        version: 0,
        updated_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pillar::Pillar;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn default_bank_is_served_without_override() {
        let service = QuestionBankService::new(Arc::new(InMemoryStore::new()));
        let resolved = service.resolve().await.unwrap();
        assert_eq!(resolved.source, BankSource::Default);
        assert_eq!(resolved.bank.total_questions(), 40);
    }

    #[tokio::test]
    async fn valid_override_takes_precedence() {
        let service = QuestionBankService::new(Arc::new(InMemoryStore::new()));
        let mut bank = default_bank();
        bank.pillars[0].questions[0].text = "How well do you know your monthly spending?".into();
        bank.pillars[3].questions.truncate(2);

        let stored = service.save_override(bank, "admin@example.com").await.unwrap();
        assert_eq!(stored.version, 1);

        let resolved = service.resolve().await.unwrap();
        assert_eq!(resolved.source, BankSource::Override);
        assert_eq!(resolved.version, 1);
        assert_eq!(resolved.bank.questions(Pillar::Mindsets).len(), 2);
        assert_eq!(resolved.bank.total_questions(), 37);
    }

    #[tokio::test]
    async fn invalid_override_is_rejected_on_write() {
        let service = QuestionBankService::new(Arc::new(InMemoryStore::new()));
        let mut bank = default_bank();
        bank.pillars[2].questions[1].options.pop();
        bank.pillars.remove(5);

        let err = service.save_override(bank, "admin").await.unwrap_err();
        match err {
            ServiceError::Validation(message) => {
                assert!(message.contains("liabilities"));
                assert!(message.contains("expected 5"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_stored_override_falls_back_to_default() {
        let store = Arc::new(InMemoryStore::new());
        let mut broken = default_bank();
        broken.pillars[1].questions.clear();
        store
            .save_question_override(&broken, "legacy", Utc::now())
            .await
            .unwrap();

        let service = QuestionBankService::new(store);
        let resolved = service.resolve().await.unwrap();
        assert_eq!(resolved.source, BankSource::Default);
        assert_eq!(resolved.bank, default_bank());
    }

    #[tokio::test]
    async fn clearing_reverts_to_default() {
        let service = QuestionBankService::new(Arc::new(InMemoryStore::new()));
        service.save_override(default_bank(), "admin").await.unwrap();
        assert!(service.clear_override("admin").await.unwrap());
        assert!(!service.clear_override("admin").await.unwrap());
        assert_eq!(service.resolve().await.unwrap().source, BankSource::Default);
    }
}
