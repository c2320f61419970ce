use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::{ServiceError, ServiceResult};
use crate::metrics::{record_email, DRAFTS_ACTIVE, EXPORTS_GENERATED_TOTAL};
use crate::models::admin::{AdminStats, ExportFormat, ListQuery, Page};
use crate::models::assessment::{progress_points, Assessment, AssessmentSummary, ProgressPoint};
use crate::models::draft::DeliveryStatus;
use crate::models::settings::SiteSettings;
use crate::models::user::User;
use crate::services::email_service::{results_email, Mailer};
use crate::services::report_builder::{build_csv, build_xlsx, render_assessment_pdf, ExportRow};
use crate::services::system_settings_service::SystemSettingsService;
use crate::store::AssessmentStore;

/// Rendered export ready to be streamed back.
pub struct ExportFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

pub struct AssessmentService {
    store: Arc<dyn AssessmentStore>,
    mailer: Arc<dyn Mailer>,
}

impl AssessmentService {
    pub fn new(store: Arc<dyn AssessmentStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    pub async fn get_summary(&self, id: &str) -> ServiceResult<AssessmentSummary> {
        self.store
            .get_assessment(id)
            .await?
            .map(AssessmentSummary::from)
            .ok_or_else(|| ServiceError::not_found(format!("Assessment {} not found", id)))
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: &str) -> ServiceResult<Vec<Assessment>> {
        self.require_user(user_id).await?;
        Ok(self.store.list_user_assessments(user_id).await?)
    }

    pub async fn progress(&self, user_id: &str) -> ServiceResult<Vec<ProgressPoint>> {
        let assessments = self.list_for_user(user_id).await?;
        Ok(progress_points(&assessments))
    }

    pub async fn render_pdf(&self, id: &str) -> ServiceResult<Vec<u8>> {
        let summary = self.get_summary(id).await?;
        let user = self.store.get_user(&summary.assessment.user_id).await?;
        Ok(render_assessment_pdf(&summary, user.as_ref()))
    }

    /// Sends the results email with the PDF attached. Never fails: the
    /// outcome is reported and counted instead.
    pub async fn send_results_email(
        &self,
        user: &User,
        summary: &AssessmentSummary,
        site: &SiteSettings,
    ) -> DeliveryStatus {
        if !site.results_email_enabled || !self.mailer.enabled() {
            record_email("results", "skipped");
            return DeliveryStatus::Skipped;
        }

        let pdf = render_assessment_pdf(summary, Some(user));
        let email = results_email(user, summary, site, pdf);
        match self.mailer.send(email).await {
            Ok(()) => {
                record_email("results", "delivered");
                DeliveryStatus::Delivered
            }
            Err(err) => {
                tracing::error!(
                    assessment_id = %summary.assessment.id,
                    user_id = %user.id,
                    error = %format!("{err:#}"),
                    "Failed to send results email"
                );
                record_email("results", "failed");
                DeliveryStatus::Failed
            }
        }
    }

    /// Re-sends the results email on request. A failed send surfaces as a
    /// delivery error.
    pub async fn resend_results_email(
        &self,
        id: &str,
        config: &Config,
    ) -> ServiceResult<DeliveryStatus> {
        let summary = self.get_summary(id).await?;
        let user = self.require_user(&summary.assessment.user_id).await?;
        let site = SystemSettingsService::new(self.store.clone())
            .get_site_settings(config)
            .await?;

        match self.send_results_email(&user, &summary, &site).await {
            DeliveryStatus::Failed => Err(ServiceError::Delivery(format!(
                "Results email for assessment {} could not be delivered",
                id
            ))),
            status => Ok(status),
        }
    }

    pub async fn list_page(&self, query: &ListQuery) -> ServiceResult<Page<Assessment>> {
        let (limit, offset) = (query.limit(), query.offset());
        let items = self.store.list_assessments(limit, offset).await?;
        let (total, _) = self.store.assessment_stats().await?;
        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Every assessment, newest first, joined with its user.
    pub async fn export(&self, format: ExportFormat) -> ServiceResult<ExportFile> {
        let (total, _) = self.store.assessment_stats().await?;
        let assessments = self
            .store
            .list_assessments(i64::try_from(total).unwrap_or(i64::MAX).max(1), 0)
            .await?;

        let mut users: HashMap<String, User> = HashMap::new();
        for assessment in &assessments {
            if users.contains_key(&assessment.user_id) {
                continue;
            }
            if let Some(user) = self.store.get_user(&assessment.user_id).await? {
                users.insert(user.id.clone(), user);
            }
        }

        let rows: Vec<ExportRow<'_>> = assessments
            .iter()
            .map(|assessment| ExportRow {
                assessment,
                user: users.get(&assessment.user_id),
            })
            .collect();

        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        let file = match format {
            ExportFormat::Csv => ExportFile {
                bytes: build_csv(&rows),
                content_type: "text/csv; charset=utf-8",
                filename: format!("assessments-{}.csv", stamp),
            },
            ExportFormat::Xlsx => ExportFile {
                bytes: build_xlsx(&rows)
                    .map_err(|e| ServiceError::Delivery(format!("Failed to build XLSX: {e}")))?,
                content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                filename: format!("assessments-{}.xlsx", stamp),
            },
        };

        let label = match format {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        };
        EXPORTS_GENERATED_TOTAL.with_label_values(&[label]).inc();
        tracing::info!(format = label, rows = rows.len(), "Assessment export generated");
        Ok(file)
    }

    pub async fn stats(&self) -> ServiceResult<AdminStats> {
        let users = self.store.count_users().await?;
        let (assessments, average_overall_score) = self.store.assessment_stats().await?;
        let active_drafts = self.store.count_drafts().await?;
        DRAFTS_ACTIVE.set(i64::try_from(active_drafts).unwrap_or(i64::MAX));

        Ok(AdminStats {
            users,
            assessments,
            active_drafts,
            average_overall_score,
        })
    }

    async fn require_user(&self, user_id: &str) -> ServiceResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User {} not found", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pillar::Pillar;
    use crate::models::assessment::PillarScore;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::services::email_service::OutgoingEmail;

    struct CountingMailer {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for CountingMailer {
        async fn send(&self, _email: OutgoingEmail) -> anyhow::Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("smtp down");
            }
            Ok(())
        }
    }

    fn user(id: &str) -> User {
        let now = Utc::now();
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            name: "Jane".into(),
            phone: None,
            marketing_consent: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn assessment(id: &str, user_id: &str, overall: f64, days_ago: i64) -> Assessment {
        Assessment {
            id: id.into(),
            user_id: user_id.into(),
            overall_score: overall,
            pillar_scores: Pillar::ALL
                .iter()
                .map(|pillar| PillarScore {
                    pillar: *pillar,
                    score: overall,
                })
                .collect(),
            answers: Vec::new(),
            bank_version: 0,
            completed_at: Utc::now() - Duration::days(days_ago),
        }
    }

    async fn seeded(fail: bool) -> (AssessmentService, Arc<CountingMailer>) {
        let store = Arc::new(InMemoryStore::new());
        store.insert_user(&user("u1")).await.unwrap();
        store.insert_assessment(&assessment("a1", "u1", 4.0, 10)).await.unwrap();
        store.insert_assessment(&assessment("a2", "u1", 6.5, 1)).await.unwrap();
        let mailer = Arc::new(CountingMailer {
            sent: AtomicUsize::new(0),
            fail,
        });
        (AssessmentService::new(store, mailer.clone()), mailer)
    }

    #[tokio::test]
    async fn progress_is_chronological_with_deltas() {
        let (service, _) = seeded(false).await;
        let points = service.progress("u1").await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].assessment_id, "a1");
        assert_eq!(points[0].overall_delta, None);
        assert_eq!(points[1].overall_delta, Some(2.5));
    }

    #[tokio::test]
    async fn history_for_unknown_user_is_not_found() {
        let (service, _) = seeded(false).await;
        assert!(matches!(
            service.list_for_user("ghost").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn results_email_outcomes() {
        let (service, mailer) = seeded(false).await;
        let summary = service.get_summary("a1").await.unwrap();
        let mut site = SiteSettings::with_base_url("http://localhost:8080");

        assert_eq!(
            service.send_results_email(&user("u1"), &summary, &site).await,
            DeliveryStatus::Delivered
        );
        site.results_email_enabled = false;
        assert_eq!(
            service.send_results_email(&user("u1"), &summary, &site).await,
            DeliveryStatus::Skipped
        );
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 1);

        let (failing, _) = seeded(true).await;
        site.results_email_enabled = true;
        assert_eq!(
            failing.send_results_email(&user("u1"), &summary, &site).await,
            DeliveryStatus::Failed
        );
    }

    #[tokio::test]
    async fn resend_failure_is_a_delivery_error() {
        let (service, _) = seeded(true).await;
        let result = service.resend_results_email("a2", &Config::local()).await;
        assert!(matches!(result, Err(ServiceError::Delivery(_))));
    }

    #[tokio::test]
    async fn stats_and_export_cover_all_assessments() {
        let (service, _) = seeded(false).await;
        let stats = service.stats().await.unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.assessments, 2);
        assert_eq!(stats.active_drafts, 0);
        assert_eq!(stats.average_overall_score, Some(5.25));

        let export = service.export(ExportFormat::Csv).await.unwrap();
        let text = String::from_utf8(export.bytes).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("u1@example.com"));
        assert!(export.filename.ends_with(".csv"));
    }
}
