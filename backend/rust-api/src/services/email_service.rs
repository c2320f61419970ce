use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::engine::pillar::Pillar;
use crate::models::assessment::AssessmentSummary;
use crate::models::draft::Draft;
use crate::models::settings::{EmailSettings, SiteSettings};
use crate::models::user::User;
use crate::services::system_settings_service::SystemSettingsService;
use crate::store::AssessmentStore;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Rendered message independent of the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<(String, Vec<u8>)>,
}

/// Outbound mail boundary. Sends are awaited so callers can count outcomes.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// `false` when delivery is switched off for this process.
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

pub fn sending_disabled() -> bool {
    std::env::var("EMAIL_SEND_DISABLED")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn results_email(
    user: &User,
    summary: &AssessmentSummary,
    site: &SiteSettings,
    pdf: Vec<u8>,
) -> OutgoingEmail {
    let assessment = &summary.assessment;
    let mut body = format!(
        "Hello {},\n\nThank you for completing the {}.\n\nOverall score: {:.1} / 10\n\n",
        user.name, site.site_name, assessment.overall_score
    );
    for pillar in Pillar::ALL {
        body.push_str(&format!(
            "  {:<12} {:.1}\n",
            pillar.label(),
            assessment.pillar_score(pillar)
        ));
    }
    body.push_str(&format!(
        "\nYour full report with recommendations is attached. You can also view it at {}/results/{}\n\nQuestions? Contact us at {}.\n",
        site.public_base_url.trim_end_matches('/'),
        assessment.id,
        site.contact_email
    ));

    OutgoingEmail {
        to_email: user.email.clone(),
        to_name: user.name.clone(),
        subject: format!("Your {} results", site.site_name),
        body,
        attachment: Some((format!("assessment-{}.pdf", assessment.id), pdf)),
    }
}

pub fn reminder_email(user: &User, draft: &Draft, days_idle: i64, site: &SiteSettings) -> OutgoingEmail {
    let body = format!(
        "Hello {},\n\nYou started the {} {} day(s) ago and answered {} question(s) so far.\nPick up where you left off: {}/assessment\n\nIf you would rather start over, you can discard your progress from the same page.\n",
        user.name,
        site.site_name,
        days_idle,
        draft.answers.len(),
        site.public_base_url.trim_end_matches('/'),
    );

    OutgoingEmail {
        to_email: user.email.clone(),
        to_name: user.name.clone(),
        subject: format!("Finish your {}", site.site_name),
        body,
        attachment: None,
    }
}

/// SMTP delivery configured from the stored `email` settings.
pub struct SmtpMailer {
    store: Arc<dyn AssessmentStore>,
    retry: RetryConfig,
}

impl SmtpMailer {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::smtp(),
        }
    }

    async fn load_email_settings(&self) -> Result<EmailSettings> {
        SystemSettingsService::new(self.store.clone())
            .get_email_settings()
            .await
            .map_err(|e| anyhow!("Failed to load email settings: {e}"))?
            .ok_or_else(|| anyhow!("Email settings are not configured"))
    }

    fn build_message(settings: &EmailSettings, email: &OutgoingEmail) -> Result<Message> {
        let from_address: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .context("Invalid from email address")?;
        let to_address: Mailbox = format!("{} <{}>", email.to_name, email.to_email)
            .parse()
            .context("Invalid recipient email address")?;

        let builder = Message::builder()
            .from(from_address)
            .to(to_address)
            .subject(email.subject.clone());

        let message = match &email.attachment {
            Some((filename, bytes)) => {
                let content_type =
                    ContentType::parse("application/pdf").context("Invalid attachment type")?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(email.body.clone()))
                        .singlepart(Attachment::new(filename.clone()).body(bytes.clone(), content_type)),
                )
            }
            None => builder.body(email.body.clone()),
        };

        message.context("Failed to build email message")
    }

    fn build_transport(settings: &EmailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(settings.login.clone(), settings.password.clone());

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .context("Invalid SMTP server for TLS")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        }
        .port(settings.port)
        .credentials(creds);

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn enabled(&self) -> bool {
        !sending_disabled()
    }

    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let settings = self.load_email_settings().await?;
        let message = Self::build_message(&settings, &email)?;
        let transport = Self::build_transport(&settings)?;

        retry_async_with_config(self.retry.clone(), || {
            let transport = &transport;
            let message = message.clone();
            async move { transport.send(message).await }
        })
        .await
        .with_context(|| format!("Failed to send email to {}", email.to_email))?;

        tracing::info!(to = %email.to_email, subject = %email.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::navigation::Cursor;
    use crate::models::assessment::{Assessment, PillarScore};
    use chrono::Utc;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: "u1".into(),
            email: "jane@example.com".into(),
            name: "Jane".into(),
            phone: None,
            marketing_consent: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn results_email_lists_every_pillar_and_attaches_pdf() {
        let assessment = Assessment {
            id: "a1".into(),
            user_id: "u1".into(),
            overall_score: 6.5,
            pillar_scores: Pillar::ALL
                .iter()
                .map(|pillar| PillarScore {
                    pillar: *pillar,
                    score: 6.5,
                })
                .collect(),
            answers: Vec::new(),
            bank_version: 0,
            completed_at: Utc::now(),
        };
        let site = SiteSettings::with_base_url("https://wellness.example.com/");
        let email = results_email(&user(), &AssessmentSummary::from(assessment), &site, vec![1, 2, 3]);

        assert!(email.body.contains("Overall score: 6.5"));
        for pillar in Pillar::ALL {
            assert!(email.body.contains(pillar.label()));
        }
        assert!(email.body.contains("https://wellness.example.com/results/a1"));
        assert_eq!(
            email.attachment,
            Some(("assessment-a1.pdf".to_string(), vec![1, 2, 3]))
        );
    }

    #[test]
    fn reminder_email_mentions_idle_days() {
        let draft = Draft::new("u1", Cursor::default(), 0, Utc::now());
        let site = SiteSettings::with_base_url("https://wellness.example.com");
        let email = reminder_email(&user(), &draft, 4, &site);
        assert!(email.body.contains("4 day(s) ago"));
        assert!(email.attachment.is_none());
        assert_eq!(email.to_email, "jane@example.com");
    }

    #[test]
    fn attachment_message_builds() {
        let settings = EmailSettings {
            server: "localhost".into(),
            port: 2525,
            login: "user".into(),
            password: "pass".into(),
            from_email: "noreply@example.com".into(),
            from_name: "Wellness".into(),
            use_tls: false,
        };
        let email = OutgoingEmail {
            to_email: "jane@example.com".into(),
            to_name: "Jane".into(),
            subject: "Results".into(),
            body: "See attached".into(),
            attachment: Some(("report.pdf".into(), vec![37, 80, 68, 70])),
        };
        assert!(SmtpMailer::build_message(&settings, &email).is_ok());
    }
}
