use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::LifecycleConfig;

pub const KEY_EMAIL: &str = "email";
pub const KEY_REMINDERS: &str = "reminders";
pub const KEY_SITE: &str = "site";
pub const REDACTED_PASSWORD: &str = "********";

/// SMTP connection used for results and reminder mail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EmailSettings {
    #[validate(length(min = 1, message = "SMTP server is required"))]
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    #[validate(email(message = "Invalid sender address"))]
    pub from_email: String,
    pub from_name: String,
    #[serde(default)]
    pub use_tls: bool,
}

impl EmailSettings {
    /// Copy safe to return over the admin API.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.password.is_empty() {
            copy.password = REDACTED_PASSWORD.to_string();
        }
        copy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReminderSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[validate(range(min = 1, max = 365, message = "threshold_days must be between 1 and 365"))]
    pub threshold_days: u32,
    #[validate(range(min = 0, max = 20, message = "max_reminders must be between 0 and 20"))]
    pub max_reminders: u32,
    #[validate(range(min = 1, max = 1000, message = "batch_size must be between 1 and 1000"))]
    pub batch_size: u32,
    #[validate(range(min = 1, max = 3650, message = "retention_days must be between 1 and 3650"))]
    pub retention_days: u32,
}

impl From<&LifecycleConfig> for ReminderSettings {
    fn from(config: &LifecycleConfig) -> Self {
        ReminderSettings {
            enabled: true,
            threshold_days: config.reminder_threshold_days,
            max_reminders: config.max_reminders,
            batch_size: config.reminder_batch_size,
            retention_days: config.draft_retention_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SiteSettings {
    #[validate(length(min = 1, max = 120, message = "Site name must be between 1 and 120 characters"))]
    pub site_name: String,
    #[validate(email(message = "Invalid contact email"))]
    pub contact_email: String,
    #[validate(url(message = "Invalid public URL"))]
    pub public_base_url: String,
    #[serde(default = "default_true")]
    pub results_email_enabled: bool,
}

impl SiteSettings {
    pub fn with_base_url(public_base_url: &str) -> Self {
        SiteSettings {
            site_name: "Financial Wellness Check".to_string(),
            contact_email: "support@example.com".to_string(),
            public_base_url: public_base_url.to_string(),
            results_email_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    /// `None` until an administrator configures SMTP.
    pub email: Option<EmailSettings>,
    pub reminders: ReminderSettings,
    pub site: SiteSettings,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_hides_password_only() {
        let settings = EmailSettings {
            server: "smtp.example.com".into(),
            port: 587,
            login: "mailer".into(),
            password: "hunter2".into(),
            from_email: "noreply@example.com".into(),
            from_name: "Wellness".into(),
            use_tls: true,
        };
        let redacted = settings.redacted();
        assert_eq!(redacted.password, REDACTED_PASSWORD);
        assert_eq!(redacted.server, settings.server);
    }

    #[test]
    fn reminder_ranges_are_enforced() {
        let mut settings = ReminderSettings::from(&LifecycleConfig::default());
        assert!(settings.validate().is_ok());
        settings.threshold_days = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_enabled_flag_defaults_to_true() {
        let parsed: ReminderSettings = serde_json::from_str(
            r#"{"threshold_days":3,"max_reminders":3,"batch_size":50,"retention_days":30}"#,
        )
        .unwrap();
        assert!(parsed.enabled);
    }
}
