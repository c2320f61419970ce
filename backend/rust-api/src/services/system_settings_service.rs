use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::config::Config;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::settings::{
    EmailSettings, ReminderSettings, SettingsResponse, SiteSettings, KEY_EMAIL, KEY_REMINDERS,
    KEY_SITE, REDACTED_PASSWORD,
};
use crate::store::{AssessmentStore, StoreError};

/// Typed access to the keyed `system_settings` records. Reminder and site
/// settings fall back to configuration until an administrator saves them.
pub struct SystemSettingsService {
    store: Arc<dyn AssessmentStore>,
}

impl SystemSettingsService {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    pub async fn get_email_settings(&self) -> ServiceResult<Option<EmailSettings>> {
        self.load(KEY_EMAIL).await
    }

    pub async fn get_reminder_settings(&self, config: &Config) -> ServiceResult<ReminderSettings> {
        Ok(self
            .load(KEY_REMINDERS)
            .await?
            .unwrap_or_else(|| ReminderSettings::from(&config.lifecycle)))
    }

    pub async fn get_site_settings(&self, config: &Config) -> ServiceResult<SiteSettings> {
        Ok(self
            .load(KEY_SITE)
            .await?
            .unwrap_or_else(|| SiteSettings::with_base_url(&config.public_base_url)))
    }

    pub async fn get_all(&self, config: &Config) -> ServiceResult<SettingsResponse> {
        let email = self.get_email_settings().await?;
        Ok(SettingsResponse {
            email: email.map(|settings| settings.redacted()),
            reminders: self.get_reminder_settings(config).await?,
            site: self.get_site_settings(config).await?,
        })
    }

    pub async fn update_email(
        &self,
        mut settings: EmailSettings,
        updated_by: &str,
    ) -> ServiceResult<EmailSettings> {
        settings.validate()?;
        // A redacted password echoed back from the console keeps the stored one.
        if settings.password == REDACTED_PASSWORD {
            if let Some(existing) = self.get_email_settings().await? {
                settings.password = existing.password;
            }
        }
        self.save(KEY_EMAIL, &settings, updated_by).await?;
        Ok(settings.redacted())
    }

    pub async fn update_reminders(
        &self,
        settings: ReminderSettings,
        updated_by: &str,
    ) -> ServiceResult<ReminderSettings> {
        settings.validate()?;
        self.save(KEY_REMINDERS, &settings, updated_by).await?;
        Ok(settings)
    }

    pub async fn update_site(
        &self,
        settings: SiteSettings,
        updated_by: &str,
    ) -> ServiceResult<SiteSettings> {
        settings.validate()?;
        self.save(KEY_SITE, &settings, updated_by).await?;
        Ok(settings)
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> ServiceResult<Option<T>> {
        let Some(raw) = self.store.get_setting(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(raw) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => {
                tracing::warn!(key, error = %err, "Stored setting is malformed; using defaults");
                Ok(None)
            }
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T, updated_by: &str) -> ServiceResult<()> {
        let raw = serde_json::to_value(value)
            .map_err(|e| ServiceError::Persistence(StoreError::Serialization(e.to_string())))?;
        self.store.put_setting(key, raw, updated_by).await?;
        tracing::info!(key, updated_by, "System setting updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn email(password: &str) -> EmailSettings {
        EmailSettings {
            server: "smtp.example.com".into(),
            port: 587,
            login: "mailer".into(),
            password: password.into(),
            from_email: "noreply@example.com".into(),
            from_name: "Wellness".into(),
            use_tls: true,
        }
    }

    #[tokio::test]
    async fn reminder_settings_fall_back_to_config() {
        let service = SystemSettingsService::new(Arc::new(InMemoryStore::new()));
        let config = Config::local();
        let settings = service.get_reminder_settings(&config).await.unwrap();
        assert_eq!(settings.threshold_days, config.lifecycle.reminder_threshold_days);
        assert!(settings.enabled);
    }

    #[tokio::test]
    async fn redacted_password_keeps_stored_secret() {
        let store = Arc::new(InMemoryStore::new());
        let service = SystemSettingsService::new(store.clone());
        service.update_email(email("s3cret"), "admin").await.unwrap();
        service.update_email(email(REDACTED_PASSWORD), "admin").await.unwrap();

        let stored = service.get_email_settings().await.unwrap().unwrap();
        assert_eq!(stored.password, "s3cret");
    }

    #[tokio::test]
    async fn invalid_site_settings_are_rejected() {
        let service = SystemSettingsService::new(Arc::new(InMemoryStore::new()));
        let mut site = SiteSettings::with_base_url("not a url");
        site.site_name = "Wellness".into();
        let result = service.update_site(site, "admin").await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
