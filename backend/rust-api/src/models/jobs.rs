use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/cron/reminders`; omitted fields fall back to stored
/// reminder settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderBatchRequest {
    #[serde(default)]
    pub secret: String,
    pub days_since_last_update: Option<u32>,
    pub max_reminders: Option<u32>,
    pub batch_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReminderParams {
    pub threshold_days: u32,
    pub max_reminders: u32,
    pub batch_size: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReminderOutcome {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ReminderBatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Set when reminders are disabled in settings.
    #[serde(default)]
    pub skipped: bool,
    pub results: Vec<ReminderOutcome>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanupRequest {
    #[serde(default)]
    pub secret: String,
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub deleted: u64,
    pub cutoff: DateTime<Utc>,
}
