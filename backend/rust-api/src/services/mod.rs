use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::config::Config;
use crate::services::email_service::{Mailer, SmtpMailer};
use crate::store::{self, AssessmentStore};

pub mod admin_auth_service;
pub mod assessment_service;
pub mod draft_service;
pub mod email_service;
pub mod lifecycle_service;
pub mod lifecycle_worker;
pub mod question_bank_service;
pub mod report_builder;
pub mod system_settings_service;
pub mod user_service;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn AssessmentStore>,
    pub mailer: Arc<dyn Mailer>,
    /// Backs the rate limiter; `None` turns limiting off.
    pub redis: Option<ConnectionManager>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = store::connect(&config).await?;
        let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(store.clone()));

        let redis = match config.redis_uri.as_deref() {
            Some(uri) => Some(connect_redis(uri).await?),
            None => {
                tracing::warn!("REDIS_URI is not set; rate limiting is disabled");
                None
            }
        };

        Ok(Self {
            config,
            store,
            mailer,
            redis,
        })
    }

    pub fn from_parts(
        config: Config,
        store: Arc<dyn AssessmentStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            store,
            mailer,
            redis: None,
        }
    }
}

async fn connect_redis(uri: &str) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");
    let client = redis::Client::open(uri)?;

    let redis = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        ConnectionManager::new(client),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}
