use serde::Deserialize;
use std::env;

/// Defaults for reminder and expiry jobs; the `reminders` setting stored by
/// administrators takes precedence at run time.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LifecycleConfig {
    pub reminder_threshold_days: u32,
    pub max_reminders: u32,
    pub reminder_batch_size: u32,
    pub draft_retention_days: u32,
    pub worker_interval_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reminder_threshold_days: 3,
            max_reminders: 3,
            reminder_batch_size: 50,
            draft_retention_days: 30,
            worker_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    /// bcrypt hash; admin login is refused while unset.
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app_env: String,
    pub bind_addr: String,
    /// `mongo` or `memory`.
    pub storage_backend: String,
    pub mongo_uri: String,
    pub mongo_database: String,
    /// Rate limiting is disabled when unset.
    pub redis_uri: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
    pub admin: AdminConfig,
    pub cron_secret: String,
    pub metrics_auth: String,
    pub public_base_url: String,
    pub lifecycle: LifecycleConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());
        let is_prod = app_env == "prod";

        // config/<env>.toml + APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, var: &str| settings.get_string(key).or_else(|_| env::var(var)).ok();

        let secret = |key: &str, var: &str, dev_value: &str| -> Result<String, config::ConfigError> {
            match lookup(key, var) {
                Some(value) => Ok(value),
                None if is_prod => Err(config::ConfigError::Message(format!(
                    "{} must be set in production",
                    var
                ))),
                None => {
                    eprintln!("WARNING: Using default {} (dev mode only!)", var);
                    Ok(dev_value.to_string())
                }
            }
        };

        let jwt_secret = secret("auth.jwt_secret", "JWT_SECRET", "dev-secret-only-for-local-testing")?;
        let cron_secret = secret("jobs.cron_secret", "CRON_SECRET", "dev-cron-secret")?;
        let metrics_auth = secret("metrics.auth", "METRICS_AUTH", "admin:changeme")?;

        let mongo_uri = lookup("database.mongo_uri", "MONGO_URI")
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());
        let mongo_database = lookup("database.mongo_database", "MONGO_DATABASE")
            .unwrap_or_else(|| "finwell".to_string());
        let storage_backend = lookup("database.backend", "STORAGE_BACKEND")
            .unwrap_or_else(|| "mongo".to_string());
        let redis_uri = lookup("redis.uri", "REDIS_URI").filter(|uri| !uri.is_empty());
        let bind_addr =
            lookup("server.bind_addr", "BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8081".to_string());
        let public_base_url = lookup("site.public_base_url", "PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        let jwt_ttl_seconds = settings
            .get_int("auth.jwt_ttl_seconds")
            .ok()
            .or_else(|| env::var("JWT_TTL_SECONDS").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(3600);

        let admin = AdminConfig {
            email: lookup("admin.email", "ADMIN_EMAIL")
                .unwrap_or_else(|| "admin@example.com".to_string())
                .to_lowercase(),
            password_hash: lookup("admin.password_hash", "ADMIN_PASSWORD_HASH"),
        };
        if admin.password_hash.is_none() {
            eprintln!("WARNING: ADMIN_PASSWORD_HASH is not set; admin login is disabled");
        }

        let lifecycle = settings
            .get::<LifecycleConfig>("lifecycle")
            .unwrap_or_default();

        Ok(Config {
            app_env,
            bind_addr,
            storage_backend,
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            jwt_ttl_seconds,
            admin,
            cron_secret,
            metrics_auth,
            public_base_url,
            lifecycle,
        })
    }

    /// In-memory configuration for local runs and tests.
    pub fn local() -> Self {
        Config {
            app_env: "test".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            storage_backend: "memory".to_string(),
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "finwell_test".to_string(),
            redis_uri: None,
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_seconds: 3600,
            admin: AdminConfig {
                email: "admin@example.com".to_string(),
                password_hash: None,
            },
            cron_secret: "test-cron-secret".to_string(),
            metrics_auth: "admin:changeme".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}
