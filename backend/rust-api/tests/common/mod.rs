#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use finwell_api::{
    config::Config,
    create_router,
    engine::navigation::Cursor,
    models::{draft::Draft, user::User},
    services::{
        email_service::{Mailer, OutgoingEmail},
        AppState,
    },
    store::{AssessmentStore, InMemoryStore},
};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// Captures outgoing mail; recipients in `failing` get an SMTP-style error.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn fail_for(&self, email: &str) {
        self.failing.lock().unwrap().insert(email.to_string());
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|email| email.to_email.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(&email.to_email) {
            anyhow::bail!("550 mailbox unavailable: {}", email.to_email);
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub config: Config,
}

pub fn test_config() -> Config {
    let mut config = Config::local();
    config.admin.email = ADMIN_EMAIL.to_string();
    config.admin.password_hash =
        Some(bcrypt::hash(ADMIN_PASSWORD, 4).expect("hash admin password"));
    config
}

pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = test_config();
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::from_parts(config.clone(), store.clone(), mailer.clone());

    TestApp {
        router: create_router(Arc::new(state)),
        store,
        mailer,
        config,
    }
}

impl TestApp {
    /// Sends a request and returns the status with the body parsed as JSON
    /// (`Value::Null` for empty or non-JSON bodies).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self.request_raw(method, uri, body, token).await;
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn request_raw(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    pub async fn create_user(&self, email: &str) -> String {
        let (status, json) = self
            .request(
                "POST",
                "/api/v1/users",
                Some(serde_json::json!({ "email": email, "name": "Test User" })),
                None,
            )
            .await;
        assert!(status.is_success(), "user creation failed: {json}");
        json["user"]["id"].as_str().unwrap().to_string()
    }

    pub async fn answer(
        &self,
        user_id: &str,
        pillar_index: usize,
        question_index: usize,
        option_index: usize,
    ) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/api/v1/users/{}/draft/answers", user_id),
            Some(serde_json::json!({
                "pillar_index": pillar_index,
                "question_index": question_index,
                "option_index": option_index
            })),
            None,
        )
        .await
    }

    /// Answers the default 8 x 5 bank in order; `skip_last` leaves
    /// `expenses-4` open.
    pub async fn answer_all(&self, user_id: &str, option_index: usize, skip_last: bool) -> Value {
        let mut last = Value::Null;
        for pillar in 0..8 {
            for question in 0..5 {
                if skip_last && pillar == 7 && question == 4 {
                    continue;
                }
                let (status, json) = self.answer(user_id, pillar, question, option_index).await;
                assert_eq!(status, StatusCode::OK, "answer {pillar}/{question}: {json}");
                last = json;
            }
        }
        last
    }

    pub async fn admin_token(&self) -> String {
        let (status, json) = self
            .request(
                "POST",
                "/admin/auth/login",
                Some(serde_json::json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {json}");
        json["access_token"].as_str().unwrap().to_string()
    }

    /// Stores a user with a draft last touched `idle_days` ago.
    pub async fn seed_idle_draft(&self, id: &str, idle_days: i64, reminders_sent: u32) {
        let now = Utc::now();
        self.store
            .insert_user(&User {
                id: id.to_string(),
                email: format!("{id}@example.com"),
                name: id.to_string(),
                phone: None,
                marketing_consent: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let mut draft = Draft::new(id, Cursor::new(0, 1), 0, now - Duration::days(idle_days));
        draft.reminders_sent = reminders_sent;
        self.store.upsert_draft(&draft).await.unwrap();
    }
}
