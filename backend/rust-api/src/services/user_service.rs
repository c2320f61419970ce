use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::user::{normalize_email, CreateUserRequest, User};
use crate::store::{AssessmentStore, StoreError};

pub struct UserService {
    store: Arc<dyn AssessmentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    /// Returns the user registered under this email (case-insensitive) or
    /// creates one. The flag is `true` when a new user was created.
    pub async fn create_or_get(&self, req: CreateUserRequest) -> ServiceResult<(User, bool)> {
        req.validate()?;
        let email = normalize_email(&req.email);

        if let Some(existing) = self.store.find_user_by_email(&email).await? {
            tracing::debug!(user_id = %existing.id, "Returning existing user");
            return Ok((existing, false));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name: req.name.trim().to_string(),
            phone: req
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            marketing_consent: req.marketing_consent,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "User created");
                Ok((user, true))
            }
            // Lost a race with a concurrent request for the same email
            Err(StoreError::Conflict) => {
                let existing = self
                    .store
                    .find_user_by_email(&email)
                    .await?
                    .ok_or_else(|| ServiceError::Persistence(StoreError::Conflict))?;
                Ok((existing, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get(&self, user_id: &str) -> ServiceResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User {} not found", user_id)))
    }
}
