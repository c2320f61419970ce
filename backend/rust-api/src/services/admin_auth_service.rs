use bcrypt::verify;
use chrono::Utc;

use crate::config::Config;
use crate::middlewares::auth::{AuthError, JwtClaims, JwtService, ADMIN_ROLE};
use crate::models::admin::{LoginRequest, LoginResponse};

#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Admin login is not configured")]
    NotConfigured,
    #[error("Failed to verify password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("Failed to issue token: {0}")]
    Token(#[from] AuthError),
}

/// Console login against the single configured administrator.
pub struct AdminAuthService<'a> {
    config: &'a Config,
}

impl<'a> AdminAuthService<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AdminAuthError> {
        let hash = self
            .config
            .admin
            .password_hash
            .as_deref()
            .ok_or(AdminAuthError::NotConfigured)?;

        let email_matches = req.email.trim().eq_ignore_ascii_case(self.config.admin.email.trim());
        // Hash check runs whether or not the email matched
        let password_matches = verify(&req.password, hash)?;
        if !(email_matches && password_matches) {
            tracing::warn!(email = %req.email, "Admin login rejected");
            return Err(AdminAuthError::InvalidCredentials);
        }

        let now = Utc::now().timestamp();
        let ttl = self.config.jwt_ttl_seconds.max(60);
        let claims = JwtClaims {
            sub: self.config.admin.email.clone(),
            role: ADMIN_ROLE.to_string(),
            exp: (now + ttl) as usize,
            iat: now as usize,
        };
        let access_token = JwtService::new(&self.config.jwt_secret).generate_token(&claims)?;

        tracing::info!(email = %claims.sub, "Admin logged in");
        Ok(LoginResponse {
            access_token,
            token_type: "Bearer",
            expires_in: ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::local();
        config.admin.password_hash = Some(bcrypt::hash("correct horse", 4).unwrap());
        config
    }

    fn request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn valid_credentials_issue_admin_token() {
        let config = config();
        let response = AdminAuthService::new(&config)
            .login(&request("Admin@Example.com", "correct horse"))
            .unwrap();
        let claims = JwtService::new(&config.jwt_secret)
            .validate_token(&response.access_token)
            .unwrap();
        assert_eq!(claims.role, ADMIN_ROLE);
        assert_eq!(response.expires_in, 3600);
    }

    #[test]
    fn wrong_password_or_email_is_rejected() {
        let config = config();
        let service = AdminAuthService::new(&config);
        assert!(matches!(
            service.login(&request("admin@example.com", "wrong")),
            Err(AdminAuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login(&request("other@example.com", "correct horse")),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn missing_hash_disables_login() {
        let config = Config::local();
        assert!(matches!(
            AdminAuthService::new(&config).login(&request("admin@example.com", "x")),
            Err(AdminAuthError::NotConfigured)
        ));
    }
}
