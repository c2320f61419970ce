use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdminStats {
    pub users: u64,
    pub assessments: u64,
    pub active_drafts: u64,
    /// `None` while no assessment has been completed.
    pub average_overall_score: Option<f64>,
}

/// Pagination for admin listings
#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT))
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.offset.unwrap_or(0))
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: i64,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_clamps_limit() {
        let query = ListQuery {
            limit: Some(10_000),
            offset: None,
        };
        assert_eq!(query.limit(), 500);
        assert_eq!(query.offset(), 0);
        assert_eq!(ListQuery::default().limit(), 50);
        let zero = ListQuery {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(zero.limit(), 1);
        assert_eq!(zero.offset(), 20);
    }
}
