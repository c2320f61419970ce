use crate::store::StoreError;

/// Failure taxonomy of the service layer; the HTTP edge maps each variant to a
/// status code.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("delivery failure: {0}")]
    Delivery(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(format!("Validation error: {}", errors))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
