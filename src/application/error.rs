use thiserror::Error;
use uuid::Uuid;

use crate::{
    application::repos::RepoError, domain::error::DomainError, domain::policy::DenyReason,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("forbidden: {0}")]
    Forbidden(DenyReason),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable code for the caller-facing error layer.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } | AppError::Repo(RepoError::NotFound) => "NOT_FOUND",
            AppError::Forbidden(reason) => reason.code(),
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::Repo(_) => "STORAGE_FAILURE",
        }
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            AppError::Forbidden(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        Self::Forbidden(reason)
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Missing { entity, id } => Self::NotFound { entity, id },
            DomainError::Invalid { .. } => Self::Validation(error.to_string()),
        }
    }
}
