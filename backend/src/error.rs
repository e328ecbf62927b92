use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use shared::ReviewStatus;

use crate::db::dynamodb_repository::RepositoryError;
use crate::storage::s3_service::StorageError;

/// Error taxonomy for the analysis pipeline. Inference and generator failures
/// are absorbed before they reach this type; what remains is what callers see.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid state: recommendation is {actual}")]
    InvalidState { actual: ReviewStatus },
    #[error("not found")]
    NotFound,
    /// The inference and generator adapters absorb their outages into
    /// degraded/fallback output, so this kind only escapes when a collaborator
    /// has no such path.
    #[allow(dead_code)]
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl actix_web::ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PipelineError::InvalidState { .. } => StatusCode::CONFLICT,
            PipelineError::NotFound => StatusCode::NOT_FOUND,
            PipelineError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Repository(_) | PipelineError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            PipelineError::InvalidState { actual } => {
                // Report the row's actual status so the client can resynchronize.
                json!({ "error": self.to_string(), "status": actual })
            }
            PipelineError::Repository(e) => {
                log::error!("Repository failure surfaced to caller: {}", e);
                json!({ "error": "Internal server error" })
            }
            PipelineError::Storage(e) => {
                log::error!("Storage failure surfaced to caller: {}", e);
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
