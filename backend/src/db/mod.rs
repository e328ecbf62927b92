pub mod dynamodb_repository;
#[cfg(test)]
pub mod memory;

use chrono::{DateTime, Utc};
use shared::ReviewStatus;
use uuid::Uuid;

use crate::analysis::models::{Analysis, ImageResult, Recommendation};
use self::dynamodb_repository::RepositoryError;

/// History listing filters, parsed from the query string by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub crop_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub page: Option<usize>,
}

/// Persistence contract for the pipeline. Creates are append-only per
/// entity; the review transition is the single conditional write.
pub trait AnalysisStore: Send + Sync {
    async fn create_analysis(&self, analysis: &Analysis) -> Result<(), RepositoryError>;

    /// Writes the derived averages, final crop type, status and error of an
    /// analysis once its batch has resolved.
    async fn update_analysis_outcome(&self, analysis: &Analysis) -> Result<(), RepositoryError>;

    async fn create_image_result(&self, result: &ImageResult) -> Result<(), RepositoryError>;

    async fn create_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<(), RepositoryError>;

    async fn get_analysis(
        &self,
        user_id: Uuid,
        analysis_id: Uuid,
    ) -> Result<Option<Analysis>, RepositoryError>;

    async fn get_analysis_by_id(
        &self,
        analysis_id: Uuid,
    ) -> Result<Option<Analysis>, RepositoryError>;

    async fn list_analyses(&self, user_id: Uuid) -> Result<Vec<Analysis>, RepositoryError>;

    async fn list_image_results(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<ImageResult>, RepositoryError>;

    async fn list_recommendations(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<Recommendation>, RepositoryError>;

    async fn get_recommendation(
        &self,
        recommendation_id: Uuid,
    ) -> Result<Option<Recommendation>, RepositoryError>;

    async fn list_pending_recommendations(&self) -> Result<Vec<Recommendation>, RepositoryError>;

    /// Conditional review transition: succeeds only while the row is still
    /// pending, otherwise fails with `RepositoryError::ConditionFailed`
    /// without mutating anything.
    async fn finalize_review(
        &self,
        recommendation_id: Uuid,
        target: ReviewStatus,
        feedback: Option<String>,
    ) -> Result<Recommendation, RepositoryError>;
}
