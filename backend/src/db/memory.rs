//! In-memory store used by the service tests. Mirrors the DynamoDB
//! repository's semantics, including the conditional review update.

use chrono::Utc;
use shared::ReviewStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::analysis::models::{Analysis, ImageResult, Recommendation};
use crate::db::dynamodb_repository::RepositoryError;
use crate::db::AnalysisStore;

#[derive(Default)]
struct Inner {
    analyses: HashMap<Uuid, Analysis>,
    results: Vec<ImageResult>,
    recommendations: HashMap<Uuid, Recommendation>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analysis_count(&self) -> usize {
        self.inner.lock().unwrap().analyses.len()
    }

    pub fn recommendation_count(&self) -> usize {
        self.inner.lock().unwrap().recommendations.len()
    }

    pub fn insert_recommendation(&self, recommendation: Recommendation) {
        self.inner
            .lock()
            .unwrap()
            .recommendations
            .insert(recommendation.id, recommendation);
    }
}

impl AnalysisStore for MemoryStore {
    async fn create_analysis(&self, analysis: &Analysis) -> Result<(), RepositoryError> {
        self.inner
            .lock()
            .unwrap()
            .analyses
            .insert(analysis.id, analysis.clone());
        Ok(())
    }

    async fn update_analysis_outcome(&self, analysis: &Analysis) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner
            .analyses
            .get_mut(&analysis.id)
            .ok_or(RepositoryError::NotFound)?;
        existing.crop_type = analysis.crop_type.clone();
        existing.average_confidence = analysis.average_confidence;
        existing.average_severity = analysis.average_severity;
        existing.status = analysis.status;
        existing.error = analysis.error.clone();
        Ok(())
    }

    async fn create_image_result(&self, result: &ImageResult) -> Result<(), RepositoryError> {
        self.inner.lock().unwrap().results.push(result.clone());
        Ok(())
    }

    async fn create_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<(), RepositoryError> {
        self.inner
            .lock()
            .unwrap()
            .recommendations
            .insert(recommendation.id, recommendation.clone());
        Ok(())
    }

    async fn get_analysis(
        &self,
        user_id: Uuid,
        analysis_id: Uuid,
    ) -> Result<Option<Analysis>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .analyses
            .get(&analysis_id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn get_analysis_by_id(
        &self,
        analysis_id: Uuid,
    ) -> Result<Option<Analysis>, RepositoryError> {
        Ok(self.inner.lock().unwrap().analyses.get(&analysis_id).cloned())
    }

    async fn list_analyses(&self, user_id: Uuid) -> Result<Vec<Analysis>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .analyses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_image_results(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<ImageResult>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .results
            .iter()
            .filter(|r| r.analysis_id == analysis_id)
            .cloned()
            .collect())
    }

    async fn list_recommendations(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<Recommendation>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .recommendations
            .values()
            .filter(|r| r.analysis_id == analysis_id)
            .cloned()
            .collect())
    }

    async fn get_recommendation(
        &self,
        recommendation_id: Uuid,
    ) -> Result<Option<Recommendation>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .recommendations
            .get(&recommendation_id)
            .cloned())
    }

    async fn list_pending_recommendations(&self) -> Result<Vec<Recommendation>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .recommendations
            .values()
            .filter(|r| r.status == ReviewStatus::Pending)
            .cloned()
            .collect())
    }

    async fn finalize_review(
        &self,
        recommendation_id: Uuid,
        target: ReviewStatus,
        feedback: Option<String>,
    ) -> Result<Recommendation, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let recommendation = inner
            .recommendations
            .get_mut(&recommendation_id)
            .ok_or(RepositoryError::ConditionFailed)?;
        if recommendation.status != ReviewStatus::Pending {
            return Err(RepositoryError::ConditionFailed);
        }
        recommendation.status = target;
        if feedback.is_some() {
            recommendation.admin_feedback = feedback;
        }
        recommendation.updated_at = Utc::now();
        Ok(recommendation.clone())
    }
}
