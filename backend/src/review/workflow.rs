use serde::Deserialize;
use shared::ReviewStatus;
use uuid::Uuid;

use crate::analysis::models::Recommendation;
use crate::db::dynamodb_repository::RepositoryError;
use crate::db::AnalysisStore;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// The only legal transitions: pending may be approved or rejected, and the
/// terminal states admit nothing. Everything else is an InvalidState carrying
/// the status the row actually holds.
pub fn next_status(current: ReviewStatus, action: ReviewAction) -> Result<ReviewStatus, PipelineError> {
    match (current, action) {
        (ReviewStatus::Pending, ReviewAction::Approve) => Ok(ReviewStatus::Approved),
        (ReviewStatus::Pending, ReviewAction::Reject) => Ok(ReviewStatus::Rejected),
        (actual, _) => Err(PipelineError::InvalidState { actual }),
    }
}

/// Governs the recommendation lifecycle. The store's conditional update is
/// the arbiter when two admins race on the same pending row.
#[derive(Clone)]
pub struct ReviewWorkflow<S> {
    store: S,
}

impl<S: AnalysisStore> ReviewWorkflow<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn review(
        &self,
        admin_id: Uuid,
        recommendation_id: Uuid,
        action: ReviewAction,
        feedback: Option<String>,
    ) -> Result<Recommendation, PipelineError> {
        let feedback = match action {
            ReviewAction::Approve => None,
            ReviewAction::Reject => {
                let feedback = feedback.unwrap_or_default();
                if feedback.trim().is_empty() {
                    return Err(PipelineError::InvalidInput(
                        "rejection requires non-empty feedback".to_string(),
                    ));
                }
                Some(feedback)
            }
        };

        let target = next_status(ReviewStatus::Pending, action)?;

        match self
            .store
            .finalize_review(recommendation_id, target, feedback)
            .await
        {
            Ok(recommendation) => {
                log::info!(
                    "Recommendation {} {} by admin {}",
                    recommendation_id,
                    target,
                    admin_id
                );
                Ok(recommendation)
            }
            Err(RepositoryError::ConditionFailed) => {
                // Either the row is gone or it already left pending; report
                // what is actually there so the client can resynchronize.
                let current = self
                    .store
                    .get_recommendation(recommendation_id)
                    .await?
                    .ok_or(PipelineError::NotFound)?;
                Err(PipelineError::InvalidState {
                    actual: current.status,
                })
            }
            Err(RepositoryError::NotFound) => Err(PipelineError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_pending(&self) -> Result<Vec<Recommendation>, PipelineError> {
        Ok(self.store.list_pending_recommendations().await?)
    }

    /// Admin override path: a superseding recommendation for an analysis
    /// whose previous advice was rejected. The new row starts pending like
    /// any other.
    pub async fn create_admin_recommendation(
        &self,
        admin_id: Uuid,
        analysis_id: Uuid,
        content: String,
    ) -> Result<Recommendation, PipelineError> {
        if content.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "recommendation content must not be empty".to_string(),
            ));
        }
        if self.store.get_analysis_by_id(analysis_id).await?.is_none() {
            return Err(PipelineError::NotFound);
        }

        let recommendation = Recommendation::new_admin(analysis_id, content);
        self.store.create_recommendation(&recommendation).await?;
        log::info!(
            "Admin {} issued recommendation {} for analysis {}",
            admin_id,
            recommendation.id,
            analysis_id
        );
        Ok(recommendation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::Analysis;
    use crate::db::memory::MemoryStore;
    use shared::GeneratedBy;

    fn pending_recommendation(store: &MemoryStore) -> Recommendation {
        let recommendation =
            Recommendation::new_ai(Uuid::new_v4(), "spray weekly".to_string(), false);
        store.insert_recommendation(recommendation.clone());
        recommendation
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        for terminal in [ReviewStatus::Approved, ReviewStatus::Rejected] {
            for action in [ReviewAction::Approve, ReviewAction::Reject] {
                let err = next_status(terminal, action).unwrap_err();
                match err {
                    PipelineError::InvalidState { actual } => assert_eq!(actual, terminal),
                    other => panic!("unexpected error: {:?}", other),
                }
            }
        }
    }

    #[test]
    fn pending_transitions_to_the_requested_state() {
        assert_eq!(
            next_status(ReviewStatus::Pending, ReviewAction::Approve).unwrap(),
            ReviewStatus::Approved
        );
        assert_eq!(
            next_status(ReviewStatus::Pending, ReviewAction::Reject).unwrap(),
            ReviewStatus::Rejected
        );
    }

    #[actix_web::test]
    async fn approve_moves_a_pending_recommendation() {
        let store = MemoryStore::new();
        let workflow = ReviewWorkflow::new(store.clone());
        let rec = pending_recommendation(&store);

        let updated = workflow
            .review(Uuid::new_v4(), rec.id, ReviewAction::Approve, None)
            .await
            .unwrap();
        assert_eq!(updated.status, ReviewStatus::Approved);
        assert!(updated.admin_feedback.is_none());
    }

    #[actix_web::test]
    async fn reject_records_the_feedback() {
        let store = MemoryStore::new();
        let workflow = ReviewWorkflow::new(store.clone());
        let rec = pending_recommendation(&store);

        let updated = workflow
            .review(
                Uuid::new_v4(),
                rec.id,
                ReviewAction::Reject,
                Some("dosage is wrong for smallholders".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, ReviewStatus::Rejected);
        assert_eq!(
            updated.admin_feedback.as_deref(),
            Some("dosage is wrong for smallholders")
        );
    }

    #[actix_web::test]
    async fn reject_with_empty_feedback_leaves_the_row_pending() {
        let store = MemoryStore::new();
        let workflow = ReviewWorkflow::new(store.clone());
        let rec = pending_recommendation(&store);

        let err = workflow
            .review(
                Uuid::new_v4(),
                rec.id,
                ReviewAction::Reject,
                Some("   ".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));

        let unchanged = store.get_recommendation(rec.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, ReviewStatus::Pending);
        assert!(unchanged.admin_feedback.is_none());
    }

    #[actix_web::test]
    async fn second_review_sees_the_actual_resulting_status() {
        let store = MemoryStore::new();
        let workflow = ReviewWorkflow::new(store.clone());
        let rec = pending_recommendation(&store);

        workflow
            .review(Uuid::new_v4(), rec.id, ReviewAction::Approve, None)
            .await
            .unwrap();

        let err = workflow
            .review(
                Uuid::new_v4(),
                rec.id,
                ReviewAction::Reject,
                Some("too generic".to_string()),
            )
            .await
            .unwrap_err();
        match err {
            PipelineError::InvalidState { actual } => assert_eq!(actual, ReviewStatus::Approved),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[actix_web::test]
    async fn racing_reviews_produce_exactly_one_winner() {
        let store = MemoryStore::new();
        let workflow = ReviewWorkflow::new(store.clone());
        let rec = pending_recommendation(&store);

        let approve = workflow.review(Uuid::new_v4(), rec.id, ReviewAction::Approve, None);
        let reject = workflow.review(
            Uuid::new_v4(),
            rec.id,
            ReviewAction::Reject,
            Some("hold off".to_string()),
        );
        let (a, b) = futures::join!(approve, reject);

        assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);
        let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(loser, PipelineError::InvalidState { .. }));
    }

    #[actix_web::test]
    async fn unknown_recommendation_is_not_found() {
        let workflow = ReviewWorkflow::new(MemoryStore::new());
        let err = workflow
            .review(Uuid::new_v4(), Uuid::new_v4(), ReviewAction::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound));
    }

    #[actix_web::test]
    async fn admin_override_creates_a_fresh_pending_row() {
        let store = MemoryStore::new();
        let workflow = ReviewWorkflow::new(store.clone());

        let analysis = Analysis::begin(Uuid::new_v4(), "Tomato".to_string());
        store.create_analysis(&analysis).await.unwrap();

        let rec = workflow
            .create_admin_recommendation(
                Uuid::new_v4(),
                analysis.id,
                "Use certified seed next season".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(rec.generated_by, GeneratedBy::Admin);
        assert_eq!(rec.status, ReviewStatus::Pending);
        assert!(!rec.fallback);
    }

    #[actix_web::test]
    async fn admin_override_requires_an_existing_analysis() {
        let workflow = ReviewWorkflow::new(MemoryStore::new());
        let err = workflow
            .create_admin_recommendation(Uuid::new_v4(), Uuid::new_v4(), "advice".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound));
    }
}
