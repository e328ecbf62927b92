use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{AnalysisStatus, GeneratedBy, ReviewStatus, Severity};
use uuid::Uuid;

use crate::analysis::aggregation::Aggregate;

/// One submission's aggregate record. Averages are derived by the
/// aggregation engine and written exactly once when the batch resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub user_id: Uuid,
    pub crop_type: String,
    pub average_confidence: f64,
    pub average_severity: Severity,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Analysis {
    pub fn begin(user_id: Uuid, crop_type: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            crop_type,
            average_confidence: 0.0,
            average_severity: Severity::Low,
            status: AnalysisStatus::Processing,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn complete(&mut self, crop_type: String, aggregate: &Aggregate) {
        self.crop_type = crop_type;
        self.average_confidence = aggregate.average_confidence;
        self.average_severity = aggregate.average_severity;
        self.status = AnalysisStatus::Completed;
        self.error = None;
    }

    pub fn fail(&mut self, aggregate: &Aggregate, reason: String) {
        self.average_confidence = aggregate.average_confidence;
        self.average_severity = aggregate.average_severity;
        self.status = AnalysisStatus::Failed;
        self.error = Some(reason);
    }
}

/// Per-image inference outcome. Created once during orchestration and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub file_name: String,
    pub s3_key: String,
    pub disease: String,
    pub confidence: f64,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl ImageResult {
    pub fn new(
        analysis_id: Uuid,
        file_name: String,
        s3_key: String,
        disease: String,
        confidence: f64,
        severity: Severity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            analysis_id,
            file_name,
            s3_key,
            disease,
            confidence,
            severity,
            created_at: Utc::now(),
        }
    }
}

/// Treatment advice attached to an analysis. Rows are superseded, never
/// deleted; only the review workflow mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub generated_by: GeneratedBy,
    pub content: String,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_feedback: Option<String>,
    /// Operator tag: true when the content is the deterministic fallback
    /// template rather than genuine generator output. Not part of the public
    /// response shape.
    pub fallback: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn new_ai(analysis_id: Uuid, content: String, fallback: bool) -> Self {
        Self::new(analysis_id, GeneratedBy::Ai, content, fallback)
    }

    pub fn new_admin(analysis_id: Uuid, content: String) -> Self {
        Self::new(analysis_id, GeneratedBy::Admin, content, false)
    }

    fn new(analysis_id: Uuid, generated_by: GeneratedBy, content: String, fallback: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            analysis_id,
            generated_by,
            content,
            status: ReviewStatus::Pending,
            admin_feedback: None,
            fallback,
            created_at: now,
            updated_at: now,
        }
    }
}
