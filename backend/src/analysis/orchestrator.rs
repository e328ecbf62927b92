use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shared::{
    AnalysisResponse, AnalysisStatus, AnalysisSummary, ImageResultSummary, RecommendationSummary,
    Severity,
};
use uuid::Uuid;

use crate::analysis::aggregation::AggregationEngine;
use crate::analysis::models::{Analysis, ImageResult, Recommendation};
use crate::config::PipelineConfig;
use crate::db::{AnalysisStore, HistoryFilter};
use crate::error::PipelineError;
use crate::inference::classifier::Classifier;
use crate::inference::labels::{is_healthy, parse_class_label, LABEL_ERROR};
use crate::intake::validator::{ImageIntakeValidator, RawImage};
use crate::recommendation::fallback::fallback_content;
use crate::recommendation::generator::{RecommendationContext, RecommendationGenerator};
use crate::storage::BlobStore;

const HISTORY_PAGE_SIZE: usize = 20;

/// End-to-end submission pipeline: validate, infer per image, aggregate,
/// acquire a recommendation, persist every step along the way.
pub struct AnalysisOrchestrator<S, B, G> {
    store: S,
    blobs: B,
    classifier: Arc<dyn Classifier>,
    generator: G,
    validator: ImageIntakeValidator,
    aggregation: AggregationEngine,
    recommendation_timeout: Duration,
}

impl<S, B, G> AnalysisOrchestrator<S, B, G>
where
    S: AnalysisStore,
    B: BlobStore,
    G: RecommendationGenerator,
{
    pub fn new(
        store: S,
        blobs: B,
        classifier: Arc<dyn Classifier>,
        generator: G,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            classifier,
            generator,
            validator: ImageIntakeValidator::new(config.intake.clone()),
            aggregation: AggregationEngine::new(config.severity.clone()),
            recommendation_timeout: Duration::from_secs(config.recommendation.timeout_secs),
        }
    }

    pub async fn submit(
        &self,
        user_id: Uuid,
        images: Vec<RawImage>,
        crop_type: Option<String>,
    ) -> Result<AnalysisResponse, PipelineError> {
        // Validation happens before any row exists: a wholly-invalid batch
        // leaves no partial analysis behind.
        let accepted = self.validator.validate(images)?;

        let crop_override = crop_type.filter(|c| !c.trim().is_empty());
        let mut analysis = Analysis::begin(
            user_id,
            crop_override.clone().unwrap_or_else(|| "Unknown".to_string()),
        );
        self.store.create_analysis(&analysis).await?;
        log::info!(
            "Analysis {} processing {} images for user {}",
            analysis.id,
            accepted.len(),
            user_id
        );

        let mut results = Vec::new();
        let mut crops = Vec::new();
        let mut diseases = Vec::new();

        for raw in &accepted {
            let s3_key = self
                .blobs
                .put_image(user_id, &raw.bytes, &raw.content_type)
                .await?;

            let result = match self.classifier.classify(&raw.bytes) {
                Ok(prediction) => {
                    let (crop, disease) = parse_class_label(&prediction.label);
                    let severity = self
                        .aggregation
                        .severity_for(&disease, prediction.confidence);
                    crops.push(crop);
                    diseases.push(disease.clone());
                    ImageResult::new(
                        analysis.id,
                        raw.file_name.clone(),
                        s3_key,
                        disease,
                        prediction.confidence,
                        severity,
                    )
                }
                Err(e) => {
                    // One corrupt image must not sink the batch.
                    log::warn!("Inference failed for {}: {}", raw.file_name, e);
                    ImageResult::new(
                        analysis.id,
                        raw.file_name.clone(),
                        s3_key,
                        LABEL_ERROR.to_string(),
                        0.0,
                        Severity::Low,
                    )
                }
            };
            self.store.create_image_result(&result).await?;
            results.push(result);
        }

        let aggregate = self.aggregation.aggregate(&results);
        let every_image_failed = results.iter().all(|r| r.disease == LABEL_ERROR);

        let final_crop = crop_override.unwrap_or_else(|| {
            most_common(&crops).unwrap_or_else(|| "Unknown".to_string())
        });
        let dominant = dominant_disease(&diseases);

        let mut recommendations = Vec::new();
        if every_image_failed {
            analysis.fail(&aggregate, "all images failed inference".to_string());
            self.store.update_analysis_outcome(&analysis).await?;
            log::warn!("Analysis {} failed: every image failed inference", analysis.id);
        } else {
            analysis.complete(final_crop, &aggregate);
            self.store.update_analysis_outcome(&analysis).await?;

            // The analysis and its results are durable from here on; the
            // recommendation step is best-effort on top of them.
            let context = RecommendationContext {
                crop_type: analysis.crop_type.clone(),
                disease: dominant.clone(),
                severity: analysis.average_severity,
                confidence: analysis.average_confidence,
            };
            recommendations.push(self.acquire_recommendation(analysis.id, &context).await?);
        }

        Ok(compose_response(&analysis, dominant, &results, &recommendations))
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        filter: &HistoryFilter,
    ) -> Result<Vec<AnalysisSummary>, PipelineError> {
        let mut analyses = self.store.list_analyses(user_id).await?;

        if let Some(crop) = &filter.crop_type {
            let needle = crop.to_lowercase();
            analyses.retain(|a| a.crop_type.to_lowercase().contains(&needle));
        }
        if let Some(from) = filter.from {
            analyses.retain(|a| a.created_at >= from);
        }
        if let Some(to) = filter.to {
            analyses.retain(|a| a.created_at <= to);
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            analyses.retain(|a| a.crop_type.to_lowercase().contains(&needle));
        }

        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let page = filter.page.unwrap_or(1).max(1);
        Ok(analyses
            .into_iter()
            .skip((page - 1) * HISTORY_PAGE_SIZE)
            .take(HISTORY_PAGE_SIZE)
            .map(|a| AnalysisSummary {
                id: a.id,
                crop_type: a.crop_type,
                average_confidence: a.average_confidence,
                average_severity: a.average_severity,
                status: a.status,
                created_at: a.created_at.to_rfc3339(),
            })
            .collect())
    }

    pub async fn detail(
        &self,
        user_id: Uuid,
        analysis_id: Uuid,
    ) -> Result<AnalysisResponse, PipelineError> {
        let analysis = self
            .store
            .get_analysis(user_id, analysis_id)
            .await?
            .ok_or(PipelineError::NotFound)?;
        let results = self.store.list_image_results(analysis_id).await?;
        let recommendations = self.store.list_recommendations(analysis_id).await?;

        let diseases: Vec<String> = results
            .iter()
            .filter(|r| r.disease != LABEL_ERROR)
            .map(|r| r.disease.clone())
            .collect();

        Ok(compose_response(
            &analysis,
            dominant_disease(&diseases),
            &results,
            &recommendations,
        ))
    }

    /// Fresh recommendation for an already-completed analysis, keyed off its
    /// highest-confidence image result.
    pub async fn request_recommendation(
        &self,
        user_id: Uuid,
        analysis_id: Uuid,
    ) -> Result<Recommendation, PipelineError> {
        let analysis = self
            .store
            .get_analysis(user_id, analysis_id)
            .await?
            .ok_or(PipelineError::NotFound)?;
        if analysis.status != AnalysisStatus::Completed {
            return Err(PipelineError::InvalidInput(format!(
                "analysis is {}, recommendations require a completed analysis",
                analysis.status
            )));
        }

        let results = self.store.list_image_results(analysis_id).await?;
        let best = results
            .iter()
            .filter(|r| r.disease != LABEL_ERROR)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

        let (disease, severity) = match best {
            Some(result) => (result.disease.clone(), result.severity),
            None => ("unknown".to_string(), analysis.average_severity),
        };

        let context = RecommendationContext {
            crop_type: analysis.crop_type.clone(),
            disease,
            severity,
            confidence: analysis.average_confidence,
        };
        self.acquire_recommendation(analysis.id, &context).await
    }

    /// Calls the generator under the configured budget and persists whatever
    /// comes out of it, substituting the deterministic fallback template on
    /// timeout or failure. The submitter never sees a generator error.
    async fn acquire_recommendation(
        &self,
        analysis_id: Uuid,
        context: &RecommendationContext,
    ) -> Result<Recommendation, PipelineError> {
        let outcome =
            tokio::time::timeout(self.recommendation_timeout, self.generator.generate(context))
                .await;

        let (content, fallback) = match outcome {
            Ok(Ok(content)) => (content, false),
            Ok(Err(e)) => {
                log::warn!("Recommendation generator failed ({}), using fallback", e);
                (fallback_content(context), true)
            }
            Err(_) => {
                log::warn!(
                    "Recommendation generator exceeded its {}s budget, using fallback",
                    self.recommendation_timeout.as_secs()
                );
                (fallback_content(context), true)
            }
        };

        let recommendation = Recommendation::new_ai(analysis_id, content, fallback);
        self.store.create_recommendation(&recommendation).await?;
        Ok(recommendation)
    }
}

/// Most frequent value, first seen winning ties.
fn most_common(values: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for value in values {
        let count = counts[value.as_str()];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value.as_str(), count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Dominant disease for the recommendation context: the most common
/// non-healthy label when one exists, otherwise the healthy/unknown mode.
fn dominant_disease(diseases: &[String]) -> String {
    let diseased: Vec<String> = diseases
        .iter()
        .filter(|d| !is_healthy(d))
        .cloned()
        .collect();
    most_common(&diseased)
        .or_else(|| most_common(diseases))
        .unwrap_or_else(|| "unknown".to_string())
}

fn compose_response(
    analysis: &Analysis,
    disease: String,
    results: &[ImageResult],
    recommendations: &[Recommendation],
) -> AnalysisResponse {
    AnalysisResponse {
        analysis_id: analysis.id,
        crop_type: analysis.crop_type.clone(),
        disease,
        confidence: format!("{:.0}%", analysis.average_confidence * 100.0),
        severity: analysis.average_severity,
        status: analysis.status,
        error: analysis.error.clone(),
        results: results
            .iter()
            .map(|r| ImageResultSummary {
                image_name: r.file_name.clone(),
                disease: r.disease.clone(),
                severity: r.severity,
                confidence: r.confidence,
            })
            .collect(),
        recommendations: recommendations
            .iter()
            .map(|r| RecommendationSummary {
                id: r.id,
                generated_by: r.generated_by,
                content: r.content.clone(),
                status: r.status,
                admin_feedback: r.admin_feedback.clone(),
            })
            .collect(),
        average_confidence: analysis.average_confidence,
        average_severity: analysis.average_severity,
    }
}
