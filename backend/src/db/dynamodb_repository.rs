use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use shared::{AnalysisStatus, GeneratedBy, ReviewStatus, Severity};
use std::collections::HashMap;
use uuid::Uuid;

use crate::analysis::models::{Analysis, ImageResult, Recommendation};
use crate::db::AnalysisStore;

#[derive(Clone)]
pub struct DynamoDbRepository {
    client: Client,
    analyses_table: String,
    results_table: String,
    recommendations_table: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Item not found")]
    NotFound,
    #[error("Conditional update failed")]
    ConditionFailed,
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

impl DynamoDbRepository {
    pub fn new(
        client: Client,
        analyses_table: String,
        results_table: String,
        recommendations_table: String,
    ) -> Self {
        Self {
            client,
            analyses_table,
            results_table,
            recommendations_table,
        }
    }

    async fn put_item(
        &self,
        table: &str,
        item: HashMap<String, AttributeValue>,
    ) -> Result<(), RepositoryError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;
        Ok(())
    }

    fn analysis_to_item(analysis: &Analysis) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(analysis.id.to_string()));
        item.insert(
            "user_id".to_string(),
            AttributeValue::S(analysis.user_id.to_string()),
        );
        item.insert(
            "crop_type".to_string(),
            AttributeValue::S(analysis.crop_type.clone()),
        );
        item.insert(
            "average_confidence".to_string(),
            AttributeValue::N(analysis.average_confidence.to_string()),
        );
        item.insert(
            "average_severity".to_string(),
            AttributeValue::S(analysis.average_severity.to_string()),
        );
        item.insert(
            "status".to_string(),
            AttributeValue::S(analysis.status.to_string()),
        );
        if let Some(error) = &analysis.error {
            item.insert("error".to_string(), AttributeValue::S(error.clone()));
        }
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(analysis.created_at.to_rfc3339()),
        );
        item
    }

    fn parse_analysis_from_item(
        item: HashMap<String, AttributeValue>,
    ) -> Result<Analysis, RepositoryError> {
        let id = item
            .get("id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid analysis id".to_string()))?;

        let user_id = item
            .get("user_id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid user_id".to_string()))?;

        let crop_type = item
            .get("crop_type")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid crop_type".to_string()))?
            .clone();

        let average_confidence = item
            .get("average_confidence")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid average_confidence".to_string()))?;

        let average_severity = item
            .get("average_severity")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| s.parse::<Severity>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid average_severity".to_string()))?;

        let status = item
            .get("status")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| s.parse::<AnalysisStatus>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid analysis status".to_string()))?;

        let error = item.get("error").and_then(|v| v.as_s().ok()).cloned();

        let created_at = item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

        Ok(Analysis {
            id,
            user_id,
            crop_type,
            average_confidence,
            average_severity,
            status,
            error,
            created_at,
        })
    }

    fn parse_image_result_from_item(
        item: HashMap<String, AttributeValue>,
    ) -> Result<ImageResult, RepositoryError> {
        let id = item
            .get("id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid result id".to_string()))?;

        let analysis_id = item
            .get("analysis_id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid analysis_id".to_string()))?;

        let file_name = item
            .get("file_name")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid file_name".to_string()))?
            .clone();

        let s3_key = item
            .get("s3_key")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid s3_key".to_string()))?
            .clone();

        let disease = item
            .get("disease")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid disease".to_string()))?
            .clone();

        let confidence = item
            .get("confidence")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid confidence".to_string()))?;

        let severity = item
            .get("severity")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| s.parse::<Severity>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid severity".to_string()))?;

        let created_at = item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

        Ok(ImageResult {
            id,
            analysis_id,
            file_name,
            s3_key,
            disease,
            confidence,
            severity,
            created_at,
        })
    }

    fn parse_recommendation_from_item(
        item: HashMap<String, AttributeValue>,
    ) -> Result<Recommendation, RepositoryError> {
        let id = item
            .get("id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid recommendation id".to_string()))?;

        let analysis_id = item
            .get("analysis_id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid analysis_id".to_string()))?;

        let generated_by = item
            .get("generated_by")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| s.parse::<GeneratedBy>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid generated_by".to_string()))?;

        let content = item
            .get("content")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid content".to_string()))?
            .clone();

        let status = item
            .get("status")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| s.parse::<ReviewStatus>().ok())
            .ok_or_else(|| {
                RepositoryError::InvalidData("Invalid recommendation status".to_string())
            })?;

        let admin_feedback = item
            .get("admin_feedback")
            .and_then(|v| v.as_s().ok())
            .cloned();

        let fallback = *item
            .get("fallback")
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(&false);

        let created_at = item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

        let updated_at = item
            .get("updated_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(created_at);

        Ok(Recommendation {
            id,
            analysis_id,
            generated_by,
            content,
            status,
            admin_feedback,
            fallback,
            created_at,
            updated_at,
        })
    }
}

impl AnalysisStore for DynamoDbRepository {
    async fn create_analysis(&self, analysis: &Analysis) -> Result<(), RepositoryError> {
        log::info!(
            "Creating analysis {} in table '{}'",
            analysis.id,
            self.analyses_table
        );
        let item = Self::analysis_to_item(analysis);
        self.put_item(&self.analyses_table, item).await
    }

    async fn update_analysis_outcome(&self, analysis: &Analysis) -> Result<(), RepositoryError> {
        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(analysis.id.to_string()));

        let mut update_expression_parts = vec![
            "crop_type = :crop_type",
            "average_confidence = :average_confidence",
            "average_severity = :average_severity",
            "#status = :status",
        ];
        let mut expression_attribute_values = HashMap::new();
        expression_attribute_values.insert(
            ":crop_type".to_string(),
            AttributeValue::S(analysis.crop_type.clone()),
        );
        expression_attribute_values.insert(
            ":average_confidence".to_string(),
            AttributeValue::N(analysis.average_confidence.to_string()),
        );
        expression_attribute_values.insert(
            ":average_severity".to_string(),
            AttributeValue::S(analysis.average_severity.to_string()),
        );
        expression_attribute_values.insert(
            ":status".to_string(),
            AttributeValue::S(analysis.status.to_string()),
        );

        let mut request = self
            .client
            .update_item()
            .table_name(&self.analyses_table)
            .set_key(Some(key))
            .expression_attribute_names("#status", "status");

        if let Some(error) = &analysis.error {
            update_expression_parts.push("#error = :error");
            expression_attribute_values
                .insert(":error".to_string(), AttributeValue::S(error.clone()));
            request = request.expression_attribute_names("#error", "error");
        }

        request
            .update_expression(format!("SET {}", update_expression_parts.join(", ")))
            .set_expression_attribute_values(Some(expression_attribute_values))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;
        Ok(())
    }

    async fn create_image_result(&self, result: &ImageResult) -> Result<(), RepositoryError> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(result.id.to_string()));
        item.insert(
            "analysis_id".to_string(),
            AttributeValue::S(result.analysis_id.to_string()),
        );
        item.insert(
            "file_name".to_string(),
            AttributeValue::S(result.file_name.clone()),
        );
        item.insert(
            "s3_key".to_string(),
            AttributeValue::S(result.s3_key.clone()),
        );
        item.insert(
            "disease".to_string(),
            AttributeValue::S(result.disease.clone()),
        );
        item.insert(
            "confidence".to_string(),
            AttributeValue::N(result.confidence.to_string()),
        );
        item.insert(
            "severity".to_string(),
            AttributeValue::S(result.severity.to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(result.created_at.to_rfc3339()),
        );

        self.put_item(&self.results_table, item).await
    }

    async fn create_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<(), RepositoryError> {
        let mut item = HashMap::new();
        item.insert(
            "id".to_string(),
            AttributeValue::S(recommendation.id.to_string()),
        );
        item.insert(
            "analysis_id".to_string(),
            AttributeValue::S(recommendation.analysis_id.to_string()),
        );
        item.insert(
            "generated_by".to_string(),
            AttributeValue::S(recommendation.generated_by.to_string()),
        );
        item.insert(
            "content".to_string(),
            AttributeValue::S(recommendation.content.clone()),
        );
        item.insert(
            "status".to_string(),
            AttributeValue::S(recommendation.status.to_string()),
        );
        if let Some(feedback) = &recommendation.admin_feedback {
            item.insert(
                "admin_feedback".to_string(),
                AttributeValue::S(feedback.clone()),
            );
        }
        item.insert(
            "fallback".to_string(),
            AttributeValue::Bool(recommendation.fallback),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(recommendation.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(recommendation.updated_at.to_rfc3339()),
        );

        self.put_item(&self.recommendations_table, item).await
    }

    async fn get_analysis(
        &self,
        user_id: Uuid,
        analysis_id: Uuid,
    ) -> Result<Option<Analysis>, RepositoryError> {
        match self.get_analysis_by_id(analysis_id).await? {
            Some(analysis) if analysis.user_id == user_id => Ok(Some(analysis)),
            // Rows owned by someone else look identical to absent rows.
            _ => Ok(None),
        }
    }

    async fn get_analysis_by_id(
        &self,
        analysis_id: Uuid,
    ) -> Result<Option<Analysis>, RepositoryError> {
        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(analysis_id.to_string()));

        let result = self
            .client
            .get_item()
            .table_name(&self.analyses_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        match result.item {
            Some(item) => Ok(Some(Self::parse_analysis_from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn list_analyses(&self, user_id: Uuid) -> Result<Vec<Analysis>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.analyses_table)
            .filter_expression("user_id = :user_id")
            .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        let mut analyses = Vec::new();
        if let Some(items) = result.items {
            for item in items {
                analyses.push(Self::parse_analysis_from_item(item)?);
            }
        }
        Ok(analyses)
    }

    async fn list_image_results(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<ImageResult>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.results_table)
            .filter_expression("analysis_id = :analysis_id")
            .expression_attribute_values(
                ":analysis_id",
                AttributeValue::S(analysis_id.to_string()),
            )
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        let mut results = Vec::new();
        if let Some(items) = result.items {
            for item in items {
                results.push(Self::parse_image_result_from_item(item)?);
            }
        }
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(results)
    }

    async fn list_recommendations(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<Recommendation>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.recommendations_table)
            .filter_expression("analysis_id = :analysis_id")
            .expression_attribute_values(
                ":analysis_id",
                AttributeValue::S(analysis_id.to_string()),
            )
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        let mut recommendations = Vec::new();
        if let Some(items) = result.items {
            for item in items {
                recommendations.push(Self::parse_recommendation_from_item(item)?);
            }
        }
        recommendations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recommendations)
    }

    async fn get_recommendation(
        &self,
        recommendation_id: Uuid,
    ) -> Result<Option<Recommendation>, RepositoryError> {
        let mut key = HashMap::new();
        key.insert(
            "id".to_string(),
            AttributeValue::S(recommendation_id.to_string()),
        );

        let result = self
            .client
            .get_item()
            .table_name(&self.recommendations_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        match result.item {
            Some(item) => Ok(Some(Self::parse_recommendation_from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn list_pending_recommendations(&self) -> Result<Vec<Recommendation>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.recommendations_table)
            .filter_expression("#status = :status")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":status",
                AttributeValue::S(ReviewStatus::Pending.to_string()),
            )
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        let mut recommendations = Vec::new();
        if let Some(items) = result.items {
            for item in items {
                recommendations.push(Self::parse_recommendation_from_item(item)?);
            }
        }
        recommendations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recommendations)
    }

    async fn finalize_review(
        &self,
        recommendation_id: Uuid,
        target: ReviewStatus,
        feedback: Option<String>,
    ) -> Result<Recommendation, RepositoryError> {
        let mut key = HashMap::new();
        key.insert(
            "id".to_string(),
            AttributeValue::S(recommendation_id.to_string()),
        );

        let mut update_expression_parts = vec!["#status = :target", "updated_at = :updated_at"];
        let mut expression_attribute_values = HashMap::new();
        expression_attribute_values
            .insert(":target".to_string(), AttributeValue::S(target.to_string()));
        expression_attribute_values.insert(
            ":updated_at".to_string(),
            AttributeValue::S(Utc::now().to_rfc3339()),
        );
        expression_attribute_values.insert(
            ":pending".to_string(),
            AttributeValue::S(ReviewStatus::Pending.to_string()),
        );

        if let Some(feedback) = &feedback {
            update_expression_parts.push("admin_feedback = :feedback");
            expression_attribute_values
                .insert(":feedback".to_string(), AttributeValue::S(feedback.clone()));
        }

        let result = self
            .client
            .update_item()
            .table_name(&self.recommendations_table)
            .set_key(Some(key))
            .update_expression(format!("SET {}", update_expression_parts.join(", ")))
            // Two racing admins: exactly one passes this condition.
            .condition_expression("#status = :pending")
            .expression_attribute_names("#status", "status")
            .set_expression_attribute_values(Some(expression_attribute_values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => {
                let attributes = output.attributes.ok_or(RepositoryError::NotFound)?;
                Self::parse_recommendation_from_item(attributes)
            }
            Err(e) => {
                if let Some(service_err) = e.as_service_error() {
                    if service_err.is_conditional_check_failed_exception() {
                        return Err(RepositoryError::ConditionFailed);
                    }
                }
                log::error!(
                    "DynamoDB update_item failed for recommendation {}: {:?}",
                    recommendation_id,
                    e
                );
                Err(RepositoryError::DynamoDb(e.to_string()))
            }
        }
    }
}
