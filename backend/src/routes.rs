use actix_multipart::Multipart;
use actix_web::{web, Error, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use shared::RecommendationSummary;
use std::io::Write;
use uuid::Uuid;

use crate::analysis::models::Recommendation;
use crate::analysis::orchestrator::AnalysisOrchestrator;
use crate::auth::middleware::{AdminUser, AuthenticatedUser};
use crate::db::dynamodb_repository::DynamoDbRepository;
use crate::db::HistoryFilter;
use crate::error::PipelineError;
use crate::intake::validator::RawImage;
use crate::recommendation::generator::GeminiClient;
use crate::review::workflow::{ReviewAction, ReviewWorkflow};
use crate::storage::s3_service::S3Service;

pub type AppOrchestrator = AnalysisOrchestrator<DynamoDbRepository, S3Service, GeminiClient>;
pub type AppReviewWorkflow = ReviewWorkflow<DynamoDbRepository>;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/analyses")
            .route(web::post().to(submit_analysis))
            .route(web::get().to(analysis_history)),
    )
    .service(web::resource("/api/analyses/{analysis_id}").route(web::get().to(analysis_detail)))
    .service(
        web::resource("/api/recommendations/request")
            .route(web::post().to(request_recommendation)),
    )
    .service(
        web::resource("/api/admin/recommendations")
            .route(web::post().to(admin_create_recommendation)),
    )
    .service(
        web::resource("/api/admin/recommendations/pending").route(web::get().to(admin_pending)),
    )
    .service(
        web::resource("/api/admin/recommendations/{recommendation_id}/review")
            .route(web::post().to(admin_review)),
    );
}

async fn submit_analysis(
    user: AuthenticatedUser,
    orchestrator: web::Data<AppOrchestrator>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let mut images: Vec<RawImage> = Vec::new();
    let mut crop_type: Option<String> = None;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let (field_name, file_name) = {
            let disposition = field.content_disposition();
            (
                disposition
                    .and_then(|d| d.get_name())
                    .unwrap_or_default()
                    .to_string(),
                disposition
                    .and_then(|d| d.get_filename())
                    .map(str::to_string),
            )
        };
        let content_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            data.write_all(&chunk?)?;
        }

        match file_name {
            Some(file_name) if !data.is_empty() => {
                images.push(RawImage {
                    file_name,
                    content_type,
                    bytes: data,
                });
            }
            _ if field_name == "crop_type" => {
                let value = String::from_utf8_lossy(&data).trim().to_string();
                if !value.is_empty() {
                    crop_type = Some(value);
                }
            }
            _ => {}
        }
    }

    let response = orchestrator.submit(user.0.id, images, crop_type).await?;
    Ok(HttpResponse::Created().json(response))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    crop_type: Option<String>,
    from: Option<String>,
    to: Option<String>,
    search: Option<String>,
    page: Option<usize>,
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, PipelineError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        .map_err(|_| PipelineError::InvalidInput(format!("unparseable date: {}", raw)))
}

async fn analysis_history(
    user: AuthenticatedUser,
    orchestrator: web::Data<AppOrchestrator>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, Error> {
    let filter = HistoryFilter {
        crop_type: query.crop_type.clone(),
        from: query.from.as_deref().map(parse_date).transpose()?,
        to: query.to.as_deref().map(parse_date).transpose()?,
        search: query.search.clone(),
        page: query.page,
    };

    let summaries = orchestrator.history(user.0.id, &filter).await?;
    Ok(HttpResponse::Ok().json(summaries))
}

async fn analysis_detail(
    user: AuthenticatedUser,
    orchestrator: web::Data<AppOrchestrator>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, Error> {
    let response = orchestrator.detail(user.0.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[derive(Debug, Deserialize)]
struct RecommendationRequest {
    analysis_id: Uuid,
}

async fn request_recommendation(
    user: AuthenticatedUser,
    orchestrator: web::Data<AppOrchestrator>,
    body: web::Json<RecommendationRequest>,
) -> Result<HttpResponse, Error> {
    let recommendation = orchestrator
        .request_recommendation(user.0.id, body.analysis_id)
        .await?;
    Ok(HttpResponse::Created().json(to_summary(&recommendation)))
}

async fn admin_pending(
    _admin: AdminUser,
    workflow: web::Data<AppReviewWorkflow>,
) -> Result<HttpResponse, Error> {
    let pending = workflow.list_pending().await?;
    Ok(HttpResponse::Ok().json(pending))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    action: ReviewAction,
    feedback: Option<String>,
}

async fn admin_review(
    admin: AdminUser,
    workflow: web::Data<AppReviewWorkflow>,
    path: web::Path<Uuid>,
    body: web::Json<ReviewRequest>,
) -> Result<HttpResponse, Error> {
    let body = body.into_inner();
    let recommendation = workflow
        .review(admin.0.id, path.into_inner(), body.action, body.feedback)
        .await?;
    Ok(HttpResponse::Ok().json(recommendation))
}

#[derive(Debug, Deserialize)]
struct AdminRecommendationRequest {
    analysis_id: Uuid,
    content: String,
}

async fn admin_create_recommendation(
    admin: AdminUser,
    workflow: web::Data<AppReviewWorkflow>,
    body: web::Json<AdminRecommendationRequest>,
) -> Result<HttpResponse, Error> {
    let body = body.into_inner();
    let recommendation = workflow
        .create_admin_recommendation(admin.0.id, body.analysis_id, body.content)
        .await?;
    Ok(HttpResponse::Created().json(recommendation))
}

fn to_summary(recommendation: &Recommendation) -> RecommendationSummary {
    RecommendationSummary {
        id: recommendation.id,
        generated_by: recommendation.generated_by,
        content: recommendation.content.clone(),
        status: recommendation.status,
        admin_feedback: recommendation.admin_feedback.clone(),
    }
}
