mod analysis;
mod auth;
mod config;
mod db;
mod error;
mod inference;
mod intake;
mod recommendation;
mod review;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use auth::jwt::JwtService;
use auth::middleware::AuthMiddleware;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use config::PipelineConfig;
use db::dynamodb_repository::DynamoDbRepository;
use inference::classifier::load_classifier;
use recommendation::generator::GeminiClient;
use review::workflow::ReviewWorkflow;
use routes::configure_routes;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let pipeline_config = PipelineConfig::load();

    let model_path =
        env::var("TORCH_MODEL_PATH").unwrap_or_else(|_| "models/leaf_disease.pt".to_string());
    let classifier = load_classifier(&model_path);
    if classifier.degraded() {
        log::warn!("Starting without a usable model; analyses will carry mock predictions");
    }

    // Initialize AWS configuration
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let dynamodb_client = DynamoDbClient::new(&aws_config);
    let s3_client = S3Client::new(&aws_config);

    // Tables and bucket from environment
    let analyses_table = env::var("DYNAMODB_ANALYSES_TABLE").unwrap().to_string();
    let results_table = env::var("DYNAMODB_RESULTS_TABLE").unwrap().to_string();
    let recommendations_table = env::var("DYNAMODB_RECOMMENDATIONS_TABLE")
        .unwrap()
        .to_string();
    let s3_bucket = env::var("S3_BUCKET_NAME").unwrap().to_string();

    let db_repo = DynamoDbRepository::new(
        dynamodb_client,
        analyses_table,
        results_table,
        recommendations_table,
    );
    let s3_service = storage::s3_service::S3Service::new(s3_client, s3_bucket);

    let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
    let generator = GeminiClient::new(gemini_api_key, pipeline_config.recommendation.model.clone());

    let orchestrator = web::Data::new(analysis::orchestrator::AnalysisOrchestrator::new(
        db_repo.clone(),
        s3_service,
        classifier,
        generator,
        &pipeline_config,
    ));
    let review_workflow = web::Data::new(ReviewWorkflow::new(db_repo));

    let jwt_secret = env::var("JWT_SECRET").unwrap().to_string();
    let jwt_service = JwtService::new(&jwt_secret);
    let auth_middleware = AuthMiddleware::new(jwt_service);

    let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(auth_middleware.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(orchestrator.clone())
            .app_data(review_workflow.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
