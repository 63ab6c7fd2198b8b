use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Router};
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::error;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::auth::{auth_middleware, AuthUser, TokenVerifier};
use crate::api::handler::{self, ApiDoc};
use crate::api::request::client_ip;
use crate::api::wrapper::ErrorReport;
use crate::config::Config;
use crate::utils::ai_gateway::AiGateway;
use crate::utils::upload::web_dir_for;

/// multipart 上传的请求体上限
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

pub fn build_router(db: Arc<DatabaseConnection>, ai: Arc<dyn AiGateway>, config: Arc<Config>) -> Router {
    let verifier = Arc::new(TokenVerifier::new(&config.jwt_secret));

    let api = Router::new()
        .route("/api/v1/user/hello", get(handler::hello_user))
        .route(
            "/api/v1/user/profile",
            get(handler::get_profile).put(handler::update_profile),
        )
        .route(
            "/api/v1/search",
            get(handler::get_all_searches).post(handler::create_response),
        )
        .route("/api/v1/search/{searchId}", get(handler::get_search_by_id))
        .route_layer(middleware::from_fn_with_state(verifier, auth_middleware));

    let mut router = Router::new()
        .route("/health", get(handler::health))
        .merge(api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let web_dir = web_dir_for(&config.upload_dir);
    if web_dir != "/" {
        router = router.nest_service(&web_dir, ServeDir::new(&config.upload_dir));
    }

    router
        .layer(Extension(db))
        .layer(Extension(ai))
        .layer(Extension(config))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(middleware::from_fn(log_api_errors))
        .layer(CorsLayer::permissive())
}

/// 记录所有错误响应：状态码、消息、请求方法、路径、IP、调用者与出错位置
async fn log_api_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ip = client_ip(request.headers(), request.extensions());

    let response = next.run(request).await;
    if let Some(report) = response.extensions().get::<ErrorReport>() {
        let user = response
            .extensions()
            .get::<AuthUser>()
            .map(|u| format!("{}({})", u.email, u.id))
            .unwrap_or_else(|| "anonymous".to_string());
        error!(
            status_code = report.status.as_u16(),
            method = %method,
            path = %path,
            ip = %ip,
            user = %user,
            stack = %report.stack,
            "API error: {}",
            report.message
        );
        if let Some(details) = &report.details {
            error!("Additional error details: {}", details);
        }
    }
    response
}
