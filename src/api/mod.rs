pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{require_bearer, AuthService, JwtKeys};
use crate::db::{NotaRepository, UsuarioRepository};
use crate::error::{AppError, Result};
use crate::ingest::CsvIngestor;
use crate::service::{AggregationService, ChatCompletion, InsightService};

/// 上传文件大小上限
const UPLOAD_LIMIT: usize = 50 * 1024 * 1024;

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub jwt: Arc<JwtKeys>,
    pub ingestor: Arc<CsvIngestor>,
    pub aggregation: Arc<AggregationService>,
    pub insight: Arc<InsightService>,
}

impl AppState {
    pub fn new(
        notas: Arc<dyn NotaRepository>,
        usuarios: Arc<dyn UsuarioRepository>,
        chat: Arc<dyn ChatCompletion>,
        jwt: JwtKeys,
    ) -> Self {
        let jwt = Arc::new(jwt);
        let aggregation = Arc::new(AggregationService::new(notas.clone()));
        Self {
            auth: Arc::new(AuthService::new(usuarios, jwt.clone())),
            jwt,
            ingestor: Arc::new(CsvIngestor::new(notas)),
            insight: Arc::new(InsightService::new(aggregation.clone(), chat)),
            aggregation,
        }
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    // 需要 Bearer 令牌的路由
    let protected = Router::new()
        .route("/relatorio", get(handlers::relatorio))
        .route("/relatorio/interpretar", post(handlers::interpretar))
        .route("/interpretar", post(handlers::interpretar))
        .route("/alertas", get(handlers::alertas))
        .route("/estatisticas", get(handlers::estatisticas))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/upload", post(handlers::upload))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .with_state(state)
}

/// 允许前端来源跨域
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|_| AppError::Config(format!("cors.allowed_origin inválido: {}", allowed_origin)))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}
