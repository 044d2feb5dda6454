use axum::{
    extract::{Json, Multipart, Query, State},
    Extension,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{
    Alerta, Credenciais, Estatisticas, InterpretacaoResponse, PerguntaRequest, RelatorioCnpj,
};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RelatorioQuery {
    pub cnpj: Option<String>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn register(
    State(state): State<AppState>,
    Json(creds): Json<Credenciais>,
) -> Result<&'static str> {
    state.auth.register(&creds).await?;
    Ok("Usuário registrado com sucesso.")
}

pub async fn login(
    State(state): State<AppState>,
    Json(creds): Json<Credenciais>,
) -> Result<Json<LoginResponse>> {
    let token = state.auth.login(&creds).await?;
    Ok(Json(LoginResponse { token }))
}

/// 上传 CSV (multipart 字段 `file`; 没有该字段时取第一个文件字段)
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<&'static str> {
    let invalid = || AppError::InvalidInput("Arquivo inválido.".to_string());
    let mut content = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("multipart 解析失败: {}", e);
        invalid()
    })? {
        let named_file = field.name() == Some("file");
        let has_file_name = field.file_name().is_some();
        if !named_file && (content.is_some() || !has_file_name) {
            continue;
        }

        content = Some(field.bytes().await.map_err(|_| invalid())?);
        if named_file {
            break;
        }
    }

    let content = content.filter(|c| !c.is_empty()).ok_or_else(invalid)?;
    state.ingestor.ingest(&content).await?;
    Ok("Upload e processamento concluído.")
}

pub async fn relatorio(
    State(state): State<AppState>,
    Query(query): Query<RelatorioQuery>,
) -> Result<Json<Vec<RelatorioCnpj>>> {
    Ok(Json(state.aggregation.relatorio(query.cnpj.as_deref()).await?))
}

pub async fn alertas(State(state): State<AppState>) -> Result<Json<Vec<Alerta>>> {
    Ok(Json(state.aggregation.alertas().await?))
}

pub async fn estatisticas(State(state): State<AppState>) -> Result<Json<Estatisticas>> {
    Ok(Json(state.aggregation.estatisticas().await?))
}

pub async fn interpretar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PerguntaRequest>,
) -> Result<Json<InterpretacaoResponse>> {
    tracing::info!("用户 {} 请求数据解读", user.0);
    Ok(Json(state.insight.interpretar(&req.pergunta).await?))
}
