use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// CSV 解析失败, 整个上传被拒绝
    #[error("CSV linha {line}: {reason}")]
    Csv { line: u64, reason: String },

    #[error("Unauthorized")]
    Unauthorized,

    /// 外部模型服务返回非成功状态, 原样透传
    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn csv(line: u64, reason: impl Into<String>) -> Self {
        AppError::Csv { line, reason: reason.into() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Csv { .. } => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            AppError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            AppError::Upstream { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, body).into_response()
            }
            other => {
                tracing::error!("请求失败: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Erro interno.").into_response()
            }
        }
    }
}
