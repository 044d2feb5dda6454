use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::error::AppError;

/// 已通过校验的用户名, 放在请求扩展中
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

/// 从 `Authorization: Bearer <token>` 取令牌
fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// 受保护路由的认证中间件
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;
    let claims = state.jwt.verify(token)?;

    request.extensions_mut().insert(AuthUser(claims.sub));
    Ok(next.run(request).await)
}
