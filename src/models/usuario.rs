use serde::Deserialize;
use sqlx::FromRow;

/// 用户表 (tbl_usuarios), 仅保存密码哈希
#[derive(Debug, Clone, FromRow)]
pub struct Usuario {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// 注册 / 登录请求体
#[derive(Debug, Deserialize)]
pub struct Credenciais {
    #[serde(alias = "Username")]
    pub username: String,
    #[serde(alias = "Password")]
    pub password: String,
}
