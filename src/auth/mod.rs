pub mod jwt;
pub mod middleware;
pub mod password;

use std::sync::Arc;

use crate::db::UsuarioRepository;
use crate::error::{AppError, Result};
use crate::models::Credenciais;

pub use jwt::{Claims, JwtKeys};
pub use middleware::{require_bearer, AuthUser};

/// 注册与登录
pub struct AuthService {
    usuarios: Arc<dyn UsuarioRepository>,
    jwt: Arc<JwtKeys>,
}

impl AuthService {
    pub fn new(usuarios: Arc<dyn UsuarioRepository>, jwt: Arc<JwtKeys>) -> Self {
        Self { usuarios, jwt }
    }

    pub async fn register(&self, creds: &Credenciais) -> Result<()> {
        let username = creds.username.trim();
        if username.is_empty() || creds.password.is_empty() {
            return Err(AppError::InvalidInput("Usuário e senha são obrigatórios.".to_string()));
        }

        let hash = password::hash_password(&creds.password)?;
        let usuario = self.usuarios.create_usuario(username, &hash).await?;
        tracing::info!("用户注册成功: id={} username={}", usuario.id, usuario.username);
        Ok(())
    }

    /// 成功返回令牌; 用户不存在或密码错误都只返回 Unauthorized
    pub async fn login(&self, creds: &Credenciais) -> Result<String> {
        let username = creds.username.trim();
        let usuario = self.usuarios.find_by_username(username).await?;

        match usuario {
            Some(u) if password::verify_password(&creds.password, &u.password_hash) => {
                self.jwt.issue(&u.username)
            }
            _ => {
                tracing::warn!("登录失败: username={}", username);
                Err(AppError::Unauthorized)
            }
        }
    }
}
