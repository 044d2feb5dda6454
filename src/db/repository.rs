use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Nota, NovaNota, Usuario};

/// 发票存储
#[async_trait]
pub trait NotaRepository: Send + Sync {
    /// 单事务批量写入发票及明细, 返回新发票 ID (与输入同序)
    async fn insert_notas(&self, notas: &[NovaNota]) -> Result<Vec<i64>>;

    /// 按写入顺序返回发票 (含明细), 可按 CNPJ 过滤
    async fn list_notas(&self, cnpj: Option<&str>) -> Result<Vec<Nota>>;
}

/// 用户存储
#[async_trait]
pub trait UsuarioRepository: Send + Sync {
    /// 用户名已存在时返回 `AppError::InvalidInput`
    async fn create_usuario(&self, username: &str, password_hash: &str) -> Result<Usuario>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Usuario>>;
}
