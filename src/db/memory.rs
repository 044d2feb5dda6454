use async_trait::async_trait;
use tokio::sync::RwLock;

use super::repository::{NotaRepository, UsuarioRepository};
use crate::error::{AppError, Result};
use crate::models::{Item, Nota, NovaNota, Usuario};

#[derive(Debug, Default)]
struct Tables {
    notas: Vec<Nota>,
    usuarios: Vec<Usuario>,
    next_item_id: i64,
}

/// 进程内存储 (`database.url = "memory:"`), 重启即丢失
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotaRepository for MemoryRepository {
    async fn insert_notas(&self, notas: &[NovaNota]) -> Result<Vec<i64>> {
        let mut tables = self.tables.write().await;
        let mut ids = Vec::with_capacity(notas.len());

        for nova in notas {
            let id = tables.notas.len() as i64 + 1;
            let mut itens = Vec::with_capacity(nova.itens.len());
            for item in &nova.itens {
                tables.next_item_id += 1;
                itens.push(Item {
                    id: tables.next_item_id,
                    nota_id: id,
                    codigo_item: item.codigo_item.clone(),
                    descricao_item: item.descricao_item.clone(),
                    quantidade: item.quantidade.clone(),
                    valor_unitario: item.valor_unitario.clone(),
                    imposto_item: item.imposto_item.clone(),
                });
            }
            tables.notas.push(Nota {
                id,
                cnpj: nova.cnpj.clone(),
                razao_social: nova.razao_social.clone(),
                numero_nota: nova.numero_nota.clone(),
                data_emissao: nova.data_emissao,
                itens,
            });
            ids.push(id);
        }

        Ok(ids)
    }

    async fn list_notas(&self, cnpj: Option<&str>) -> Result<Vec<Nota>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notas
            .iter()
            .filter(|n| cnpj.map_or(true, |c| n.cnpj == c))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UsuarioRepository for MemoryRepository {
    async fn create_usuario(&self, username: &str, password_hash: &str) -> Result<Usuario> {
        let mut tables = self.tables.write().await;
        if tables.usuarios.iter().any(|u| u.username == username) {
            return Err(AppError::InvalidInput("Usuário já existe.".to_string()));
        }

        let usuario = Usuario {
            id: tables.usuarios.len() as i64 + 1,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        tables.usuarios.push(usuario.clone());
        Ok(usuario)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Usuario>> {
        let tables = self.tables.read().await;
        Ok(tables.usuarios.iter().find(|u| u.username == username).cloned())
    }
}
