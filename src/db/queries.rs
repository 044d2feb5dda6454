use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::repository::{NotaRepository, UsuarioRepository};
use crate::error::{AppError, Result};
use crate::models::{Item, Nota, NovaNota, NovoItem, Usuario};

/// 每条 INSERT 的最大明细行数 (每行 6 个绑定参数, 远低于 65535 上限)
const ITEM_CHUNK: usize = 1000;
const INSERT_TIMEOUT: Duration = Duration::from_secs(30);

/// Postgres 仓储
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 写入发票主表, 返回 ID
async fn insert_nota(tx: &mut Transaction<'_, Postgres>, nota: &NovaNota) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO tbl_notas_fiscais (cnpj, razao_social, numero_nota, data_emissao)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#
    )
    .bind(&nota.cnpj)
    .bind(&nota.razao_social)
    .bind(&nota.numero_nota)
    .bind(nota.data_emissao)
    .fetch_one(&mut **tx)
    .await
}

/// 批量写入明细
async fn insert_itens(
    tx: &mut Transaction<'_, Postgres>,
    itens: &[(i64, &NovoItem)],
) -> Result<u64, sqlx::Error> {
    let mut affected = 0;
    for chunk in itens.chunks(ITEM_CHUNK) {
        let mut query_builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO tbl_itens (
                nota_id, codigo_item, descricao_item,
                quantidade, valor_unitario, imposto_item
            ) "
        );

        query_builder.push_values(chunk, |mut b, (nota_id, item)| {
            b.push_bind(*nota_id)
                .push_bind(item.codigo_item.clone())
                .push_bind(item.descricao_item.clone())
                .push_bind(item.quantidade.clone())
                .push_bind(item.valor_unitario.clone())
                .push_bind(item.imposto_item.clone());
        });

        affected += query_builder.build().execute(&mut **tx).await?.rows_affected();
    }
    Ok(affected)
}

impl PgRepository {
    async fn insert_all(&self, notas: &[NovaNota]) -> Result<Vec<i64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let mut ids = Vec::with_capacity(notas.len());
        for nota in notas {
            ids.push(insert_nota(&mut tx, nota).await?);
        }

        let itens: Vec<(i64, &NovoItem)> = ids
            .iter()
            .zip(notas)
            .flat_map(|(id, nota)| nota.itens.iter().map(move |item| (*id, item)))
            .collect();
        let affected = insert_itens(&mut tx, &itens).await?;

        tx.commit().await?;
        tracing::debug!("写入 {} 张发票, {} 条明细", ids.len(), affected);
        Ok(ids)
    }
}

#[async_trait]
impl NotaRepository for PgRepository {
    async fn insert_notas(&self, notas: &[NovaNota]) -> Result<Vec<i64>> {
        if notas.is_empty() {
            return Ok(Vec::new());
        }

        let start_time = Instant::now();

        // 添加超时控制: 30秒 (超时则事务回滚)
        match tokio::time::timeout(INSERT_TIMEOUT, self.insert_all(notas)).await {
            Ok(Ok(ids)) => {
                tracing::info!("✓ INSERT执行成功, {} 张发票, 耗时: {:?}", ids.len(), start_time.elapsed());
                Ok(ids)
            }
            Ok(Err(e)) => {
                tracing::error!("✗ INSERT执行失败, 耗时: {:?}, 错误: {:?}", start_time.elapsed(), e);
                Err(e.into())
            }
            Err(_) => {
                tracing::error!("✗ INSERT操作超时 (>30秒)!");
                Err(sqlx::Error::PoolTimedOut.into())
            }
        }
    }

    async fn list_notas(&self, cnpj: Option<&str>) -> Result<Vec<Nota>> {
        let mut notas = sqlx::query_as::<_, Nota>(
            r#"
            SELECT id, cnpj, razao_social, numero_nota, data_emissao
            FROM tbl_notas_fiscais
            WHERE ($1::varchar IS NULL OR cnpj = $1)
            ORDER BY id
            "#
        )
        .bind(cnpj)
        .fetch_all(&self.pool)
        .await?;

        if notas.is_empty() {
            return Ok(notas);
        }

        let ids: Vec<i64> = notas.iter().map(|n| n.id).collect();
        let itens = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, nota_id, codigo_item, descricao_item,
                   quantidade, valor_unitario, imposto_item
            FROM tbl_itens
            WHERE nota_id = ANY($1)
            ORDER BY nota_id, id
            "#
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_nota: HashMap<i64, Vec<Item>> = HashMap::with_capacity(notas.len());
        for item in itens {
            by_nota.entry(item.nota_id).or_default().push(item);
        }
        for nota in &mut notas {
            nota.itens = by_nota.remove(&nota.id).unwrap_or_default();
        }

        Ok(notas)
    }
}

#[async_trait]
impl UsuarioRepository for PgRepository {
    async fn create_usuario(&self, username: &str, password_hash: &str) -> Result<Usuario> {
        let created = sqlx::query_as::<_, Usuario>(
            r#"
            INSERT INTO tbl_usuarios (username, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, password_hash
            "#
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        created.ok_or_else(|| AppError::InvalidInput("Usuário já existe.".to_string()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Usuario>> {
        let usuario = sqlx::query_as::<_, Usuario>(
            r#"
            SELECT id, username, password_hash
            FROM tbl_usuarios
            WHERE username = $1
            "#
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(usuario)
    }
}
