use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;

/// 建表语句 (幂等, 不做迁移)
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tbl_notas_fiscais (
        id           BIGSERIAL PRIMARY KEY,
        cnpj         VARCHAR(32)  NOT NULL,
        razao_social VARCHAR(255) NOT NULL,
        numero_nota  VARCHAR(64)  NOT NULL,
        data_emissao TIMESTAMP    NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notas_cnpj ON tbl_notas_fiscais (cnpj)",
    r#"
    CREATE TABLE IF NOT EXISTS tbl_itens (
        id             BIGSERIAL PRIMARY KEY,
        nota_id        BIGINT       NOT NULL REFERENCES tbl_notas_fiscais (id) ON DELETE CASCADE,
        codigo_item    VARCHAR(64)  NOT NULL,
        descricao_item VARCHAR(255) NOT NULL,
        quantidade     NUMERIC      NOT NULL,
        valor_unitario NUMERIC      NOT NULL,
        imposto_item   NUMERIC      NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_itens_nota ON tbl_itens (nota_id)",
    r#"
    CREATE TABLE IF NOT EXISTS tbl_usuarios (
        id            BIGSERIAL PRIMARY KEY,
        username      VARCHAR(128) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL
    )
    "#,
];

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let mut connect_options = PgConnectOptions::from_str(&config.url)?;

    // 设置慢查询日志阈值为 5秒
    connect_options = connect_options.log_slow_statements(
        tracing::log::LevelFilter::Warn,
        Duration::from_secs(5)
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}

/// 启动时建表
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("数据库表结构已就绪");
    Ok(())
}
