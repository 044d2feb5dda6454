use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};
use tributo_justo::{
    api, auth::JwtKeys, build_router, create_pool,
    db::{self, MemoryRepository, NotaRepository, PgRepository, UsuarioRepository},
    service::AzureOpenAiClient,
    AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式, RUST_LOG 可覆盖级别
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 存储: Postgres 或内存
    let (notas, usuarios): (Arc<dyn NotaRepository>, Arc<dyn UsuarioRepository>) =
        if config.database.is_memory() {
            info!("Using in-memory store (data is lost on restart)");
            let repo = Arc::new(MemoryRepository::new());
            let notas: Arc<dyn NotaRepository> = repo.clone();
            (notas, repo as Arc<dyn UsuarioRepository>)
        } else {
            let pool = create_pool(&config.database).await?;
            db::init_schema(&pool).await?;
            info!("Database pool created");
            let repo = Arc::new(PgRepository::new(pool));
            let notas: Arc<dyn NotaRepository> = repo.clone();
            (notas, repo as Arc<dyn UsuarioRepository>)
        };

    // 外部模型客户端 (全局复用一个 reqwest::Client)
    let chat = Arc::new(AzureOpenAiClient::new(reqwest::Client::new(), config.openai.clone()));

    let state = AppState::new(notas, usuarios, chat, JwtKeys::from_config(&config.auth));
    let app = build_router(state).layer(api::cors_layer(&config.cors.allowed_origin)?);

    // 启动服务器
    let addr = config.listen_addr();
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /auth/register, POST /auth/login, POST /upload");
    info!("  GET  /relatorio, /alertas, /estatisticas   (Bearer)");
    info!("  POST /relatorio/interpretar               (Bearer)");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
