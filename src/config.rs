use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_FILE: &str = "config/tributo";

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub openai: OpenAiConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://...` 或 `memory:` (内存存储, 开发用)
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url.starts_with("memory:")
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_key: String,
    pub token_ttl_secs: i64,
}

// 不打印密钥
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_key", &"***")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

/// Azure OpenAI 部署
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5133,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/tributo_justo".to_string(),
                max_connections: 20,
            },
            auth: AuthConfig {
                jwt_key: "8L#zYb@29!kMnXrT^Zs7GwQv5EfJpLoT".to_string(),
                token_ttl_secs: 3600,
            },
            openai: OpenAiConfig {
                endpoint: String::new(),
                api_key: String::new(),
                deployment: String::new(),
                api_version: "2023-03-15-preview".to_string(),
            },
            cors: CorsConfig {
                allowed_origin: "http://localhost:3000".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 < 配置文件 < TRIBUTO_* 环境变量 < DATABASE_URL
    pub fn load() -> Result<Self> {
        let file = std::env::var("TRIBUTO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config = Self::defaults()?
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix("TRIBUTO")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 以 `AppConfig::default()` 作为最底层来源
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = Config::try_from(&AppConfig::default())?;
        Ok(Config::builder().add_source(defaults))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}
