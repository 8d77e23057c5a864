use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub matching: ServiceConfig,
    pub records: ServiceConfig,
    pub paging: PagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 上传文件大小上限 (字节)
    pub max_upload_bytes: usize,
    /// 会话空闲多久后被回收 (秒)
    pub session_idle_secs: u64,
    /// 同时保留的会话数上限, 超出时回收最久未访问的
    pub max_sessions: usize,
}

/// 外部服务地址与超时
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// 对账结果每页条数
    pub page_size: usize,
    /// 记录列表默认每页条数
    pub record_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                max_upload_bytes: 20 * 1024 * 1024,
                session_idle_secs: 30 * 60,
                max_sessions: 10_000,
            },
            matching: ServiceConfig {
                base_url: "http://localhost:8000/api".to_string(),
                timeout_secs: 60,
            },
            records: ServiceConfig {
                base_url: "http://localhost:8000/api".to_string(),
                timeout_secs: 30,
            },
            paging: PagingConfig {
                page_size: 10,
                record_limit: 10,
            },
        }
    }
}

impl AppConfig {
    /// 默认值 -> spm-reconcile.toml (可选) -> 环境变量 (RECON_SERVER__PORT 等)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("spm-reconcile")
    }

    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("server.max_upload_bytes", defaults.server.max_upload_bytes as i64)?
            .set_default("server.session_idle_secs", defaults.server.session_idle_secs as i64)?
            .set_default("server.max_sessions", defaults.server.max_sessions as i64)?
            .set_default("matching.base_url", defaults.matching.base_url)?
            .set_default("matching.timeout_secs", defaults.matching.timeout_secs as i64)?
            .set_default("records.base_url", defaults.records.base_url)?
            .set_default("records.timeout_secs", defaults.records.timeout_secs as i64)?
            .set_default("paging.page_size", defaults.paging.page_size as i64)?
            .set_default("paging.record_limit", defaults.paging.record_limit as i64)?
            .add_source(File::with_name(file_stem).required(false))
            .add_source(
                Environment::with_prefix("RECON")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
