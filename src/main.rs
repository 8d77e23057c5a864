use spm_reconcile::api::{self, AppState};
use spm_reconcile::client::{HttpMatchingClient, HttpRecordClient};
use spm_reconcile::{AppConfig, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 外部服务客户端
    let matching = Arc::new(HttpMatchingClient::new(&config.matching)?);
    let records = Arc::new(HttpRecordClient::new(&config.records)?);
    info!("Matching service: {}", config.matching.base_url);
    info!("Record service: {}", config.records.base_url);

    let state = AppState {
        sessions: Arc::new(SessionStore::new(config.paging.page_size).with_limits(
            Duration::from_secs(config.server.session_idle_secs),
            config.server.max_sessions,
        )),
        matching,
        records,
        record_limit: config.paging.record_limit,
        max_upload_bytes: config.server.max_upload_bytes,
    };

    let app = api::router(state).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/reconcile              - upload + reconcile (max {} bytes)", config.server.max_upload_bytes);
    info!("  GET  /api/reconcile/results      - paged results");
    info!("  GET  /api/reconcile/results.csv  - export");
    info!("  GET  /api/orders                 - grouped SPM list (context gated)");
    info!("  DELETE /api/session              - logout");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
