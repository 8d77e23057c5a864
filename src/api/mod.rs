pub mod handlers;

pub use handlers::*;

use crate::client::{MatchingClient, RecordClient};
use crate::service::SessionStore;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// 共享状态: 会话表 + 两个外部服务客户端
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub matching: Arc<dyn MatchingClient>,
    pub records: Arc<dyn RecordClient>,
    pub record_limit: usize,
    pub max_upload_bytes: usize,
}

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/health", get(health_check))
        .route("/api/context", get(get_context))
        .route("/api/context/apply", post(apply_context))
        .route("/api/context/reset", post(reset_context))
        .route("/api/session", delete(end_session))
        .route("/api/reconcile", post(upload_reconciliation).layer(upload_limit))
        .route("/api/reconcile/results", get(get_results))
        .route("/api/reconcile/results.csv", get(export_results))
        .route("/api/orders", get(list_orders))
        .with_state(state)
}
