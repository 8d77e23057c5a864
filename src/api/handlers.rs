use crate::error::{ContextError, ParseError, ReconcileError, SubmissionError};
use crate::parser::UploadedFile;
use crate::service::context_gate::{AppliedContext, FeedView, Identity};
use crate::service::export;
use crate::service::session::{self, ResultsView, SharedSession};
use crate::api::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Json, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

pub const SESSION_HEADER: &str = "x-session-id";
pub const ACTOR_HEADER: &str = "x-actor-id";
pub const ORG_UNIT_HEADER: &str = "x-actor-org-unit";

/// 统一响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Response {
        let body = ApiResponse {
            success: true,
            message: message.into(),
            data: Some(data),
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

/// 接口错误 -> HTTP 状态码
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            message: self.message,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        let status = match &e {
            ReconcileError::Parse(ParseError::UnsupportedFormat(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ReconcileError::Parse(ParseError::MalformedShape(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ReconcileError::Parse(ParseError::ReadFailure(_)) => StatusCode::BAD_REQUEST,
            ReconcileError::Submission(SubmissionError::RemoteRejected(_)) => StatusCode::BAD_GATEWAY,
            ReconcileError::Submission(SubmissionError::NetworkFailure(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ReconcileError::Superseded => StatusCode::CONFLICT,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<ContextError> for ApiError {
    fn from(e: ContextError) -> Self {
        let status = match &e {
            ContextError::MissingFiscalYear => StatusCode::BAD_REQUEST,
            ContextError::OrgUnitPinned { .. } => StatusCode::FORBIDDEN,
            ContextError::NoIdentity => StatusCode::UNAUTHORIZED,
        };
        ApiError::new(status, e.to_string())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// 取会话并同步身份 (身份变化会重置上下文)
async fn session_for(state: &AppState, headers: &HeaderMap) -> Result<SharedSession, ApiError> {
    let session_id = header_str(headers, SESSION_HEADER)
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "missing session"))?;
    let actor_id = header_str(headers, ACTOR_HEADER).ok_or(ContextError::NoIdentity)?;
    let pinned_org_unit = match header_str(headers, ORG_UNIT_HEADER) {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "invalid org unit header"))?,
        ),
        None => None,
    };

    let session = state.sessions.get_or_create(session_id);
    session.lock().await.observe_identity(Identity {
        actor_id: actor_id.to_string(),
        pinned_org_unit,
    });
    Ok(session)
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn get_context(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = session_for(&state, &headers).await?;
    let context = session.lock().await.gate.snapshot();
    Ok(ApiResponse::ok("context", context))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyContextRequest {
    pub org_unit_id: Option<i64>,
    pub fiscal_year: String,
}

pub async fn apply_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ApplyContextRequest>,
) -> Result<Response, ApiError> {
    let session = session_for(&state, &headers).await?;
    let applied: AppliedContext = session
        .lock()
        .await
        .apply_context(req.org_unit_id, &req.fiscal_year)?;
    Ok(ApiResponse::ok("context applied", applied))
}

pub async fn reset_context(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = session_for(&state, &headers).await?;
    let mut s = session.lock().await;
    s.reset_context();
    Ok(ApiResponse::ok("context reset", s.gate.snapshot()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    pub filename: Option<String>,
    pub fiscal_year: Option<String>,
}

/// 上传文件并对账, 返回第 1 页
pub async fn upload_reconciliation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let session = session_for(&state, &headers).await?;
    let bytes = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            tracing::warn!("Upload rejected: larger than {} bytes", state.max_upload_bytes);
            ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("file exceeds the upload limit of {} bytes", state.max_upload_bytes),
            )
        } else {
            ReconcileError::from(ParseError::ReadFailure(e.body_text())).into()
        }
    })?;

    let mut upload = UploadedFile::new(params.filename.unwrap_or_default(), bytes.to_vec());
    if let Some(ct) = header_str(&headers, header::CONTENT_TYPE.as_str()) {
        upload = upload.with_content_type(ct);
    }

    let view: ResultsView =
        session::reconcile_upload(&session, state.matching.as_ref(), upload, params.fiscal_year).await?;
    let message = format!(
        "Reconciled {} rows: {} match, {} mismatch, {} not found",
        view.summary.total, view.summary.matched, view.summary.mismatched, view.summary.not_found
    );
    Ok(ApiResponse::ok(message, view))
}

/// 登出: 丢弃会话及其全部状态
pub async fn end_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session_id = header_str(&headers, SESSION_HEADER)
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "missing session"))?;
    let removed = state.sessions.remove(session_id);
    tracing::info!("Session {} ended (existed: {})", session_id, removed);
    Ok(ApiResponse::ok("session ended", removed))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn get_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let session = session_for(&state, &headers).await?;
    let view = session
        .lock()
        .await
        .results_page(params.page)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no reconciliation results"))?;
    Ok(ApiResponse::ok("results", view))
}

/// 导出全部有序结果
pub async fn export_results(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = session_for(&state, &headers).await?;
    let set = session
        .lock()
        .await
        .submitter
        .latest()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no reconciliation results"))?;

    let csv = export::export_to_csv(&set.results)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("export failed: {e}")))?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"rekonsiliasi.csv\""),
        ],
        csv,
    )
        .into_response())
}

/// 受门控的 SPM 列表 (按单号聚合)
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let session = session_for(&state, &headers).await?;
    let view: FeedView = session::load_records(
        &session,
        state.records.as_ref(),
        params.page.unwrap_or(1),
        params.limit.unwrap_or(state.record_limit),
    )
    .await;

    if let (Some(error), None) = (&view.error, &view.data) {
        return Err(ApiError::new(StatusCode::BAD_GATEWAY, error.clone()));
    }
    let message = if view.context.is_applied {
        "orders"
    } else {
        "context not applied"
    };
    Ok(ApiResponse::ok(message, view))
}
