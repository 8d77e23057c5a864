use crate::client::describe;
use crate::config::ServiceConfig;
use crate::error::SubmissionError;
use crate::models::{MatchingEnvelope, RawRow, ReconcileRequest, ReconciliationResult};
use async_trait::async_trait;
use std::time::Duration;

/// 外部匹配服务 (MATCH/MISMATCH/NOT_FOUND 的判定在服务端完成)
#[async_trait]
pub trait MatchingClient: Send + Sync {
    async fn reconcile(
        &self,
        rows: Vec<RawRow>,
        fiscal_year: Option<&str>,
    ) -> Result<Vec<ReconciliationResult>, SubmissionError>;
}

/// 基于 HTTP 的匹配服务客户端
pub struct HttpMatchingClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpMatchingClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/reconcile", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl MatchingClient for HttpMatchingClient {
    async fn reconcile(
        &self,
        rows: Vec<RawRow>,
        fiscal_year: Option<&str>,
    ) -> Result<Vec<ReconciliationResult>, SubmissionError> {
        let row_count = rows.len();
        let mut request = self.http.post(&self.endpoint).json(&ReconcileRequest { data: rows });
        if let Some(year) = fiscal_year {
            request = request.query(&[("fiscalYear", year)]);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Matching service request failed: {}", e);
            SubmissionError::NetworkFailure(describe(&e))
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubmissionError::NetworkFailure(describe(&e)))?;

        match serde_json::from_slice::<MatchingEnvelope>(&body) {
            Ok(MatchingEnvelope::Data { data }) if status.is_success() => {
                tracing::info!("Matching service returned {} results for {} rows", data.len(), row_count);
                Ok(data)
            }
            Ok(MatchingEnvelope::Error { error }) => {
                tracing::warn!("Matching service rejected submission ({}): {}", status, error);
                Err(SubmissionError::RemoteRejected(error))
            }
            Ok(MatchingEnvelope::Data { .. }) => Err(SubmissionError::RemoteRejected(format!(
                "matching service returned {status}"
            ))),
            Err(_) if !status.is_success() => Err(SubmissionError::RemoteRejected(format!(
                "matching service returned {status}"
            ))),
            Err(e) => Err(SubmissionError::NetworkFailure(format!("unreadable response: {e}"))),
        }
    }
}
