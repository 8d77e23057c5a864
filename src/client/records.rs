use crate::client::describe;
use crate::config::ServiceConfig;
use crate::error::FetchError;
use crate::models::{RecordPage, RecordQuery};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// 外部记录服务 (服务端分页)
#[async_trait]
pub trait RecordClient: Send + Sync {
    async fn list_line_items(&self, query: &RecordQuery) -> Result<RecordPage, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpRecordClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpRecordClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/orders", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl RecordClient for HttpRecordClient {
    async fn list_line_items(&self, query: &RecordQuery) -> Result<RecordPage, FetchError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Record service request failed: {}", e);
                FetchError::NetworkFailure(describe(&e))
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::NetworkFailure(describe(&e)))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("record service returned {status}"));
            return Err(FetchError::RemoteRejected(message));
        }

        let page: RecordPage = serde_json::from_slice(&body)
            .map_err(|e| FetchError::NetworkFailure(format!("unreadable response: {e}")))?;
        tracing::debug!(
            "Fetched page {}/{} ({} items) for fiscal year {}",
            query.page, page.total_pages, page.items.len(), query.fiscal_year
        );
        Ok(page)
    }
}
