//! Where revenue records come from: a local snapshot or the HTTP backend.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::models::{self, PersonRevenueRecord};

#[async_trait]
pub trait RevenueSource: Send + Sync {
    async fn fetch_records(&self) -> anyhow::Result<Vec<PersonRevenueRecord>>;

    /// `None` when the source has never been refreshed.
    async fn fetch_last_updated(&self) -> anyhow::Result<Option<String>>;
}

/// Accepts a bare array, `{"data": [...]}` or `{"error": "..."}`.
pub fn parse_revenue_payload(payload: &Value) -> Result<Vec<PersonRevenueRecord>, SourceError> {
    match payload {
        Value::Array(_) => Ok(models::records_from_json(payload)?),
        Value::Object(object) => {
            if let Some(error) = object.get("error") {
                return Err(SourceError::Backend(value_text(error)));
            }
            let data = object.get("data").ok_or_else(|| SourceError::UnexpectedResponse {
                endpoint: "/revenue".to_string(),
            })?;
            Ok(models::records_from_json(data)?)
        }
        _ => Err(SourceError::UnexpectedResponse {
            endpoint: "/revenue".to_string(),
        }),
    }
}

pub fn parse_last_updated_payload(payload: &Value) -> Result<Option<String>, SourceError> {
    if let Some(error) = payload.get("error") {
        return Err(SourceError::Backend(value_text(error)));
    }
    match payload.get("last_updated") {
        Some(Value::String(ts)) if !ts.trim().is_empty() => Ok(Some(ts.trim().to_string())),
        Some(Value::String(_)) | Some(Value::Null) => Ok(None),
        _ => Err(SourceError::UnexpectedResponse {
            endpoint: "/last_updated".to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl UpdateResponse {
    pub fn into_result(self) -> Result<(), SourceError> {
        if self.status == "success" {
            Ok(())
        } else {
            Err(SourceError::UpdateFailed(
                self.message.unwrap_or_else(|| self.status.clone()),
            ))
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `revenue_data.json` plus `last_updated.txt` on local disk.
#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    pub data_path: PathBuf,
    pub last_updated_path: PathBuf,
}

impl SnapshotFiles {
    pub fn new(data_path: impl Into<PathBuf>, last_updated_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            last_updated_path: last_updated_path.into(),
        }
    }

    pub async fn write(
        &self,
        records: &[PersonRevenueRecord],
        last_updated: &str,
    ) -> anyhow::Result<()> {
        let json = serde_json::to_string(records)?;
        write_file(&self.data_path, json).await?;
        write_file(&self.last_updated_path, last_updated.to_string()).await?;
        info!(
            records = records.len(),
            path = %self.data_path.display(),
            "snapshot written"
        );
        Ok(())
    }
}

async fn write_file(path: &Path, contents: String) -> anyhow::Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

#[async_trait]
impl RevenueSource for SnapshotFiles {
    async fn fetch_records(&self) -> anyhow::Result<Vec<PersonRevenueRecord>> {
        let raw = tokio::fs::read_to_string(&self.data_path)
            .await
            .with_context(|| format!("failed to read {}", self.data_path.display()))?;
        let payload: Value = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", self.data_path.display()))?;
        let records = parse_revenue_payload(&payload)?;
        debug!(records = records.len(), "loaded snapshot");
        Ok(records)
    }

    async fn fetch_last_updated(&self) -> anyhow::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.last_updated_path).await {
            Ok(raw) => {
                let ts = raw.trim();
                Ok((!ts.is_empty()).then(|| ts.to_string()))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.last_updated_path.display(), "no last-updated timestamp");
                Ok(None)
            }
            Err(err) => Err(err)
                .with_context(|| format!("failed to read {}", self.last_updated_path.display())),
        }
    }
}

/// Client for the dashboard backend's REST endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> anyhow::Result<Value> {
        let url = self.url(path);
        debug!(%url, "GET");
        let payload = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .json::<Value>()
            .await
            .with_context(|| format!("{url} did not return JSON"))?;
        Ok(payload)
    }

    /// Asks the backend to rebuild its data, then returns the refreshed records.
    pub async fn trigger_update(&self) -> anyhow::Result<Vec<PersonRevenueRecord>> {
        let url = self.url("/trigger-update");
        info!(%url, "triggering data update");
        let response: UpdateResponse = self
            .http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .json()
            .await
            .with_context(|| format!("{url} returned an unexpected body"))?;
        response.into_result()?;
        self.fetch_records().await
    }
}

#[async_trait]
impl RevenueSource for BackendClient {
    async fn fetch_records(&self) -> anyhow::Result<Vec<PersonRevenueRecord>> {
        let payload = self.get_json("/revenue").await?;
        Ok(parse_revenue_payload(&payload)?)
    }

    /// The backend answers `{"error": ..}` until its first refresh; that
    /// renders as an unknown timestamp rather than failing the dashboard.
    async fn fetch_last_updated(&self) -> anyhow::Result<Option<String>> {
        let payload = self.get_json("/last_updated").await?;
        match parse_last_updated_payload(&payload) {
            Ok(last_updated) => Ok(last_updated),
            Err(SourceError::Backend(message)) => {
                warn!(%message, "backend has no last-updated timestamp");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
