// ABOUTME: HTTP clients for the external request-log and call/dashboard stores
// ABOUTME: Both stores speak a PostgREST-style REST API keyed by an access key

use agentline_core::config::StoreConfig;
use agentline_core::RequestLogEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Per-request timeout for store calls
const STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for request log entries
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Insert one entry and return the stored row
    async fn insert_log(&self, entry: &RequestLogEntry) -> Result<Value>;
}

/// Source of call metadata for the dashboard
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Most recent incoming call, if any
    async fn latest_call(&self) -> Result<Option<Value>>;
}

#[derive(Clone)]
pub struct RestStore {
    base_url: String,
    api_key: String,
    table: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .finish()
    }
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(STORE_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for store")?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
            client,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Read a row array from a store response, failing on non-2xx status
async fn read_rows(response: reqwest::Response, operation: &str) -> Result<Vec<Value>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Store {} failed: {} {}", operation, status, body);
    }

    response
        .json::<Vec<Value>>()
        .await
        .with_context(|| format!("Store {} returned an unexpected body", operation))
}

#[async_trait]
impl LogStore for RestStore {
    async fn insert_log(&self, entry: &RequestLogEntry) -> Result<Value> {
        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(entry)
            .send()
            .await
            .context("Log store unreachable")?;

        let rows = read_rows(response, "insert").await?;
        match rows.into_iter().next() {
            Some(row) => Ok(row),
            // Some deployments answer with an empty representation
            None => Ok(serde_json::to_value(entry)?),
        }
    }
}

#[async_trait]
impl CallStore for RestStore {
    async fn latest_call(&self) -> Result<Option<Value>> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("select", "*"), ("order", "created_at.desc"), ("limit", "1")])
            .send()
            .await
            .context("Call store unreachable")?;

        let rows = read_rows(response, "lookup").await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> RestStore {
        RestStore::new(&StoreConfig {
            url: url.to_string(),
            api_key: "secret-key-123".to_string(),
            table: "request_logs".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_table_url_strips_trailing_slash() {
        assert_eq!(
            store("https://db.example.co/").table_url(),
            "https://db.example.co/rest/v1/request_logs"
        );
    }

    #[test]
    fn test_debug_omits_api_key() {
        let debug = format!("{:?}", store("https://db.example.co"));
        assert!(!debug.contains("secret-key-123"));
        assert!(debug.contains("request_logs"));
    }
}
