//! Accessors for the ordered list of registered identity commitments.
//!
//! The registry is read as a JSON array. Entries may be decimal strings, `0x` hex
//! strings or plain JSON integers; order is preserved because a commitment's index is
//! its leaf position in the membership tree.

use ark_bn254::Fr;
use async_trait::async_trait;
use greeter_lib::crypto::parse_field;
use greeter_lib::{Error, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Point-in-time source of identity commitments.
#[async_trait]
pub trait CommitmentRegistry: Send + Sync {
    async fn fetch_commitments(&self) -> Result<Vec<Fr>>;
}

/// Registry served over HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    http: reqwest::Client,
    url: String,
}

impl HttpRegistry {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::RegistryFetchFailed(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CommitmentRegistry for HttpRegistry {
    async fn fetch_commitments(&self) -> Result<Vec<Fr>> {
        debug!(url = %self.url, "fetching identity commitments");
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::RegistryFetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RegistryFetchFailed(format!(
                "{} returned {status}",
                self.url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::RegistryFetchFailed(e.to_string()))?;
        let commitments = parse_commitments(&body)?;
        info!(count = commitments.len(), "fetched identity commitments");
        Ok(commitments)
    }
}

/// Registry read from a local JSON file.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CommitmentRegistry for FileRegistry {
    async fn fetch_commitments(&self) -> Result<Vec<Fr>> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::RegistryFetchFailed(format!("{}: {e}", self.path.display())))?;
        let commitments = parse_commitments(&body)?;
        info!(
            count = commitments.len(),
            path = %self.path.display(),
            "loaded identity commitments"
        );
        Ok(commitments)
    }
}

/// Parse a JSON array of commitments.
pub fn parse_commitments(body: &[u8]) -> Result<Vec<Fr>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::RegistryFetchFailed(format!("registry is not JSON: {e}")))?;
    let entries = value
        .as_array()
        .ok_or_else(|| Error::RegistryFetchFailed("registry is not a JSON array".into()))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let parsed = match entry {
                Value::String(raw) => parse_field(raw).ok(),
                Value::Number(n) => n.as_u64().map(Fr::from),
                _ => None,
            };
            parsed.ok_or_else(|| {
                Error::RegistryFetchFailed(format!("entry {index} is not a field element: {entry}"))
            })
        })
        .collect()
}
