//! Client for the remote verifier.

use greeter_lib::crypto::field_to_decimal;
use greeter_lib::{EncodedProof, Error, PublicSignals, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// JSON body posted to the verifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest<'a> {
    pub message: &'a str,
    pub nullifier_hash: String,
    pub proof: &'a EncodedProof,
}

/// How the verifier answered a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Success status with the response body.
    Accepted(String),
    /// Server error with its plain-text reason, e.g. a reused nullifier.
    Rejected(String),
}

/// Posts proofs to the verifier. Each call is a single attempt.
#[derive(Debug, Clone)]
pub struct SubmissionClient {
    http: reqwest::Client,
    url: String,
}

impl SubmissionClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::NetworkError(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Submit `message` with its proof.
    ///
    /// # Errors
    /// [`Error::NetworkError`] on transport failure or a status that is neither
    /// success nor server error.
    pub async fn submit(
        &self,
        message: &str,
        signals: &PublicSignals,
        proof: &EncodedProof,
    ) -> Result<Outcome> {
        let request = SubmissionRequest {
            message,
            nullifier_hash: field_to_decimal(&signals.nullifier_hash),
            proof,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?;

        if status.is_success() {
            info!(%status, "verifier accepted submission");
            Ok(Outcome::Accepted(body))
        } else if status.is_server_error() {
            warn!(%status, reason = %body, "verifier rejected submission");
            Ok(Outcome::Rejected(body))
        } else {
            Err(Error::NetworkError(format!("unexpected status {status}: {body}")))
        }
    }
}
