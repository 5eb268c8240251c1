use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::AgentError;

/// Body of `GET /api/frames/ready/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    #[serde(default)]
    pub active_cases: Option<u32>,
    #[serde(default)]
    pub max_cases: Option<u32>,
}

/// Asks the backend whether it wants a new frame right now.
#[async_trait]
pub trait ReadinessChecker: Send {
    /// `true` only on a successfully decoded `{"ready": true}`. Every other
    /// outcome, including transport errors, counts as not ready.
    async fn is_ready(&mut self) -> bool;
}

/// Decode a readiness body. Empty, malformed, non-object, or `ready`-less
/// bodies are errors.
pub fn parse_readiness(body: &[u8]) -> Result<ReadinessStatus, AgentError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AgentError::EmptyBody);
    }
    // serde would otherwise also accept the struct in sequence form, e.g. `[true]`.
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)?;
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

pub struct HttpReadinessChecker {
    client: reqwest::Client,
    url: String,
}

impl HttpReadinessChecker {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    pub async fn fetch_status(&self) -> Result<ReadinessStatus, AgentError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(AgentError::HttpConnect)?;

        if !response.status().is_success() {
            return Err(AgentError::HttpStatus(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(AgentError::HttpBody)?;
        parse_readiness(&body)
    }
}

#[async_trait]
impl ReadinessChecker for HttpReadinessChecker {
    async fn is_ready(&mut self) -> bool {
        match self.fetch_status().await {
            Ok(status) if status.ready => {
                info!(
                    active_cases = status.active_cases,
                    max_cases = status.max_cases,
                    "backend reports ready"
                );
                true
            }
            Ok(status) => {
                debug!(
                    active_cases = status.active_cases,
                    max_cases = status.max_cases,
                    "backend reports not ready"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, url = self.url, "readiness check failed, treating backend as not ready");
                false
            }
        }
    }
}
