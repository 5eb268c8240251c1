use async_trait::async_trait;
use frame_courier_common::frame::CapturedFrame;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::AgentError;

/// Multipart field the backend reads the image from.
const IMAGE_FIELD: &str = "image";

/// What the backend says after accepting a frame. Both fields are optional;
/// a 2xx response with an unreadable body is still a successful upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IngestReceipt {
    #[serde(default)]
    pub frame_id: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Transmits one captured frame to the ingestion endpoint.
///
/// Implementations do not delete the frame; the loop controller discards it
/// after every attempt.
#[async_trait]
pub trait Uploader: Send {
    async fn send_frame(&mut self, frame: &CapturedFrame) -> Result<IngestReceipt, AgentError>;
}

pub struct HttpUploader {
    client: reqwest::Client,
    url: String,
}

impl HttpUploader {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn send_frame(&mut self, frame: &CapturedFrame) -> Result<IngestReceipt, AgentError> {
        let data = tokio::fs::read(frame.path())
            .await
            .map_err(AgentError::ReadFrame)?;
        let size = data.len();

        let part = Part::bytes(data)
            .file_name(frame.upload_name())
            .mime_str(frame.content_type)
            .map_err(AgentError::BuildRequest)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(AgentError::HttpConnect)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(AgentError::HttpBody)?;
        let receipt = serde_json::from_slice(&body).unwrap_or_default();
        debug!(seq = frame.seq, size, status = %status, "frame accepted by backend");
        Ok(receipt)
    }
}
