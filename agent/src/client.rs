use frame_courier_common::config::BackendConfig;

use crate::AgentError;

/// Build the HTTP client shared by the readiness checker and the uploader.
///
/// Every request made through it is bounded by the configured connect and
/// total request timeouts, so a stalled backend cannot hang the loop.
pub fn build_http_client(backend: &BackendConfig) -> Result<reqwest::Client, AgentError> {
    reqwest::Client::builder()
        .connect_timeout(backend.connect_timeout())
        .timeout(backend.request_timeout())
        .user_agent(concat!("frame-courier-agent/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(AgentError::HttpClient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_backend() {
        assert!(build_http_client(&BackendConfig::default()).is_ok());
    }
}
