use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ready_path")]
    pub ready_path: String,
    #[serde(default = "default_ingest_path")]
    pub ingest_path: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_mode")]
    pub mode: String,
    #[serde(default = "default_frame_path")]
    pub frame_path: PathBuf,
    /// Program and arguments; `{output}` is replaced by `frame_path`.
    #[serde(default = "default_capture_command")]
    pub command: Vec<String>,
    #[serde(default = "default_capture_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ready_path: default_ready_path(),
            ingest_path: default_ingest_path(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: default_capture_mode(),
            frame_path: default_frame_path(),
            command: default_capture_command(),
            timeout_secs: default_capture_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.backend.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::Invalid("backend.base_url is empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "backend.base_url must start with http:// or https://, got {base}"
            )));
        }
        if self.backend.connect_timeout_secs == 0 || self.backend.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend timeouts must be at least one second".into(),
            ));
        }
        if self.agent.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_consecutive_failures must be at least 1".into(),
            ));
        }
        match self.capture.mode.as_str() {
            "stub" => {}
            "command" => {
                if self.capture.command.is_empty() {
                    return Err(ConfigError::Invalid(
                        "capture.command is required when capture.mode = \"command\"".into(),
                    ));
                }
                if self.capture.timeout_secs == 0 {
                    return Err(ConfigError::Invalid(
                        "capture.timeout_secs must be at least one second".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown capture.mode '{other}', expected 'stub' or 'command'"
                )));
            }
        }
        Ok(())
    }
}

impl BackendConfig {
    pub fn ready_url(&self) -> String {
        join_url(&self.base_url, &self.ready_path)
    }

    pub fn ingest_url(&self) -> String {
        join_url(&self.base_url, &self.ingest_path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl CaptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim().trim_start_matches('/')
    )
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_ready_path() -> String {
    "/api/frames/ready/".into()
}
fn default_ingest_path() -> String {
    "/api/frames/ingest/".into()
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_request_timeout() -> u64 {
    15
}
fn default_poll_interval() -> u64 {
    5
}
fn default_max_consecutive_failures() -> u32 {
    3
}
fn default_capture_mode() -> String {
    "stub".into()
}
fn default_frame_path() -> PathBuf {
    PathBuf::from("/tmp/frame.jpg")
}
fn default_capture_command() -> Vec<String> {
    [
        "libcamera-still",
        "-o",
        "{output}",
        "-t",
        "100",
        "--width",
        "640",
        "--height",
        "480",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_capture_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.agent.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.agent.max_consecutive_failures, 3);
        assert_eq!(config.capture.mode, "stub");
        assert_eq!(config.capture.frame_path, PathBuf::from("/tmp/frame.jpg"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn urls_join_without_double_slash() {
        let config = Config::parse(
            r#"
            [backend]
            base_url = "http://10.0.0.2:8000/"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.backend.ready_url(),
            "http://10.0.0.2:8000/api/frames/ready/"
        );
        assert_eq!(
            config.backend.ingest_url(),
            "http://10.0.0.2:8000/api/frames/ingest/"
        );
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::parse(
            r#"
            [agent]
            poll_interval_secs = 1
            max_consecutive_failures = 7

            [capture]
            mode = "command"
            frame_path = "/var/tmp/cam.jpg"
            command = ["fswebcam", "{output}"]
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.poll_interval_secs, 1);
        assert_eq!(config.agent.max_consecutive_failures, 7);
        assert_eq!(config.capture.command, vec!["fswebcam", "{output}"]);
        assert_eq!(config.capture.frame_path, PathBuf::from("/var/tmp/cam.jpg"));
    }

    #[test]
    fn zero_threshold_rejected() {
        let err = Config::parse("[agent]\nmax_consecutive_failures = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn base_url_without_scheme_rejected() {
        let err = Config::parse("[backend]\nbase_url = \"localhost:8000\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_capture_mode_rejected() {
        let err = Config::parse("[capture]\nmode = \"v4l2\"\n").unwrap_err();
        assert!(err.to_string().contains("v4l2"));
    }

    #[test]
    fn command_mode_requires_command() {
        let err = Config::parse("[capture]\nmode = \"command\"\ncommand = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::parse("[agent\npoll_interval_secs = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\npoll_interval_secs = 2\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.agent.poll_interval_secs, 2);
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(_, _)));
    }
}
