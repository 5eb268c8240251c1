use std::path::{Path, PathBuf};

/// Content type sent with every uploaded frame.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// A frame written to its transient on-disk location by a frame source.
///
/// The frame lives for a single loop iteration: it is uploaded once and then
/// discarded, whatever the upload outcome.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    path: PathBuf,
    pub content_type: &'static str,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl CapturedFrame {
    pub fn new(path: impl Into<PathBuf>, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            path: path.into(),
            content_type: JPEG_CONTENT_TYPE,
            captured_at_ms,
            seq,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name presented to the backend, e.g. `20240219T000640123Z_000042.jpg`.
    pub fn upload_name(&self) -> String {
        let dt = chrono::DateTime::from_timestamp_millis(self.captured_at_ms)
            .unwrap_or_else(chrono::Utc::now);
        format!(
            "{ts}_{seq:06}.jpg",
            ts = dt.format("%Y%m%dT%H%M%S%3fZ"),
            seq = self.seq
        )
    }

    /// Remove the artifact from disk. Returns `Ok(false)` if it was already gone.
    pub fn discard(self) -> std::io::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_name_encodes_timestamp_and_seq() {
        let frame = CapturedFrame::new("/tmp/frame.jpg", 1708300000000, 7);
        let name = frame.upload_name();
        assert!(name.starts_with("20240218T"));
        assert!(name.ends_with("_000007.jpg"));
    }

    #[test]
    fn content_type_is_jpeg() {
        let frame = CapturedFrame::new("/tmp/frame.jpg", 0, 0);
        assert_eq!(frame.content_type, "image/jpeg");
    }

    #[test]
    fn discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let frame = CapturedFrame::new(&path, 0, 1);
        assert!(frame.discard().unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn discard_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let frame = CapturedFrame::new(dir.path().join("gone.jpg"), 0, 1);
        assert!(!frame.discard().unwrap());
    }
}
