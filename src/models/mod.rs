use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Image types the upload form accepts.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// A file as the user submitted it.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

impl UploadedAsset {
    pub fn new(bytes: Vec<u8>, mime_type: Option<&str>, filename: &str) -> Self {
        let declared = mime_type
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty());

        // Clients sometimes declare non-standard types like image/jpg; trust the extension then
        let mime_type = match declared {
            Some(m) if SUPPORTED_MIME_TYPES.contains(&m.as_str()) => m,
            Some(m) => {
                let guessed = mime_type_from_filename(filename);
                if SUPPORTED_MIME_TYPES.contains(&guessed) {
                    guessed.to_string()
                } else {
                    m
                }
            }
            None => mime_type_from_filename(filename).to_string(),
        };

        Self {
            bytes,
            mime_type,
            filename: filename.to_string(),
        }
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_MIME_TYPES.contains(&self.mime_type.as_str())
    }
}

/// Guess a media type from the file extension when the browser did not declare one.
pub fn mime_type_from_filename(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// Transient on-disk copy of an upload. Lives for exactly one request.
#[derive(Debug)]
pub struct StagedFile {
    pub path: PathBuf,
    pub mime_type: String,
    pub display_name: String,
}

/// Opaque reference to a file already ingested by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFileHandle {
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub display_name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RemoteFileHandle {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub handle: RemoteFileHandle,
    pub instruction: String,
}

impl InferenceRequest {
    pub fn new(handle: RemoteFileHandle, instruction: impl Into<String>) -> Self {
        Self {
            handle,
            instruction: instruction.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub text: String,
    pub handle: RemoteFileHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Staged,
    Inferred,
    Done,
    Failed,
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestState::Idle => "idle",
            RequestState::Staged => "staged",
            RequestState::Inferred => "inferred",
            RequestState::Done => "done",
            RequestState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_declared_mime_type_wins() {
        let asset = UploadedAsset::new(vec![1], Some("IMAGE/PNG"), "meal.jpg");
        assert_eq!(asset.mime_type, "image/png");
        assert!(asset.is_supported());
    }

    #[test]
    fn test_mime_type_falls_back_to_extension() {
        let asset = UploadedAsset::new(vec![1], Some("application/octet-stream"), "Lunch.JPEG");
        assert_eq!(asset.mime_type, "image/jpeg");

        let asset = UploadedAsset::new(vec![1], None, "notes.txt");
        assert_eq!(asset.mime_type, "application/octet-stream");
        assert!(!asset.is_supported());
    }

    #[test]
    fn test_nonstandard_declared_type_uses_extension() {
        let asset = UploadedAsset::new(vec![1], Some("image/jpg"), "meal.jpg");
        assert_eq!(asset.mime_type, "image/jpeg");
        assert!(asset.is_supported());

        let asset = UploadedAsset::new(vec![1], Some("image/gif"), "anim.gif");
        assert_eq!(asset.mime_type, "image/gif");
        assert!(!asset.is_supported());
    }

    #[test]
    fn test_handle_expiry() {
        let now = Utc::now();
        let mut handle = RemoteFileHandle {
            name: "files/abc".to_string(),
            uri: "https://example.invalid/files/abc".to_string(),
            mime_type: "image/png".to_string(),
            display_name: "meal.png".to_string(),
            expires_at: None,
        };
        assert!(!handle.is_expired(now));

        handle.expires_at = Some(now - Duration::minutes(1));
        assert!(handle.is_expired(now));

        handle.expires_at = Some(now + Duration::hours(48));
        assert!(!handle.is_expired(now));
    }
}
