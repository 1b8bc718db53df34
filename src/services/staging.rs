use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AdvisorResult;
use crate::models::{StagedFile, UploadedAsset};

/// Longest sanitized filename kept after the uuid prefix. Filesystems cap names at 255 bytes.
const MAX_NAME_LEN: usize = 128;
const MAX_EXTENSION_LEN: usize = 16;

/// Writes uploads to a local directory for the duration of one request.
#[derive(Debug, Clone)]
pub struct StagingStore {
    dir: PathBuf,
}

impl StagingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn stage(&self, asset: &UploadedAsset) -> AdvisorResult<StagedFile> {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            log::error!("❌ Failed to create staging directory {}: {}", self.dir.display(), e);
            return Err(e.into());
        }

        // The uuid prefix keeps concurrent uploads of the same filename apart
        let path = self.dir.join(format!(
            "{}-{}",
            uuid::Uuid::new_v4().simple(),
            sanitize_filename(&asset.filename)
        ));

        log::debug!("💾 Writing {} bytes to: {}", asset.bytes.len(), path.display());
        if let Err(e) = tokio::fs::write(&path, &asset.bytes).await {
            log::error!("❌ Failed to write staged file {}: {} ({:?})", path.display(), e, e.kind());
            // A partial write may have left something behind
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        Ok(StagedFile {
            path,
            mime_type: asset.mime_type.clone(),
            display_name: asset.filename.clone(),
        })
    }

    /// Deletes a staged file. Never fails the request.
    pub async fn unstage(&self, file: StagedFile) {
        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => log::debug!("🧹 Removed staged file: {}", file.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("Staged file already gone: {}", file.path.display());
            }
            Err(e) => {
                log::warn!("⚠️ Could not remove staged file {}: {}", file.path.display(), e);
            }
        }
    }
}

/// Reduces a browser-supplied filename to a safe single path component.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return "upload".to_string();
    }
    if cleaned.len() <= MAX_NAME_LEN {
        return cleaned.to_string();
    }

    // Only ASCII survives the mapping above, so byte slicing is safe
    match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot <= MAX_EXTENSION_LEN => {
            let (stem, ext) = cleaned.split_at(dot);
            format!("{}{}", &stem[..MAX_NAME_LEN - ext.len()], ext)
        }
        _ => cleaned[..MAX_NAME_LEN].to_string(),
    }
}
