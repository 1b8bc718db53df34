use std::sync::Arc;

use crate::error::{AdvisorError, AdvisorResult};
use crate::handlers::Presenter;
use crate::models::{InferenceRequest, InferenceResult, RequestState, StagedFile, UploadedAsset};
use crate::services::{InferenceClient, StagingStore};

pub const MISSING_IMAGE_MESSAGE: &str = "Please upload an image first.";

/// Drives one submission: validate, stage, ingest, generate, present, unstage.
pub struct RequestHandler {
    staging: StagingStore,
    client: Arc<dyn InferenceClient>,
    instruction: String,
}

impl RequestHandler {
    pub fn new(staging: StagingStore, client: Arc<dyn InferenceClient>, instruction: String) -> Self {
        Self {
            staging,
            client,
            instruction,
        }
    }

    /// Runs a submission to completion and returns the state it ended in.
    ///
    /// Validation problems leave the request `Idle` without touching disk or network.
    /// Once a file is staged it is removed again on every path.
    pub async fn submit(&self, asset: Option<UploadedAsset>, presenter: &mut dyn Presenter) -> RequestState {
        let asset = match validate(asset) {
            Ok(asset) => asset,
            Err(e) => {
                log::warn!("⚠️ Rejected submission: {}", e);
                presenter.report_error(e);
                return RequestState::Idle;
            }
        };

        log::info!(
            "📸 Submission received: {} ({}, {} bytes)",
            asset.filename,
            asset.mime_type,
            asset.bytes.len()
        );

        let staged = match self.staging.stage(&asset).await {
            Ok(staged) => staged,
            Err(e) => {
                log::error!("❌ Could not stage {}: {}", asset.filename, e);
                presenter.report_error(e);
                return RequestState::Failed;
            }
        };
        drop(asset);
        log::debug!("{} -> {}: {}", RequestState::Idle, RequestState::Staged, staged.path.display());

        let state = match self.infer(&staged).await {
            Ok(result) => {
                log::debug!("{} -> {}", RequestState::Inferred, RequestState::Done);
                presenter.present(result);
                RequestState::Done
            }
            Err(e) => {
                log::error!("❌ Image analysis error: {}", e);
                presenter.report_error(e);
                RequestState::Failed
            }
        };

        self.staging.unstage(staged).await;
        log::info!("✅ Submission finished: {}", state);
        state
    }

    async fn infer(&self, staged: &StagedFile) -> AdvisorResult<InferenceResult> {
        let handle = self.client.ingest(staged).await?;
        let request = InferenceRequest::new(handle, self.instruction.as_str());
        let text = self.client.generate(&request).await?;
        log::debug!("{} -> {}", RequestState::Staged, RequestState::Inferred);

        Ok(InferenceResult {
            text,
            handle: request.handle,
        })
    }
}

fn validate(asset: Option<UploadedAsset>) -> AdvisorResult<UploadedAsset> {
    let asset = match asset {
        Some(asset) if !asset.bytes.is_empty() => asset,
        _ => return Err(AdvisorError::validation(MISSING_IMAGE_MESSAGE)),
    };

    if !asset.is_supported() {
        return Err(AdvisorError::validation(format!(
            "Unsupported file type '{}'. Please upload a JPG or PNG image.",
            asset.mime_type
        )));
    }

    Ok(asset)
}
