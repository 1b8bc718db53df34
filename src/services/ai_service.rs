use crate::error::AdvisorResult;
use crate::models::{InferenceRequest, RemoteFileHandle, StagedFile};

/// Trait for multimodal AI backends (Gemini, test stubs, ...)
#[async_trait::async_trait]
pub trait InferenceClient: Send + Sync {
    /// Upload a staged file and get back a handle the model can reference.
    async fn ingest(&self, staged: &StagedFile) -> AdvisorResult<RemoteFileHandle>;

    /// Run one single-turn generation over the file and instruction. No retries.
    async fn generate(&self, request: &InferenceRequest) -> AdvisorResult<String>;
}
