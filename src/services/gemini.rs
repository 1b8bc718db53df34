use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ai_service::InferenceClient;
use crate::config::{GeminiConfig, GenerationSettings};
use crate::error::{AdvisorError, AdvisorResult};
use crate::models::{InferenceRequest, RemoteFileHandle, StagedFile};

const FILE_POLL_ATTEMPTS: u32 = 10;
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
struct UploadStart<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    uri: String,
    mime_type: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    expiration_time: Option<DateTime<Utc>>,
}

impl GeminiFile {
    fn state(&self) -> &str {
        self.state.as_deref().unwrap_or("ACTIVE")
    }

    fn into_handle(self) -> RemoteFileHandle {
        RemoteFileHandle {
            name: self.name,
            uri: self.uri,
            mime_type: self.mime_type,
            display_name: self.display_name,
            expires_at: self.expiration_time,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationSettings,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    File { file_data: FileData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Google Gemini over its public REST API.
pub struct GeminiService {
    api_key: String,
    model: String,
    api_base: String,
    generation: GenerationSettings,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl GeminiService {
    pub fn new(config: &GeminiConfig) -> AdvisorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdvisorError::configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_base: config.api_base.clone(),
            generation: config.generation.clone(),
            poll_interval: FILE_POLL_INTERVAL,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Opens a resumable upload session and returns its upload URL.
    async fn start_upload(&self, staged: &StagedFile, size: usize) -> AdvisorResult<String> {
        let response = self
            .client
            .post(format!("{}/upload/v1beta/files", self.api_base))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", &staged.mime_type)
            .json(&UploadStart {
                file: UploadMetadata {
                    display_name: &staged.display_name,
                },
            })
            .send()
            .await?;

        let response = check_status(response).await?;

        response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AdvisorError::UpstreamRejected("upload session has no upload URL".to_string()))
    }

    async fn wait_until_active(&self, mut file: GeminiFile) -> AdvisorResult<GeminiFile> {
        for attempt in 1..=FILE_POLL_ATTEMPTS {
            match file.state() {
                "ACTIVE" => return Ok(file),
                "PROCESSING" => {
                    log::debug!("⏳ {} still processing (attempt {}/{})", file.name, attempt, FILE_POLL_ATTEMPTS);
                    tokio::time::sleep(self.poll_interval).await;

                    let response = self
                        .client
                        .get(format!("{}/v1beta/{}", self.api_base, file.name))
                        .header("x-goog-api-key", &self.api_key)
                        .send()
                        .await?;
                    file = check_status(response).await?.json().await?;
                }
                other => {
                    return Err(AdvisorError::UpstreamRejected(format!(
                        "file {} is in state {}",
                        file.name, other
                    )))
                }
            }
        }

        if file.state() == "ACTIVE" {
            Ok(file)
        } else {
            Err(AdvisorError::UpstreamRejected(format!(
                "file {} was not ready after {} checks",
                file.name, FILE_POLL_ATTEMPTS
            )))
        }
    }
}

#[async_trait::async_trait]
impl InferenceClient for GeminiService {
    async fn ingest(&self, staged: &StagedFile) -> AdvisorResult<RemoteFileHandle> {
        let bytes = tokio::fs::read(&staged.path).await?;
        log::debug!("📊 Uploading {} ({} bytes, {})", staged.display_name, bytes.len(), staged.mime_type);

        let upload_url = self.start_upload(staged, bytes.len()).await?;

        let response = self
            .client
            .post(&upload_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;

        let upload: UploadResponse = check_status(response).await?.json().await?;
        let file = self.wait_until_active(upload.file).await?;

        log::info!("📤 Uploaded file '{}' as: {}", file.display_name, file.uri);
        Ok(file.into_handle())
    }

    async fn generate(&self, request: &InferenceRequest) -> AdvisorResult<String> {
        if request.handle.is_expired(Utc::now()) {
            return Err(AdvisorError::UpstreamRejected(format!(
                "remote file {} has expired",
                request.handle.name
            )));
        }

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::File {
                        file_data: FileData {
                            mime_type: &request.handle.mime_type,
                            file_uri: &request.handle.uri,
                        },
                    },
                    Part::Text {
                        text: &request.instruction,
                    },
                ],
            }],
            generation_config: &self.generation,
        };

        log::info!("🤖 Sending request to Gemini with model: {}", self.model);

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.api_base, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let response_text = response.text().await?;
        log::debug!("📄 Raw Gemini response size: {} bytes", response_text.len());

        let parsed: GenerateResponse = serde_json::from_str(&response_text)?;
        extract_text(parsed)
    }
}

/// Maps non-2xx responses onto the error taxonomy, keeping the body for the user.
async fn check_status(response: reqwest::Response) -> AdvisorResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    log::error!("❌ Gemini API error response ({}): {}", status, error_text);

    if status.is_client_error() {
        Err(AdvisorError::UpstreamRejected(format!("{}: {}", status, error_text)))
    } else {
        Err(AdvisorError::UpstreamUnavailable(format!("{}: {}", status, error_text)))
    }
}

fn extract_text(response: GenerateResponse) -> AdvisorResult<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(AdvisorError::UpstreamRejected(format!("prompt blocked: {}", reason)));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(AdvisorError::UpstreamRejected(format!(
            "model returned no text (finish reason: {})",
            reason
        )));
    }

    Ok(text)
}
