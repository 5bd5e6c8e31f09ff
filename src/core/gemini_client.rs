//! Remote AI service client
//!
//! [`RemoteAssetService`] is the boundary to the hosted multimodal model:
//! upload a file, read its processing state, generate content against it
//! and delete it. [`GeminiClient`] implements it over the Gemini REST API.

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::config::GeminiConfig;
use crate::core::models::{AppError, AppResult, LocalVideoFile, RemoteVideoAsset};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Operations consumed from the remote AI processing service
#[async_trait]
pub trait RemoteAssetService: Send + Sync {
    /// Upload a local file and return its asset handle
    async fn upload(&self, file: &LocalVideoFile) -> AppResult<RemoteVideoAsset>;

    /// Re-fetch the asset, including its current processing state
    async fn get_status(&self, name: &str) -> AppResult<RemoteVideoAsset>;

    /// Generate text for `asset` conditioned on `prompt`
    async fn generate(
        &self,
        asset: &RemoteVideoAsset,
        prompt: &str,
        timeout: Duration,
    ) -> AppResult<String>;

    async fn delete(&self, name: &str) -> AppResult<()>;
}

#[async_trait]
impl<T: RemoteAssetService + ?Sized> RemoteAssetService for Arc<T> {
    async fn upload(&self, file: &LocalVideoFile) -> AppResult<RemoteVideoAsset> {
        (**self).upload(file).await
    }

    async fn get_status(&self, name: &str) -> AppResult<RemoteVideoAsset> {
        (**self).get_status(name).await
    }

    async fn generate(
        &self,
        asset: &RemoteVideoAsset,
        prompt: &str,
        timeout: Duration,
    ) -> AppResult<String> {
        (**self).generate(asset, prompt, timeout).await
    }

    async fn delete(&self, name: &str) -> AppResult<()> {
        (**self).delete(name).await
    }
}

/// Gemini REST API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client from explicit configuration; the API key must be present
    pub fn new(config: &GeminiConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::Configuration("GOOGLE_API_KEY is not set".to_string()))?
            .to_string();

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name.trim_start_matches('/'))
    }

    fn generate_url(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/v1beta/files", self.base_url)
    }
}

#[async_trait]
impl RemoteAssetService for GeminiClient {
    async fn upload(&self, file: &LocalVideoFile) -> AppResult<RemoteVideoAsset> {
        let size = tokio::fs::metadata(&file.path).await?.len();
        let display_name = file
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.title.clone());

        info!(
            "☁️ Uploading {} ({} bytes, {})",
            file.path.display(),
            size,
            file.mime_type
        );

        let start = self
            .client
            .post(self.upload_url())
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", &file.mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Failed to start upload: {}", e)))?;

        let start = ensure_success(start, AppError::Upload).await?;

        let session_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::Upload("Upload session URL missing from response".into()))?;

        let body = tokio::fs::File::open(&file.path).await?;
        let finished = self
            .client
            .post(&session_url)
            .header(CONTENT_LENGTH, size)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(reqwest::Body::from(body))
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Failed to send video bytes: {}", e)))?;

        let finished = ensure_success(finished, AppError::Upload).await?;
        let envelope: FileEnvelope = finished
            .json()
            .await
            .map_err(|e| AppError::Upload(format!("Failed to parse upload response: {}", e)))?;

        info!(
            "✅ Uploaded as {} (state {})",
            envelope.file.name, envelope.file.state
        );
        Ok(envelope.file)
    }

    async fn get_status(&self, name: &str) -> AppResult<RemoteVideoAsset> {
        let asset = self
            .client
            .get(self.resource_url(name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<RemoteVideoAsset>()
            .await?;

        debug!("Asset {} is {}", asset.name, asset.state);
        Ok(asset)
    }

    async fn generate(
        &self,
        asset: &RemoteVideoAsset,
        prompt: &str,
        timeout: Duration,
    ) -> AppResult<String> {
        let request = GenerateContentRequest::for_asset(asset, prompt);

        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| generation_transport_error(e, timeout))?;

        let response = ensure_success(response, AppError::Generation).await?;
        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| generation_transport_error(e, timeout))?;

        extract_text(body)
    }

    async fn delete(&self, name: &str) -> AppResult<()> {
        self.client
            .delete(self.resource_url(name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?
            .error_for_status()?;

        debug!("Deleted remote asset {}", name);
        Ok(())
    }
}

async fn ensure_success(
    response: Response,
    wrap: impl FnOnce(String) -> AppError,
) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);

    Err(wrap(format!("status {}: {}", status, detail.trim())))
}

fn generation_transport_error(error: reqwest::Error, timeout: Duration) -> AppError {
    if error.is_timeout() {
        AppError::Generation(format!("request timed out after {}s", timeout.as_secs()))
    } else {
        AppError::Generation(error.to_string())
    }
}

/// Concatenate the text parts of the first candidate
pub(crate) fn extract_text(response: GenerateContentResponse) -> AppResult<String> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(AppError::Generation(format!("prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Generation("response contained no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(AppError::Generation(format!(
            "response contained no text (finish reason {})",
            reason
        )));
    }

    Ok(text)
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: RemoteVideoAsset,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

impl GenerateContentRequest {
    fn for_asset(asset: &RemoteVideoAsset, prompt: &str) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![
                    RequestPart::FileData {
                        file_data: FileData {
                            mime_type: asset.mime_type.clone(),
                            file_uri: asset.uri.clone(),
                        },
                    },
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    FileData { file_data: FileData },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
