use crate::error::{ClientError, Result};
use crate::models::{
    AdjustedConfigRequest, CompareRequest, ComparisonReport, Document, StartTrainingResponse,
    StopTrainingResponse, TokenResponse, TrainingConfig, User,
};
use reqwest::{multipart, Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 300; // generous, multipart uploads can be large

/// Error body shape used by the backend. Older endpoints report `message`,
/// newer ones `detail`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Envelope wrapper used by the document and project endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// HTTP client for the document analysis backend.
///
/// Holds no credential of its own: every authenticated method takes the
/// bearer token per call, so the session layer stays the single owner of
/// the stored credential.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange credentials for a bearer token via the form-encoded token
    /// endpoint. The backend expects the email in the `username` field.
    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        let url = format!("{}/auth/token", self.base_url);
        let form = [("username", email), ("password", password)];

        let response = self.client.post(&url).form(&form).send().await?;
        let response = Self::error_for_status(response).await?;

        let body: TokenResponse = response.json().await?;
        if body.access_token.is_empty() {
            return Err(ClientError::Validation(
                "token endpoint returned an empty access_token".to_string(),
            ));
        }

        Ok(body.access_token)
    }

    /// Fetch the user record behind a bearer token. A 401 here means the
    /// token is no longer valid on the server.
    pub async fn current_user(&self, token: &str) -> Result<User> {
        let url = format!("{}/auth/me", self.base_url);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let response = Self::error_for_status(response).await?;

        Ok(response.json().await?)
    }

    /// Start a model training job. Returns the server-issued task id and
    /// an optional runtime estimate in minutes.
    pub async fn start_training(
        &self,
        token: &str,
        files: Vec<(String, Vec<u8>)>,
        config: &TrainingConfig,
    ) -> Result<StartTrainingResponse> {
        config.validate()?;

        let url = format!("{}/admin/train-model", self.base_url);

        let config_json = serde_json::to_string(config)
            .map_err(|e| ClientError::Validation(format!("failed to encode config: {}", e)))?;

        let mut form = multipart::Form::new().text("config", config_json);
        for (file_name, bytes) in files {
            form = form.part(
                "training_files",
                multipart::Part::bytes(bytes).file_name(file_name),
            );
        }

        log::info!("📤 Starting training job");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;

        let body: StartTrainingResponse = response.json().await?;
        if body.task_id.is_empty() {
            return Err(ClientError::Validation(
                "training start response is missing task_id".to_string(),
            ));
        }

        log::info!("✅ Training job started: {}", body.task_id);

        Ok(body)
    }

    /// Stop the running training job.
    pub async fn stop_training(&self, token: &str) -> Result<StopTrainingResponse> {
        let url = format!("{}/admin/stop-training", self.base_url);

        log::info!("🛑 Stopping training job");

        let response = self.client.post(&url).bearer_auth(token).send().await?;
        let response = Self::error_for_status(response).await?;

        let body: StopTrainingResponse = response.json().await?;
        if body.message.is_empty() {
            return Err(ClientError::Validation(
                "stop response is missing message".to_string(),
            ));
        }

        Ok(body)
    }

    /// Ask the server to adjust the training configuration for the number
    /// of files selected. The returned config is validated against the
    /// same ranges the server enforces.
    pub async fn adjusted_config(
        &self,
        token: &str,
        config: &TrainingConfig,
        num_files: usize,
    ) -> Result<TrainingConfig> {
        let url = format!("{}/admin/get-adjusted-config", self.base_url);
        let request = AdjustedConfigRequest {
            config: config.clone(),
            num_files,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;

        let adjusted: TrainingConfig = response.json().await?;
        adjusted.validate()?;

        Ok(adjusted)
    }

    /// Upload a document for analysis.
    pub async fn upload_document(
        &self,
        token: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Document> {
        let url = format!("{}/documents/upload", self.base_url);

        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(bytes).file_name(file_name.to_string()),
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;

        let body: Envelope<Document> = response.json().await?;
        Ok(body.data)
    }

    /// Request a comparison of two uploaded documents.
    pub async fn compare_documents(
        &self,
        token: &str,
        document1_id: &str,
        document2_id: &str,
    ) -> Result<ComparisonReport> {
        let url = format!("{}/documents/compare", self.base_url);
        let request = CompareRequest {
            document1_id: document1_id.to_string(),
            document2_id: document2_id.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;

        let body: Envelope<ComparisonReport> = response.json().await?;
        Ok(body.data)
    }

    /// Fetch a previously requested comparison.
    pub async fn get_comparison(&self, token: &str, comparison_id: &str) -> Result<ComparisonReport> {
        let url = format!("{}/documents/comparison/{}", self.base_url, comparison_id);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let response = Self::error_for_status(response).await?;

        let body: Envelope<ComparisonReport> = response.json().await?;
        Ok(body.data)
    }

    /// Map non-success statuses to the error taxonomy, pulling the server's
    /// human-readable message out of the body when one is present.
    async fn error_for_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let detail = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.detail.or(body.message))
                .unwrap_or_else(|| "Unknown error".to_string());
            log::error!("request failed: {} - {}", status, detail);
            return Err(ClientError::Transport(format!(
                "server responded with status {}: {}",
                status.as_u16(),
                detail
            )));
        }
        Ok(response)
    }
}
