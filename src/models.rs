use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};

/// Authenticated user record returned by the identity endpoint.
///
/// Timestamps are kept as the raw strings the backend emits; the client
/// never does arithmetic on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub last_login: Option<String>,
}

/// Response from the form-encoded token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Model training hyperparameters.
///
/// Field names serialize in camelCase to match the backend's config schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: u32,
    #[serde(rename = "batchSize")]
    pub batch_size: u32,
    #[serde(rename = "learningRate")]
    pub learning_rate: f64,
    #[serde(rename = "validationSplit")]
    pub validation_split: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            learning_rate: 0.001,
            validation_split: 0.2,
        }
    }
}

impl TrainingConfig {
    /// Validate against the server's accepted ranges. Out-of-range values
    /// are rejected here rather than coerced, both for locally edited
    /// configs and for adjusted configs echoed back by the server.
    pub fn validate(&self) -> Result<()> {
        if self.epochs < 1 || self.epochs > 100 {
            return Err(ClientError::Validation(format!(
                "invalid epochs value: {}. Must be between 1 and 100",
                self.epochs
            )));
        }
        if self.batch_size < 1 || self.batch_size > 512 {
            return Err(ClientError::Validation(format!(
                "invalid batch size: {}. Must be between 1 and 512",
                self.batch_size
            )));
        }
        if self.learning_rate <= 0.0 || self.learning_rate >= 1.0 {
            return Err(ClientError::Validation(format!(
                "invalid learning rate: {}. Must be between 0 and 1",
                self.learning_rate
            )));
        }
        if self.validation_split <= 0.0 || self.validation_split >= 1.0 {
            return Err(ClientError::Validation(format!(
                "invalid validation split: {}. Must be between 0 and 1",
                self.validation_split
            )));
        }
        Ok(())
    }
}

/// Request body for the config adjustment endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustedConfigRequest {
    pub config: TrainingConfig,
    pub num_files: usize,
}

/// Response from the training start endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTrainingResponse {
    pub task_id: String,
    /// Estimated runtime in minutes. The server may omit this.
    #[serde(default)]
    pub estimated_duration: Option<u64>,
}

/// Response from the training stop endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopTrainingResponse {
    pub message: String,
}

/// Scalar metric series accumulated over the course of a training run.
///
/// The push channel delivers these as cumulative arrays; see
/// [`TrainingMetrics::extend_from`] for how updates are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    #[serde(default)]
    pub loss: Vec<f64>,
    #[serde(default)]
    pub accuracy: Vec<f64>,
    #[serde(default)]
    pub validation_loss: Vec<f64>,
    #[serde(default)]
    pub validation_accuracy: Vec<f64>,
}

impl TrainingMetrics {
    /// Append the samples from `update` that we have not seen yet. The
    /// channel sends cumulative series, so only the tail beyond our current
    /// length is new; shorter or equal-length series carry nothing new.
    pub fn extend_from(&mut self, update: &TrainingMetrics) {
        fn append_tail(dst: &mut Vec<f64>, src: &[f64]) {
            if src.len() > dst.len() {
                dst.extend_from_slice(&src[dst.len()..]);
            }
        }
        append_tail(&mut self.loss, &update.loss);
        append_tail(&mut self.accuracy, &update.accuracy);
        append_tail(&mut self.validation_loss, &update.validation_loss);
        append_tail(&mut self.validation_accuracy, &update.validation_accuracy);
    }
}

/// Incremental status object delivered over the training progress channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStatus {
    pub progress: u8,
    pub is_training: bool,
    #[serde(default)]
    pub current_epoch: u32,
    #[serde(default)]
    pub total_epochs: u32,
    #[serde(default)]
    pub current_batch: u32,
    #[serde(default)]
    pub total_batches: u32,
    #[serde(default)]
    pub metrics: Option<TrainingMetrics>,
    #[serde(default)]
    pub training_visualization: Option<String>,
}

/// Uploaded document handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
}

/// Request body for the document comparison endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    pub document1_id: String,
    pub document2_id: String,
}

/// A single difference found between two documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Difference {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub location: String,
}

/// Result of a document comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    #[serde(default)]
    pub comparison_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub differences: Vec<Difference>,
}
