use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::RemoteClassifierError, types::Classification};
use super::{ClassifyRequest, RemoteClassifier};

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: &'a [ClassifyRequest],
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

/// Endpoints answer either with bare labels or with `{ "label": ... }` objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum Prediction {
    Label(String),
    Object { #[serde(alias = "buildingType", alias = "classification")] label: String },
}

impl Prediction {
    fn label(&self) -> &str {
        match self {
            Prediction::Label(label) | Prediction::Object { label } => label,
        }
    }
}

/// Blocking HTTP client for a prediction endpoint taking `{"instances": [...]}` and answering
/// `{"predictions": [...]}`.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RemoteClassifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RemoteClassifierError::Transport(e.to_string()))?;
        Ok(Self { client, endpoint: endpoint.into(), api_key: None })
    }

    /// Send the key as `X-Goog-Api-Key` with every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

impl RemoteClassifier for HttpClassifier {
    fn classify_batch(&self, batch: &[ClassifyRequest]) -> Result<Vec<Classification>, RemoteClassifierError> {
        debug!(endpoint = %self.endpoint, size = batch.len(), "[classify::http] POST");

        let mut request = self.client.post(&self.endpoint).json(&PredictRequest { instances: batch });
        if let Some(key) = &self.api_key {
            request = request.header("X-Goog-Api-Key", key);
        }
        let response = request.send().map_err(|e| RemoteClassifierError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| RemoteClassifierError::Transport(e.to_string()))?;
        interpret_response(status, &body, batch.len())
    }
}

/// Turn a raw endpoint answer into exactly `expected` labels, or the batch error it amounts to.
fn interpret_response(status: u16, body: &str, expected: usize) -> Result<Vec<Classification>, RemoteClassifierError> {
    if !(200..300).contains(&status) {
        return Err(RemoteClassifierError::Status { status, body: body.to_string() });
    }

    let parsed: PredictResponse = serde_json::from_str(body)
        .map_err(|e| RemoteClassifierError::Malformed(e.to_string()))?;
    if parsed.predictions.len() != expected {
        return Err(RemoteClassifierError::CountMismatch { expected, got: parsed.predictions.len() });
    }

    parsed.predictions.iter()
        .map(|p| p.label().parse::<Classification>()
            .map_err(|_| RemoteClassifierError::UnknownLabel(p.label().to_string())))
        .collect()
}
