use super::Classifier;
use crate::types::classification::{Category, Classification};
use crate::types::config::ClassifierSettings;
use crate::types::photo::PhotoSlot;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image_base64: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    category: Category,
    confidence: f64,
}

#[derive(Debug, Error)]
enum ClassifyFailure {
    #[error("slot has no image payload")]
    EmptySlot,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned {0}")]
    Status(StatusCode),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
}

pub fn build_client(settings: &ClassifierSettings) -> Client {
    Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, settings: &ClassifierSettings) -> Self {
        Self {
            client: build_client(settings),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, slot: &PhotoSlot) -> Result<Classification, ClassifyFailure> {
        let payload = slot.payload_base64().ok_or(ClassifyFailure::EmptySlot)?;
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest {
                image_base64: &payload,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyFailure::Status(status));
        }

        let body = response.text().await?;
        let parsed: ClassifyResponse = serde_json::from_str(&body)?;
        Ok(Classification::new(parsed.category, parsed.confidence))
    }
}

impl Classifier for HttpClassifier {
    fn classify(&self, slot: &PhotoSlot) -> impl Future<Output = Classification> + Send {
        async move {
            match self.request(slot).await {
                Ok(classification) => {
                    tracing::debug!(
                        category = %classification.category,
                        confidence = classification.confidence,
                        photo = slot.file_name.as_deref().unwrap_or("-"),
                        "classified"
                    );
                    classification
                }
                Err(failure) => {
                    tracing::warn!(
                        error = %failure,
                        photo = slot.file_name.as_deref().unwrap_or("-"),
                        "classification unavailable, using neutral fallback"
                    );
                    Classification::fallback()
                }
            }
        }
    }
}
