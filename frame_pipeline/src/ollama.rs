use crate::frame::EncodedImage;
use crate::inference::{InferenceClient, InferenceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

const GENERATE_PATH: &str = "/api/generate";
const EMPTY_RESPONSE_TEXT: &str = "No response received";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Client for an Ollama-compatible `/api/generate` endpoint serving a
/// vision model.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(endpoint: &str, model: &str) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            url: format!("{}{}", endpoint.trim_end_matches('/'), GENERATE_PATH),
            model: model.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn build_request<'a>(
    model: &'a str,
    image: &EncodedImage,
    instruction: &'a str,
) -> GenerateRequest<'a> {
    GenerateRequest {
        model,
        prompt: instruction,
        stream: false,
        images: vec![image.to_base64()],
    }
}

fn parse_response(body: &[u8]) -> Result<String, InferenceError> {
    let parsed: GenerateResponse = serde_json::from_slice(body)
        .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
    Ok(parsed
        .response
        .unwrap_or_else(|| EMPTY_RESPONSE_TEXT.to_string()))
}

fn map_transport_error(err: reqwest::Error) -> InferenceError {
    if err.is_timeout() {
        InferenceError::Timeout
    } else if err.is_connect() {
        InferenceError::ConnectionFailed(err.to_string())
    } else if let Some(status) = err.status() {
        InferenceError::Status(status.as_u16())
    } else if err.is_decode() || err.is_body() {
        InferenceError::MalformedResponse(err.to_string())
    } else {
        InferenceError::Request(err.to_string())
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    #[instrument(skip(self, image, instruction), fields(model = %self.model, image_bytes = image.len()))]
    async fn generate(
        &self,
        image: &EncodedImage,
        instruction: &str,
        timeout: Duration,
    ) -> Result<String, InferenceError> {
        let payload = build_request(&self.model, image, instruction);

        let response = self
            .http_client
            .post(&self.url)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Inference service answered with status {}", status);
            return Err(InferenceError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_transport_error)?;
        let text = parse_response(&body)?;
        tracing::debug!("Received {} characters from inference service", text.len());

        Ok(text)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
