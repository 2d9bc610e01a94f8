// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible endpoints.
//!
//! Provides [`OpenAiClient`] which handles authentication, request
//! construction and a single retry on transient statuses (429, 500, 503).

use std::time::Duration;

use kindred_core::KindredError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::types::{
    ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse, SpeechRequest,
    TranscriptionResponse,
};

/// File name attached to uploads whose container is not recognised.
const FALLBACK_UPLOAD_NAME: &str = "audio.webm";

/// Name the upload after its container. The API picks the decoder from the
/// file extension, so the name has to match the bytes.
fn upload_file_name(audio: &[u8]) -> &'static str {
    match audio {
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => "audio.wav",
        [b'O', b'g', b'g', b'S', ..] => "audio.ogg",
        [b'f', b'L', b'a', b'C', ..] => "audio.flac",
        [b'I', b'D', b'3', ..] => "audio.mp3",
        [0xFF, second, ..] if second & 0xE0 == 0xE0 => "audio.mp3",
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => "audio.m4a",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "audio.webm",
        _ => FALLBACK_UPLOAD_NAME,
    }
}

/// HTTP client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl OpenAiClient {
    /// Creates a client for `base_url`. Without an API key no
    /// `Authorization` header is sent, which suits local compatible servers.
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, KindredError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| KindredError::Config(format!("invalid API key header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| KindredError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// `POST /chat/completions`.
    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, KindredError> {
        let url = self.endpoint("chat/completions");
        let response = self
            .send_with_retry("chat completion", || Ok(self.client.post(&url).json(request)))
            .await?;
        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| KindredError::Provider {
                message: format!("failed to parse chat completion: {e}"),
                source: Some(Box::new(e)),
            })
    }

    /// `POST /audio/transcriptions` with a multipart upload.
    pub async fn transcription(
        &self,
        model: &str,
        audio: &[u8],
    ) -> Result<TranscriptionResponse, KindredError> {
        let url = self.endpoint("audio/transcriptions");
        // Multipart forms are consumed on send, so each attempt builds a fresh one.
        let response = self
            .send_with_retry("transcription", || {
                let file = Part::bytes(audio.to_vec()).file_name(upload_file_name(audio));
                let form = Form::new().text("model", model.to_string()).part("file", file);
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;
        response
            .json::<TranscriptionResponse>()
            .await
            .map_err(|e| KindredError::Provider {
                message: format!("failed to parse transcription: {e}"),
                source: Some(Box::new(e)),
            })
    }

    /// `POST /audio/speech`, returning the raw audio body.
    pub async fn speech(&self, request: &SpeechRequest) -> Result<Vec<u8>, KindredError> {
        let url = self.endpoint("audio/speech");
        let response = self
            .send_with_retry("speech", || Ok(self.client.post(&url).json(request)))
            .await?;
        let bytes = response.bytes().await.map_err(|e| KindredError::Provider {
            message: format!("failed to read speech audio: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(bytes.to_vec())
    }

    /// Sends the request built by `build`, retrying once on a transient status.
    async fn send_with_retry<F>(
        &self,
        operation: &str,
        build: F,
    ) -> Result<reqwest::Response, KindredError>
    where
        F: Fn() -> Result<reqwest::RequestBuilder, KindredError>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(operation, attempt, "retrying request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = build()?
                .send()
                .await
                .map_err(|e| KindredError::Provider {
                    message: format!("{operation} request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(operation, status = %status, attempt, "response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(operation, status = %status, body = %body, "transient error, will retry");
                last_error = Some(KindredError::Provider {
                    message: format!("{operation} returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            return Err(KindredError::Provider {
                message: format!("{operation} returned {status}: {}", error_message(&body)),
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| KindredError::Provider {
            message: format!("{operation} failed after retries"),
            source: None,
        }))
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Extracts the API's error message, falling back to the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => match api_err.error.type_ {
            Some(kind) => format!("{kind}: {}", api_err.error.message),
            None => api_err.error.message,
        },
        Err(_) => body.to_string(),
    }
}

/// Returns true for statuses worth one retry.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}
