// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI chat completions API.
//!
//! Each attempt has its own timeout. A timed-out or unconnectable attempt is
//! retried once; any HTTP response, success or not, is final.

use std::time::Duration;

use pika_core::{PikaError, TranslationError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatRequest, ChatResponse};

/// HTTP client for chat completions.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl OpenAiClient {
    /// Creates a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, PikaError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| PikaError::Config(format!("invalid OpenAI API key header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PikaError::Translator {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            timeout,
            max_retries: 1,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Overrides the pause between attempts.
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sends `request` and returns the first choice's message content.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, TranslationError> {
        let mut last_error = TranslationError::Timeout;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, error = %last_error, "retrying translator call");
                tokio::time::sleep(self.retry_delay).await;
            }

            let sent = self
                .client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(request)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    last_error = TranslationError::Timeout;
                    continue;
                }
                Err(e) if e.is_connect() => {
                    last_error = TranslationError::Unavailable(e.without_url().to_string());
                    continue;
                }
                Err(e) => {
                    return Err(TranslationError::Unavailable(e.without_url().to_string()));
                }
            };

            let status = response.status();
            debug!(status = %status, attempt, "translator response received");

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) if e.is_timeout() => {
                    last_error = TranslationError::Timeout;
                    continue;
                }
                Err(e) => return Err(TranslationError::Malformed(e.without_url().to_string())),
            };

            if !status.is_success() {
                let kind = serde_json::from_str::<ApiErrorResponse>(&body)
                    .ok()
                    .and_then(|e| e.error.type_)
                    .unwrap_or_else(|| "unknown".into());
                warn!(status = %status, kind = %kind, "translator rejected the request");
                return Err(TranslationError::Upstream {
                    status: status.as_u16(),
                });
            }

            let parsed: ChatResponse = serde_json::from_str(&body)
                .map_err(|e| TranslationError::Malformed(format!("response body: {e}")))?;

            return parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or(TranslationError::Empty);
        }

        Err(last_error)
    }
}
