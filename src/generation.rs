//! Client for the external image-generation API.
//!
//! One `generateContent` call per request, carrying the composed prompt and the
//! base image inline. Transport failures and 5xx answers are retried a bounded
//! number of times with a linear backoff; everything else surfaces immediately.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::base_image::ImagePayload;
use crate::constants::{UPSTREAM_BACKOFF_MS, X_GOOG_API_KEY};
use crate::error::AppError;

/// Anything that can turn a prompt plus base image into a new image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Runs one generation.
    async fn generate(&self, prompt: &str, base: &ImagePayload) -> Result<ImagePayload, AppError>;
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: RequestInlineData<'a>,
    },
}

#[derive(Serialize)]
struct RequestInlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// The part shapes we know about. Both casings of the inline payload are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    Image {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: ResponseInlineData,
    },
    Text {
        #[allow(dead_code)]
        text: String,
    },
    Other(#[allow(dead_code)] serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

/// Pulls the first image out of a raw `generateContent` response body.
pub fn extract_image(raw: &[u8]) -> Result<ImagePayload, AppError> {
    let raw_text = || String::from_utf8_lossy(raw).into_owned();
    let parsed: GenerateContentResponse =
        serde_json::from_slice(raw).map_err(|err| AppError::Upstream {
            status: None,
            body: format!("Malformed response ({err}): {}", raw_text()),
        })?;

    let inline = parsed
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| match part {
            ResponsePart::Image { inline_data } if !inline_data.data.is_empty() => {
                Some(inline_data)
            }
            _ => None,
        })
        .ok_or_else(|| AppError::NoImageReturned(raw_text()))?;

    let bytes = BASE64
        .decode(inline.data.as_bytes())
        .map_err(|err| AppError::Upstream {
            status: None,
            body: format!("Image payload was not valid base64: {err}"),
        })?;
    Ok(ImagePayload::new(bytes, inline.mime_type.as_deref()))
}

/// Transport failures and 5xx are worth another go, nothing else is.
fn is_retryable(err: &AppError) -> bool {
    match err {
        AppError::Upstream { status: None, .. } => true,
        AppError::Upstream {
            status: Some(status),
            ..
        } => *status >= 500,
        _ => false,
    }
}

/// Gemini `generateContent` client.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: String,
    retries: u32,
    backoff: Duration,
}

impl GeminiClient {
    /// Builds a client. `endpoint` is the API root, e.g. `https://…/v1beta`.
    pub fn new(
        endpoint: Url,
        model: &str,
        api_key: &str,
        retries: u32,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            model: model.to_string(),
            api_key: api_key.to_string(),
            retries,
            backoff: Duration::from_millis(UPSTREAM_BACKOFF_MS),
        })
    }

    /// Overrides the backoff step between retries.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// The full `generateContent` URL for the configured model.
    pub fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.as_str().trim_end_matches('/'),
            self.model
        )
    }

    async fn send_once(
        &self,
        url: &str,
        body: &GenerateContentRequest<'_>,
    ) -> Result<Vec<u8>, AppError> {
        let response = self
            .http
            .post(url)
            .header(X_GOOG_API_KEY, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| AppError::Upstream {
                status: None,
                body: err.to_string(),
            })?;

        let status = response.status();
        // a body cut off mid-read is a transport failure, whatever the status line said
        let bytes = response.bytes().await.map_err(|err| AppError::Upstream {
            status: None,
            body: format!("reading {status} response failed: {err}"),
        })?;
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: Some(status.as_u16()),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, base: &ImagePayload) -> Result<ImagePayload, AppError> {
        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [
                    RequestPart::Text { text: prompt },
                    RequestPart::InlineData {
                        inline_data: RequestInlineData {
                            mime_type: &base.mime_type,
                            data: BASE64.encode(&base.bytes),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["TEXT", "IMAGE"],
            },
        };
        let url = self.request_url();
        let started = Instant::now();

        let mut attempt = 0;
        let raw = loop {
            match self.send_once(&url, &body).await {
                Ok(raw) => break raw,
                Err(err) if attempt < self.retries && is_retryable(&err) => {
                    attempt += 1;
                    warn!(
                        "Generation attempt {}/{} failed, retrying: {}",
                        attempt,
                        self.retries + 1,
                        err
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        };
        debug!("Generation response was {} bytes", raw.len());

        let image = extract_image(&raw)?;
        info!(
            "Generated {} ({} bytes) with {} in {:?}",
            image.mime_type,
            image.bytes.len(),
            self.model,
            started.elapsed()
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_image::TINY_PNG;

    #[test]
    fn extracts_camel_case_inline_data() {
        let raw = serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"text": "here you go"},
                {"inlineData": {"mimeType": "image/png", "data": BASE64.encode(TINY_PNG)}}
            ]}}]
        });
        let image = extract_image(raw.to_string().as_bytes()).expect("image");
        assert_eq!(image.bytes, TINY_PNG);
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn extracts_snake_case_inline_data() {
        let raw = serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"inline_data": {"mime_type": "image/jpeg", "data": BASE64.encode(b"jpegish")}}
            ]}}]
        });
        let image = extract_image(raw.to_string().as_bytes()).expect("image");
        assert_eq!(image.bytes, b"jpegish");
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn missing_mime_type_is_sniffed() {
        let raw = serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"data": BASE64.encode(TINY_PNG)}}
            ]}}]
        });
        let image = extract_image(raw.to_string().as_bytes()).expect("image");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn text_only_response_is_no_image_with_raw_body() {
        let raw = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "I can't draw that"}]}}]
        })
        .to_string();
        match extract_image(raw.as_bytes()) {
            Err(AppError::NoImageReturned(body)) => assert!(body.contains("I can't draw that")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_candidates_is_no_image() {
        let raw = br#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        match extract_image(raw) {
            Err(AppError::NoImageReturned(body)) => assert!(body.contains("SAFETY")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_body_is_upstream_error() {
        assert!(matches!(
            extract_image(b"<html>oops</html>"),
            Err(AppError::Upstream { .. })
        ));
    }

    #[test]
    fn retry_policy() {
        assert!(is_retryable(&AppError::Upstream {
            status: None,
            body: String::new()
        }));
        assert!(is_retryable(&AppError::Upstream {
            status: Some(503),
            body: String::new()
        }));
        assert!(!is_retryable(&AppError::Upstream {
            status: Some(400),
            body: String::new()
        }));
        assert!(!is_retryable(&AppError::NoImageReturned(String::new())));
    }

    #[test]
    fn request_url_includes_model() {
        let client = GeminiClient::new(
            Url::parse("https://api.example.com/v1beta/").expect("url"),
            "gemini-2.5-flash-image",
            "key",
            0,
            Duration::from_secs(5),
        )
        .expect("client");
        assert_eq!(
            client.request_url(),
            "https://api.example.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }
}
