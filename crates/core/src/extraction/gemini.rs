//! Google Generative Language API client.

use super::GenerativeModel;
use crate::config::CoreConfig;
use crate::{CoreError, CoreResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Blocking client for `models/<model>:generateContent`.
///
/// The key travels in the `x-goog-api-key` header so request URLs never carry it.
/// Requests have no timeout; vision calls on large collages can take minutes.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingApiKey` when no key is configured.
    pub fn from_config(config: &CoreConfig) -> CoreResult<Self> {
        let api_key = config.api_key()?.to_owned();
        let http = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.genai_base_url().trim_end_matches('/'),
            config.model()
        );

        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    fn send(&self, parts: Vec<Part>) -> CoreResult<String> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(CoreError::ModelResponse(format!("{status}: {message}")));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        answer_text(parsed)
    }
}

impl GenerativeModel for GeminiClient {
    fn describe_image(&self, image_path: &Path, prompt: &str) -> CoreResult<String> {
        let bytes = fs::read(image_path)?;
        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .filter(|mime| mime.starts_with("image/"))
            .ok_or_else(|| {
                CoreError::InvalidInput(format!("{} is not an image", image_path.display()))
            })?;

        tracing::debug!(
            "sending {} ({}, {} bytes) to the model",
            image_path.display(),
            mime_type,
            bytes.len()
        );

        self.send(vec![
            Part::InlineData {
                inline_data: Blob {
                    mime_type: mime_type.to_owned(),
                    data: STANDARD.encode(&bytes),
                },
            },
            Part::Text {
                text: prompt.to_owned(),
            },
        ])
    }

    fn generate(&self, prompt: &str) -> CoreResult<String> {
        self.send(vec![Part::Text {
            text: prompt.to_owned(),
        }])
    }
}

/// Joins the text parts of the first candidate.
///
/// A blocked prompt or a candidate without text is `CoreError::EmptyModelAnswer`,
/// carrying the block or finish reason when the API gave one.
fn answer_text(response: GenerateResponse) -> CoreResult<String> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
    let candidate = response.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

    let text: String = candidate
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = block_reason
            .or(finish_reason)
            .unwrap_or_else(|| "no candidates".to_owned());
        return Err(CoreError::EmptyModelAnswer(reason));
    }
    Ok(text)
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    InlineData { inline_data: Blob },
    Text { text: String },
}

#[derive(Serialize)]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_rest_field_names() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type: "image/jpeg".into(),
                            data: "AAAA".into(),
                        },
                    },
                    Part::Text {
                        text: "read this".into(),
                    },
                ],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{
                    "parts": [
                        {"inline_data": {"mime_type": "image/jpeg", "data": "AAAA"}},
                        {"text": "read this"}
                    ]
                }]
            })
        );
    }

    #[test]
    fn answer_text_joins_parts_of_first_candidate() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"cep\": "}, {"text": "\"1\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(answer_text(response).unwrap(), r#"{"cep": "1"}"#);
    }

    #[test]
    fn empty_answer_reports_finish_reason() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        match answer_text(response) {
            Err(CoreError::EmptyModelAnswer(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn blocked_prompt_reports_block_reason() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "OTHER"}}"#).unwrap();
        match answer_text(response) {
            Err(CoreError::EmptyModelAnswer(reason)) => assert_eq!(reason, "OTHER"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn client_requires_api_key() {
        let config = CoreConfig::new("/tmp/data".into());
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(CoreError::MissingApiKey)
        ));
    }
}
