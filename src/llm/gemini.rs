//! Gemini backend: talks to the Generative Language REST API with reqwest.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::LlmConfig;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

const PROVIDER: &str = "gemini";

/// Public endpoint; overridable so tests can point at a local server.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini `generateContent` client.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(config: &LlmConfig, base_url: &str) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn build_request(request: &CompletionRequest) -> GenerateRequest {
    let contents = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| Content {
            role: Some(
                match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                }
                .to_string(),
            ),
            parts: vec![Part {
                text: Some(m.content.clone()),
            }],
        })
        .collect();

    let system_instruction = request.system_text().map(|text| Content {
        role: None,
        parts: vec![Part { text: Some(text) }],
    });

    let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
        Some(GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        })
    } else {
        None
    };

    GenerateRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Unknown,
    }
}

/// Map a non-success HTTP status (plus whatever error body came back) to an `LlmError`.
fn map_status_error(status: StatusCode, body: &str, retry_after: Option<u64>) -> LlmError {
    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.message, env.error.status),
        Err(_) => (body.chars().take(300).collect(), String::new()),
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            if let Some(secs) = retry_after {
                LlmError::RateLimited {
                    provider: PROVIDER.to_string(),
                    retry_after: Some(std::time::Duration::from_secs(secs)),
                }
            } else {
                LlmError::QuotaExceeded {
                    provider: PROVIDER.to_string(),
                    reason: format!("{api_status}: {message}"),
                }
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        },
        _ if api_status == "RESOURCE_EXHAUSTED" => LlmError::QuotaExceeded {
            provider: PROVIDER.to_string(),
            reason: message,
        },
        _ => LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("HTTP {}: {}", status.as_u16(), message),
        },
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = build_request(&request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Gemini request did not complete");
                LlmError::Unreachable {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &text, retry_after));
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to decode response body: {e}"),
            })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "response contained no candidates".to_string(),
            })?;

        let finish_reason = map_finish_reason(candidate.finish_reason.as_deref());
        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if content.is_empty() && finish_reason == FinishReason::ContentFilter {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "candidate was blocked by safety filters".to_string(),
            });
        }

        let usage = parsed.usage_metadata.unwrap_or_default();
        debug!(
            model = %self.model,
            input_tokens = usage.prompt_token_count,
            output_tokens = usage.candidates_token_count,
            "Gemini completion finished"
        );

        Ok(CompletionResponse {
            content,
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            finish_reason,
            response_id: parsed.response_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    use super::*;
    use crate::error::LlmErrorKind;
    use crate::llm::LlmBackend;
    use crate::llm::provider::ChatMessage;

    fn test_config() -> LlmConfig {
        LlmConfig {
            backend: LlmBackend::Gemini,
            api_key: SecretString::from("test-key"),
            model: "gemini-test".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Serve a single canned reply for any `generateContent` call.
    async fn start_stub(status: AxumStatus, body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/v1beta/models/{model}",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{port}")
    }

    #[test]
    fn request_splits_system_and_user_turns() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ])
        .with_temperature(0.1);

        let json = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(json["contents"].as_array().unwrap().len(), 2);
        assert_eq!(json["contents"][1]["role"], "model");
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn request_without_options_omits_generation_config() {
        let json = serde_json::to_value(build_request(&CompletionRequest::from_prompt("x"))).unwrap();
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn status_mapping() {
        let quota = map_status_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
            None,
        );
        assert_eq!(quota.kind(), LlmErrorKind::QuotaExceeded);
        assert!(quota.to_string().contains("Quota exceeded"));

        let limited = map_status_error(StatusCode::TOO_MANY_REQUESTS, "", Some(7));
        assert!(matches!(
            limited,
            LlmError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(7)
        ));

        let auth = map_status_error(StatusCode::FORBIDDEN, "{}", None);
        assert!(matches!(auth, LlmError::AuthFailed { .. }));

        let server = map_status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom", None);
        assert_eq!(server.kind(), LlmErrorKind::ServiceError);
        assert!(server.to_string().contains("HTTP 500"));
    }

    #[test]
    fn finish_reasons() {
        assert_eq!(map_finish_reason(Some("STOP")), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("MAX_TOKENS")), FinishReason::Length);
        assert_eq!(map_finish_reason(Some("SAFETY")), FinishReason::ContentFilter);
        assert_eq!(map_finish_reason(None), FinishReason::Unknown);
    }

    #[tokio::test]
    async fn complete_reads_candidate_text() {
        let base = start_stub(
            AxumStatus::OK,
            serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "{\"ok\":"}, {"text": "true}"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4},
                "responseId": "r-1"
            }),
        )
        .await;

        let provider = GeminiProvider::with_base_url(&test_config(), &base).unwrap();
        let response = provider
            .complete(CompletionRequest::from_prompt("ping"))
            .await
            .unwrap();

        assert_eq!(response.content, "{\"ok\":true}");
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.output_tokens, 4);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.response_id.as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn complete_maps_quota_error() {
        let base = start_stub(
            AxumStatus::TOO_MANY_REQUESTS,
            serde_json::json!({"error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}}),
        )
        .await;

        let provider = GeminiProvider::with_base_url(&test_config(), &base).unwrap();
        let err = provider
            .complete(CompletionRequest::from_prompt("ping"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), LlmErrorKind::QuotaExceeded);
    }

    #[tokio::test]
    async fn complete_with_no_candidates_is_invalid() {
        let base = start_stub(AxumStatus::OK, serde_json::json!({"candidates": []})).await;
        let provider = GeminiProvider::with_base_url(&test_config(), &base).unwrap();
        let err = provider
            .complete(CompletionRequest::from_prompt("ping"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_classified() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let provider =
            GeminiProvider::with_base_url(&test_config(), &format!("http://127.0.0.1:{port}"))
                .unwrap();
        let err = provider
            .complete(CompletionRequest::from_prompt("ping"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), LlmErrorKind::ServiceUnreachable);
    }
}
