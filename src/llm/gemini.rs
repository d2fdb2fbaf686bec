use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::CONFIG;
use crate::llm::media::ImagePayload;
use crate::llm::GenerationGateway;
use crate::prompts::vision_instruction;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub max_attempts: usize,
    pub description_language: String,
}

impl GeminiSettings {
    pub fn from_config() -> Self {
        GeminiSettings {
            api_key: CONFIG.gemini_api_key.clone(),
            model: CONFIG.gemini_model.clone(),
            base_url: CONFIG.gemini_base_url.clone(),
            timeout: CONFIG.gemini_timeout(),
            max_attempts: CONFIG.gemini_max_retry_attempts,
            description_language: CONFIG.description_language.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt_text: String,
    pub image: Option<ImagePayload>,
    pub wants_structured_reply: bool,
}

impl GenerationRequest {
    pub fn text(prompt_text: &str, wants_structured_reply: bool) -> Self {
        GenerationRequest {
            prompt_text: prompt_text.to_string(),
            image: None,
            wants_structured_reply,
        }
    }

    pub fn vision(prompt_text: String, image: ImagePayload) -> Self {
        GenerationRequest {
            prompt_text,
            image: Some(image),
            wants_structured_reply: false,
        }
    }

    fn operation(&self) -> &'static str {
        match (&self.image, self.wants_structured_reply) {
            (Some(_), _) => "vision_analysis",
            (None, true) => "structured_completion",
            (None, false) => "text_completion",
        }
    }

    pub fn to_payload(&self) -> Value {
        let mut parts = vec![json!({ "text": self.prompt_text })];
        if let Some(image) = &self.image {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.base64_data()
                }
            }));
        }

        let generation_config = if self.wants_structured_reply {
            json!({ "responseMimeType": "application/json" })
        } else {
            json!({})
        };

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        })
    }
}

const GEMINI_RETRY_BASE_DELAY_MS: u64 = 900;

fn gemini_should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn gemini_should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn gemini_retry_delay(attempt: usize) -> Duration {
    let attempt = attempt.max(1) as u64;
    Duration::from_millis(GEMINI_RETRY_BASE_DELAY_MS.saturating_mul(attempt))
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    Value::Object(summary)
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

// Only the first candidate's first part is considered; blank text counts as no reply.
fn extract_first_text(response: GeminiResponse) -> Option<String> {
    let text = response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts?
        .into_iter()
        .next()?
        .text?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Debug, Clone)]
pub struct GeminiGateway {
    settings: GeminiSettings,
}

impl GeminiGateway {
    pub fn new(settings: GeminiSettings) -> Self {
        GeminiGateway { settings }
    }

    pub fn from_config() -> Self {
        Self::new(GeminiSettings::from_config())
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    fn redact(&self, text: &str) -> String {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn endpoint_url(&self) -> Result<Url> {
        let raw = format!(
            "{}/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        );
        Url::parse_with_params(&raw, &[("key", self.settings.api_key.trim())])
            .map_err(|err| anyhow!("Invalid Gemini endpoint {}: {}", raw, err))
    }

    async fn call_gemini_api(&self, payload: &Value) -> Result<GeminiResponse> {
        let client = get_http_client();
        let url = self.endpoint_url()?;
        let model = self.settings.model.as_str();
        let max_attempts = self.settings.max_attempts.max(1);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(payload);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let mut request = client.post(url.clone()).json(payload);
            if let Some(timeout) = self.settings.timeout {
                request = request.timeout(timeout);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    let err_text = self.redact(&err.to_string());
                    let should_retry = gemini_should_retry_error(&err) && attempt < max_attempts;
                    warn!(
                        "Gemini request failed to send: {} (timeout={}, connect={}, retrying={})",
                        err_text,
                        err.is_timeout(),
                        err.is_connect(),
                        should_retry
                    );
                    if should_retry {
                        tokio::time::sleep(gemini_retry_delay(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("Gemini request failed: {}", err_text));
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let (message, body_summary) = summarize_error_body(&self.redact(&body));
                let should_retry = gemini_should_retry_status(status) && attempt < max_attempts;
                warn!(
                    "Gemini API error: status={}, body={}, retrying={}",
                    status, body_summary, should_retry
                );
                if should_retry {
                    tokio::time::sleep(gemini_retry_delay(attempt)).await;
                    continue;
                }
                let detail = message.unwrap_or(body_summary);
                return Err(anyhow!(
                    "Gemini request failed with status {}: {}",
                    status,
                    detail
                ));
            }

            let value = response.json::<GeminiResponse>().await.map_err(|err| {
                anyhow!(
                    "Gemini response was not valid JSON: {}",
                    self.redact(&err.to_string())
                )
            })?;
            return Ok(value);
        }
    }

    pub async fn generate(&self, request: GenerationRequest) -> Option<String> {
        if self.settings.api_key.trim().is_empty() {
            error!("Gemini API key missing; set GEMINI_API_KEY to enable generation");
            return None;
        }

        let operation = request.operation();
        let payload = request.to_payload();
        let model = self.settings.model.as_str();
        let result = log_llm_timing("gemini", model, operation, None, move || async move {
            let response = self.call_gemini_api(&payload).await?;
            extract_first_text(response)
                .ok_or_else(|| anyhow!("Gemini response contained no text part"))
        })
        .await;

        match result {
            Ok(text) => Some(text),
            Err(err) => {
                error!("Gemini {} failed: {}", operation, err);
                None
            }
        }
    }
}

impl GenerationGateway for GeminiGateway {
    async fn text_completion(&self, prompt_text: &str, wants_structured_reply: bool) -> Option<String> {
        self.generate(GenerationRequest::text(prompt_text, wants_structured_reply))
            .await
    }

    async fn vision_analysis(&self, image: &ImagePayload) -> Option<String> {
        let instruction = vision_instruction(&self.settings.description_language);
        self.generate(GenerationRequest::vision(instruction, image.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: &str) -> GeminiSettings {
        GeminiSettings {
            api_key: api_key.to_string(),
            model: "gemini-test".to_string(),
            base_url: "http://127.0.0.1:9/v1beta/models/".to_string(),
            timeout: Some(Duration::from_secs(1)),
            max_attempts: 1,
            description_language: "Portuguese".to_string(),
        }
    }

    fn parse(body: &str) -> GeminiResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn structured_requests_ask_for_json_replies() {
        let payload = GenerationRequest::text("brainstorm", true).to_payload();
        assert_eq!(
            payload["generationConfig"],
            json!({ "responseMimeType": "application/json" })
        );
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "brainstorm");
        assert_eq!(payload["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn plain_requests_send_empty_generation_config() {
        let payload = GenerationRequest::text("translate", false).to_payload();
        assert_eq!(payload["generationConfig"], json!({}));
    }

    #[test]
    fn vision_requests_pair_instruction_with_inline_image() {
        let image = ImagePayload::new(b"abc".to_vec(), "image/jpg");
        let payload = GenerationRequest::vision("describe".to_string(), image).to_payload();
        let parts = payload["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "YWJj");
        assert_eq!(payload["contents"][0]["role"], "user");
    }

    #[test]
    fn extracts_first_candidate_first_part() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"first"},{"text":"second"}]}},{"content":{"parts":[{"text":"other"}]}}]}"#,
        );
        assert_eq!(extract_first_text(response).as_deref(), Some("first"));
    }

    #[test]
    fn missing_levels_are_absence() {
        assert_eq!(extract_first_text(parse(r#"{}"#)), None);
        assert_eq!(extract_first_text(parse(r#"{"candidates":[]}"#)), None);
        assert_eq!(extract_first_text(parse(r#"{"candidates":[{}]}"#)), None);
        assert_eq!(
            extract_first_text(parse(r#"{"candidates":[{"content":{"parts":[{"inlineData":{}}]}}]}"#)),
            None
        );
        assert_eq!(
            extract_first_text(parse(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#)),
            None
        );
    }

    #[test]
    fn endpoint_carries_model_and_key() {
        let gateway = GeminiGateway::new(settings("secret key"));
        let url = gateway.endpoint_url().unwrap();
        assert_eq!(url.path(), "/v1beta/models/gemini-test:generateContent");
        assert_eq!(url.query(), Some("key=secret+key"));
    }

    #[test]
    fn redacts_api_key_from_messages() {
        let gateway = GeminiGateway::new(settings("abc123"));
        assert_eq!(
            gateway.redact("GET https://host/?key=abc123 failed"),
            "GET https://host/?key=[redacted] failed"
        );
    }

    #[test]
    fn error_body_prefers_api_message() {
        let (message, _) = summarize_error_body(r#"{"error":{"message":"quota exceeded"}}"#);
        assert_eq!(message.as_deref(), Some("quota exceeded"));
        let (message, summary) = summarize_error_body("   ");
        assert_eq!(message, None);
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn only_transient_statuses_are_retried() {
        assert!(gemini_should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(gemini_should_retry_status(StatusCode::BAD_GATEWAY));
        assert!(!gemini_should_retry_status(StatusCode::BAD_REQUEST));
        assert_eq!(gemini_retry_delay(2), Duration::from_millis(1800));
    }

    #[test]
    fn payload_summary_hides_image_data() {
        let image = ImagePayload::new(vec![0u8; 30], "image/png");
        let payload = GenerationRequest::vision("describe".to_string(), image).to_payload();
        let summary = summarize_gemini_payload(&payload);
        assert_eq!(summary["contents"][0]["parts"][1]["inlineData"]["dataLen"], 40);
        assert!(summary["contents"][0]["parts"][1]["inlineData"]
            .get("data")
            .is_none());
    }

    #[tokio::test]
    async fn missing_credentials_fail_closed_without_network() {
        let gateway = GeminiGateway::new(settings("  "));
        assert_eq!(gateway.text_completion("hello", false).await, None);
        let image = ImagePayload::new(b"abc".to_vec(), "image/png");
        assert_eq!(gateway.vision_analysis(&image).await, None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_absence() {
        let gateway = GeminiGateway::new(settings("key"));
        assert_eq!(gateway.text_completion("hello", true).await, None);
    }
}
