use async_trait::async_trait;
use serde_json::{json, Value};

use crate::PipelineError;

/// Placeholder token a persona template may use to position the transcript.
pub const TRANSCRIPT_PLACEHOLDER: &str = "{transcript_text}";

/// Seam for the report-generation capability: opaque text in, text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Merge a persona template with a transcript. Templates carrying the
/// placeholder token get it substituted; otherwise the transcript is appended
/// under a labeled section.
pub fn build_prompt(template: &str, transcript: &str) -> String {
    if template.contains(TRANSCRIPT_PLACEHOLDER) {
        template.replace(TRANSCRIPT_PLACEHOLDER, transcript)
    } else {
        format!("{template}\n\nVideo transcript:\n{transcript}")
    }
}

/// Gemini generateContent client.
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(endpoint_base: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint_base: endpoint_base.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint_base.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ReportGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        tracing::info!("requesting report from {}", self.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{
                    "parts": [{ "text": prompt }]
                }]
            }))
            .send()
            .await
            .map_err(|e| PipelineError::RefinementTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::RefinementTransport(format!(
                "HTTP {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::RefinementTransport(e.to_string()))?;

        extract_report_text(&body)
    }
}

/// Pull the generated text out of a generateContent response. A response
/// without candidates carries a block reason; an empty text counts as blocked
/// too, since neither may be forwarded as a report.
fn extract_report_text(body: &Value) -> Result<String, PipelineError> {
    let candidates = body["candidates"].as_array();

    let Some(candidate) = candidates.and_then(|c| c.first()) else {
        let reason = body["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        return Err(PipelineError::RefinementBlocked(reason));
    };

    let text = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(PipelineError::RefinementBlocked(
            "model returned empty content".to_string(),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_token_is_substituted() {
        let prompt = build_prompt("Analyze: {transcript_text} -- end", "財報 分析");
        assert_eq!(prompt, "Analyze: 財報 分析 -- end");
    }

    #[test]
    fn transcript_appended_when_template_has_no_placeholder() {
        let prompt = build_prompt("You are an analyst.", "hello world");
        assert!(prompt.starts_with("You are an analyst."));
        assert!(prompt.contains("Video transcript:\nhello world"));
    }

    #[test]
    fn report_text_extracted_from_candidates() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "# Report\n" }, { "text": "Findings" }] }
            }]
        });
        assert_eq!(extract_report_text(&body).unwrap(), "# Report\nFindings");
    }

    #[test]
    fn missing_candidates_surface_the_block_reason() {
        let body = serde_json::json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        });
        let err = extract_report_text(&body).unwrap_err();
        match err {
            PipelineError::RefinementBlocked(reason) => assert_eq!(reason, "SAFETY"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_model_output_is_blocked_not_success() {
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "   " }] } }]
        });
        assert!(matches!(
            extract_report_text(&body),
            Err(PipelineError::RefinementBlocked(_))
        ));
    }
}
