//! 답변 생성 모듈 - Gemini generateContent
//!
//! 검색된 청크와 질문으로 프롬프트를 만들고 Gemini 모델에 한 번 요청합니다.
//! 재시도와 스트리밍은 하지 않습니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::{gemini_error, http_client, GEMINI_API_BASE};

/// 기본 생성 모델
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";

// ============================================================================
// Prompt
// ============================================================================

/// RAG 프롬프트 템플릿 앞부분
const PROMPT_PREAMBLE: &str = "You are a helpful and informative bot that answers questions using text from the reference passage included below.
Be sure to respond in a complete sentence, being comprehensive, including all relevant background information.
However, you are talking to a non-technical audience, so be sure to break down complicated concepts and
strike a friendly and conversational tone.";

/// 질문과 참고 문단으로 프롬프트 생성
///
/// 템플릿의 따옴표가 깨지지 않도록 문단에서 `'`, `"`를 제거하고
/// 줄바꿈은 공백으로 바꿉니다. 질문은 그대로 넣습니다.
pub fn make_rag_prompt(question: &str, passage: &str) -> String {
    let escaped_passage = passage.replace(['\'', '"'], "").replace('\n', " ");

    format!(
        "{PROMPT_PREAMBLE}\nQUESTION: '{question}'\nPASSAGE: '{escaped_passage}'\n\nANSWER:\n"
    )
}

// ============================================================================
// TextGenerator Trait
// ============================================================================

/// 텍스트 생성 트레이트
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 프롬프트로 텍스트 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Gemini Generator
// ============================================================================

/// Gemini 텍스트 생성 구현체
///
/// source: https://ai.google.dev/api/generate-content
#[derive(Debug)]
pub struct GeminiGenerator {
    api_key: String,
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    /// 기본 모델로 생성
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_model(api_key, DEFAULT_GENERATION_MODEL, None)
    }

    /// 모델과 타임아웃을 지정하여 생성 (타임아웃 None이면 제한 없음)
    pub fn with_model(api_key: String, model: &str, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            api_key,
            client: http_client(timeout)?,
            model: model.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// API 주소 교체 (테스트용 목 서버 등)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            return Err(gemini_error(status, &body));
        }

        let generate_response: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generation response")?;

        let text = generate_response
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect::<String>())
            .ok_or_else(|| anyhow::anyhow!("Generation returned no candidates"))?;

        tracing::debug!("Generated {} chars with {}", text.len(), self.model);
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_strips_quotes_and_newlines() {
        let prompt = make_rag_prompt("What's new?", "It's \"fine\"\nreally");
        assert!(prompt.contains("QUESTION: 'What's new?'"));
        assert!(prompt.contains("PASSAGE: 'Its fine really'"));
        assert!(prompt.ends_with("ANSWER:\n"));
    }

    #[test]
    fn test_prompt_template_layout() {
        let prompt = make_rag_prompt("q", "p");
        assert!(prompt.starts_with("You are a helpful and informative bot"));
        assert!(prompt
            .ends_with("friendly and conversational tone.\nQUESTION: 'q'\nPASSAGE: 'p'\n\nANSWER:\n"));
    }

    #[test]
    fn test_response_parsing_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}],"role":"model"}}]}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        let text: String = response.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn test_response_without_candidates() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(response.candidates.is_empty());
    }

    #[test]
    fn test_generator_name() {
        let generator = GeminiGenerator::new("fake_key".to_string()).unwrap();
        assert_eq!(generator.name(), DEFAULT_GENERATION_MODEL);
    }
}
