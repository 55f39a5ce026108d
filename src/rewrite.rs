//! Text-assist pass-through
//!
//! Rewrites a gift message into something warmer by forwarding it to a
//! hosted text-generation model. Nothing is stored.

use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const SYSTEM_INSTRUCTION: &str = "You are a creative writing assistant helping someone write a warm, personal, and heartfelt message to a friend or family member. You refine their words to be more poetic and touching while preserving the core message. Return only the rewritten text, without any additional commentary or quotation marks.";

pub type RewriteFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

pub trait MessageRewriter: Send + Sync + 'static {
    fn rewrite(&self, text: &str) -> RewriteFuture<'_>;
}

/// Google Gemini `generateContent` client.
pub struct GeminiRewriter {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiRewriter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

fn prompt(text: &str) -> String {
    format!(
        "Rewrite the following message for a gift to make it more heartfelt and eloquent. Keep the original sentiment and key memories. Here is the original text: \"{text}\""
    )
}

impl MessageRewriter for GeminiRewriter {
    fn rewrite(&self, text: &str) -> RewriteFuture<'_> {
        let prompt = prompt(text);
        Box::pin(async move {
            let body = GenerateRequest {
                system_instruction: Content {
                    role: None,
                    parts: vec![Part {
                        text: SYSTEM_INSTRUCTION,
                    }],
                },
                contents: vec![Content {
                    role: Some("user"),
                    parts: vec![Part { text: &prompt }],
                }],
                generation_config: GenerationConfig { temperature: 0.7 },
            };

            let url = format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model);
            debug!("Gemini generateContent: model={}", self.model);

            let response: GenerateResponse = self
                .http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .context("sending Gemini request")?
                .error_for_status()
                .context("Gemini request rejected")?
                .json()
                .await
                .context("decoding Gemini response")?;

            let text: String = response
                .candidates
                .into_iter()
                .next()
                .and_then(|candidate| candidate.content)
                .map(|content| content.parts.into_iter().map(|part| part.text).collect())
                .unwrap_or_default();

            let text = text.trim();
            if text.is_empty() {
                anyhow::bail!("Gemini returned no text");
            }
            Ok(text.to_string())
        })
    }
}
