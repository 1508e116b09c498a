use crate::error::ProxyError;
use crate::upstream::UpstreamRequest;
use log::error;
use serde_json::{json, Value};
use std::str::FromStr;
use url::Url;

const PERPLEXITY_API_URL: &str = "https://api.perplexity.ai/chat/completions";
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// The generative-AI service the proxy forwards prompts to.
///
/// Each variant knows its own request shape and where the answer text
/// lives in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Chat-completion API, bearer auth.
    Perplexity { model: String },
    /// `generateContent` API, key in the query string.
    Gemini { model: String },
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Perplexity { .. } => "Perplexity",
            Provider::Gemini { .. } => "Gemini",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn key_variable(&self) -> &'static str {
        match self {
            Provider::Perplexity { .. } => "PERPLEXITY_API_KEY",
            Provider::Gemini { .. } => "GEMINI_API_KEY",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Perplexity { model } | Provider::Gemini { model } => model,
        }
    }

    /// Same provider kind with a different model.
    pub fn with_model(self, model: String) -> Self {
        match self {
            Provider::Perplexity { .. } => Provider::Perplexity { model },
            Provider::Gemini { .. } => Provider::Gemini { model },
        }
    }

    pub fn build_request(&self, prompt: &str, api_key: &str) -> Result<UpstreamRequest, ProxyError> {
        match self {
            Provider::Perplexity { model } => Ok(UpstreamRequest {
                provider: self.name(),
                url: Url::parse(PERPLEXITY_API_URL).map_err(|e| self.bad_url(e))?,
                bearer: Some(api_key.to_string()),
                body: json!({
                    "model": model,
                    "messages": [
                        { "role": "user", "content": prompt }
                    ]
                }),
            }),
            Provider::Gemini { model } => {
                let url = Url::parse_with_params(
                    &format!("{}/{}:generateContent", GEMINI_API_URL, model),
                    &[("key", api_key)],
                )
                .map_err(|e| self.bad_url(e))?;
                Ok(UpstreamRequest {
                    provider: self.name(),
                    url,
                    bearer: None,
                    body: json!({
                        "contents": [
                            { "parts": [ { "text": prompt } ] }
                        ]
                    }),
                })
            }
        }
    }

    /// Pull the answer text out of a provider response.
    ///
    /// Any missing or mistyped level yields `ProxyError::Extraction`; the
    /// payload itself is only written to the log.
    pub fn extract_text(&self, payload: &Value) -> Result<String, ProxyError> {
        let (text, path) = match self {
            Provider::Perplexity { .. } => (
                payload["choices"][0]["message"]["content"].as_str(),
                "choices[0].message.content",
            ),
            Provider::Gemini { .. } => (
                payload["candidates"][0]["content"]["parts"][0]["text"].as_str(),
                "candidates[0].content.parts[0].text",
            ),
        };

        match text {
            Some(text) => Ok(text.to_string()),
            None => {
                error!("{} response has no text at {}. Full response: {}", self.name(), path, payload);
                Err(ProxyError::Extraction {
                    provider: self.name(),
                    path,
                })
            }
        }
    }

    fn bad_url(&self, e: url::ParseError) -> ProxyError {
        error!("Could not build {} URL for model {}: {}", self.name(), self.model(), e);
        ProxyError::Upstream {
            provider: self.name(),
            message: format!("invalid endpoint: {}", e),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    /// Provider by name, with its default model.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perplexity" => Ok(Provider::Perplexity {
                model: "sonar".to_string(),
            }),
            "gemini" => Ok(Provider::Gemini {
                model: "gemini-2.0-flash".to_string(),
            }),
            other => Err(format!("unknown AI provider '{}'", other)),
        }
    }
}
