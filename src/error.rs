use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Failures of the suggestion proxy.
///
/// The `Display` text is for the server log. Clients only ever see
/// [`ProxyError::public_message`].
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid meal preferences: {0}")]
    Preferences(String),

    #[error("{0} is not configured")]
    Config(&'static str),

    #[error("[{provider}] upstream request failed: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    #[error("[{provider}] response has no text at {path}")]
    Extraction {
        provider: &'static str,
        path: &'static str,
    },

    #[error("failed to serialize menu into prompt: {0}")]
    Prompt(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl ProxyError {
    pub fn public_message(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "A non-empty 'prompt' string is required.",
            ProxyError::Preferences(_) => "Invalid meal preferences.",
            ProxyError::Config(_) => "API key not configured.",
            ProxyError::Upstream { .. } | ProxyError::Extraction { .. } | ProxyError::Prompt(_) => {
                "Failed to get suggestion from AI."
            }
        }
    }
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Validation(_) | ProxyError::Preferences(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.public_message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ProxyError::Validation("missing prompt".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bad_preferences_do_not_mention_prompt() {
        let err = ProxyError::Preferences("people: invalid type".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Invalid meal preferences.");
        assert!(!err.public_message().contains("prompt"));
    }

    #[test]
    fn server_side_failures_map_to_500_with_generic_text() {
        let errors = [
            ProxyError::Config("GEMINI_API_KEY"),
            ProxyError::Upstream {
                provider: "Gemini",
                message: "connection reset".to_string(),
            },
            ProxyError::Extraction {
                provider: "Perplexity",
                path: "choices[0].message.content",
            },
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(!err.public_message().contains("connection reset"));
            assert!(!err.public_message().contains("choices"));
        }
    }

    #[test]
    fn log_text_keeps_diagnostics() {
        let err = ProxyError::Upstream {
            provider: "Gemini",
            message: "status 503".to_string(),
        };
        assert_eq!(err.to_string(), "[Gemini] upstream request failed: status 503");
    }
}
