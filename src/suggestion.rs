use crate::cache::PromptCache;
use crate::error::ProxyError;
use crate::provider::Provider;
use crate::upstream::Transport;
use log::{debug, error, info};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionReply {
    pub suggestion: String,
    pub from_cache: bool,
}

/// Forwards prompts to the configured provider.
pub struct SuggestionService<T> {
    provider: Provider,
    api_key: Option<String>,
    transport: T,
    cache: Option<PromptCache>,
}

impl<T: Transport> SuggestionService<T> {
    pub fn new(provider: Provider, api_key: Option<String>, transport: T) -> Self {
        Self {
            provider,
            api_key,
            transport,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: PromptCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Validate, consult the cache, then call the provider once.
    ///
    /// A missing key fails before any network traffic. Concurrent misses on
    /// the same prompt each call upstream.
    pub async fn suggest(&self, request_id: &str, prompt: &str) -> Result<SuggestionReply, ProxyError> {
        if prompt.trim().is_empty() {
            error!("Request {}: prompt is missing or empty", request_id);
            return Err(ProxyError::Validation("prompt is missing or empty".to_string()));
        }

        let api_key = match self.api_key.as_deref() {
            Some(key) => key,
            None => {
                error!(
                    "Request {}: {} is not set, refusing to call {}",
                    request_id,
                    self.provider.key_variable(),
                    self.provider.name()
                );
                return Err(ProxyError::Config(self.provider.key_variable()));
            }
        };

        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(prompt)) {
            info!("Request {}: served suggestion from cache", request_id);
            return Ok(SuggestionReply {
                suggestion: cached,
                from_cache: true,
            });
        }

        let request = self.provider.build_request(prompt, api_key)?;
        debug!("Request {}: calling {} model {}", request_id, self.provider.name(), self.provider.model());
        let payload = self.transport.send(request).await?;
        let suggestion = self.provider.extract_text(&payload)?;

        if let Some(cache) = &self.cache {
            cache.insert(prompt, suggestion.clone());
        }

        info!(
            "Request {}: received {} characters from {}",
            request_id,
            suggestion.len(),
            self.provider.name()
        );
        Ok(SuggestionReply {
            suggestion,
            from_cache: false,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::upstream::UpstreamRequest;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Transport spy: counts calls, records the last request and replays a
    /// canned outcome.
    #[derive(Clone)]
    pub(crate) struct SpyTransport {
        pub calls: Arc<AtomicUsize>,
        pub last_request: Arc<Mutex<Option<UpstreamRequest>>>,
        reply: Result<Value, &'static str>,
    }

    impl SpyTransport {
        pub fn replying(payload: Value) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                last_request: Arc::new(Mutex::new(None)),
                reply: Ok(payload),
            }
        }

        pub fn failing(message: &'static str) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                last_request: Arc::new(Mutex::new(None)),
                reply: Err(message),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for SpyTransport {
        async fn send(&self, request: UpstreamRequest) -> Result<Value, ProxyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let provider = request.provider;
            *self.last_request.lock().unwrap() = Some(request);
            match &self.reply {
                Ok(payload) => Ok(payload.clone()),
                Err(message) => Err(ProxyError::Upstream {
                    provider,
                    message: message.to_string(),
                }),
            }
        }
    }

    pub(crate) fn gemini_text(text: &str) -> Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
    }

    fn gemini() -> Provider {
        "gemini".parse().unwrap()
    }

    #[actix_web::test]
    async fn forwards_prompt_and_returns_text() {
        let spy = SpyTransport::replying(gemini_text("Try the dal"));
        let service = SuggestionService::new(gemini(), Some("key".to_string()), spy.clone());

        let reply = service.suggest("t1", "dinner for two").await.unwrap();
        assert_eq!(
            reply,
            SuggestionReply {
                suggestion: "Try the dal".to_string(),
                from_cache: false
            }
        );
        assert_eq!(spy.call_count(), 1);
        let sent = spy.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.body["contents"][0]["parts"][0]["text"], "dinner for two");
    }

    #[actix_web::test]
    async fn missing_key_never_calls_upstream() {
        let spy = SpyTransport::replying(gemini_text("unused"));
        let service = SuggestionService::new(gemini(), None, spy.clone())
            .with_cache(PromptCache::new(4, None));

        let err = service.suggest("t2", "dinner for two").await.unwrap_err();
        assert!(matches!(err, ProxyError::Config("GEMINI_API_KEY")));
        assert_eq!(spy.call_count(), 0);
    }

    #[actix_web::test]
    async fn blank_prompt_is_rejected() {
        let spy = SpyTransport::replying(gemini_text("unused"));
        let service = SuggestionService::new(gemini(), Some("key".to_string()), spy.clone());

        let err = service.suggest("t3", "   ").await.unwrap_err();
        assert!(matches!(err, ProxyError::Validation(_)));
        assert_eq!(spy.call_count(), 0);
    }

    #[actix_web::test]
    async fn repeated_prompt_is_served_from_cache() {
        let spy = SpyTransport::replying(gemini_text("R1"));
        let service = SuggestionService::new(gemini(), Some("key".to_string()), spy.clone())
            .with_cache(PromptCache::new(4, None));

        let first = service.suggest("t4", "P1").await.unwrap();
        let second = service.suggest("t5", "P1").await.unwrap();
        let other = service.suggest("t6", "P2").await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.suggestion, "R1");
        assert!(!other.from_cache);
        assert_eq!(spy.call_count(), 2);
    }

    #[actix_web::test]
    async fn without_cache_every_call_goes_upstream() {
        let spy = SpyTransport::replying(gemini_text("R1"));
        let service = SuggestionService::new(gemini(), Some("key".to_string()), spy.clone());

        service.suggest("t7", "P1").await.unwrap();
        let again = service.suggest("t8", "P1").await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(spy.call_count(), 2);
    }

    #[actix_web::test]
    async fn upstream_failure_is_not_retried_or_cached() {
        let spy = SpyTransport::failing("connection refused");
        let service = SuggestionService::new(gemini(), Some("key".to_string()), spy.clone())
            .with_cache(PromptCache::new(4, None));

        let err = service.suggest("t9", "P1").await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream { .. }));
        assert_eq!(spy.call_count(), 1);

        service.suggest("t10", "P1").await.unwrap_err();
        assert_eq!(spy.call_count(), 2);
    }

    #[actix_web::test]
    async fn unexpected_payload_is_extraction_error() {
        let spy = SpyTransport::replying(json!({"error": {"message": "quota"}}));
        let service = SuggestionService::new(gemini(), Some("key".to_string()), spy);

        let err = service.suggest("t11", "P1").await.unwrap_err();
        assert!(matches!(err, ProxyError::Extraction { .. }));
    }

    #[test]
    fn reply_serializes_camel_case() {
        let reply = SuggestionReply {
            suggestion: "x".to_string(),
            from_cache: true,
        };
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            json!({"suggestion": "x", "fromCache": true})
        );
    }
}
