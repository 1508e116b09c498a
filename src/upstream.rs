use crate::error::ProxyError;
use crate::utils;
use log::{debug, error};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A fully built provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub provider: &'static str,
    pub url: Url,
    pub bearer: Option<String>,
    pub body: Value,
}

/// Sends a provider request and returns the decoded JSON payload.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: UpstreamRequest) -> Result<Value, ProxyError>;
}

/// Production transport over a shared reqwest client. No retries.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<Value, ProxyError> {
        let provider = request.provider;
        debug!("Sending request to {} at {}", provider, utils::redact_url(&request.url));

        let mut builder = self.client.post(request.url).json(&request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            error!("{} request failed: {}", provider, e);
            ProxyError::Upstream {
                provider,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} returned status {}. Body: {}", provider, status, body);
            return Err(ProxyError::Upstream {
                provider,
                message: format!("status {}", status),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            error!("{} returned a body that is not JSON: {}", provider, e);
            ProxyError::Upstream {
                provider,
                message: format!("unreadable body: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use actix_web::dev::ServerHandle;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use serde_json::json;

    async fn echo_authorization(req: HttpRequest) -> HttpResponse {
        let authorization = req
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        HttpResponse::Ok().json(json!({ "authorization": authorization }))
    }

    async fn unavailable() -> HttpResponse {
        HttpResponse::ServiceUnavailable().body("model overloaded")
    }

    async fn plain_text() -> HttpResponse {
        HttpResponse::Ok().content_type("text/plain").body("not json at all")
    }

    /// Local stand-in for a provider, on an ephemeral port.
    fn stub_provider() -> std::io::Result<(String, ServerHandle)> {
        let server = HttpServer::new(|| {
            App::new()
                .route("/echo", web::post().to(echo_authorization))
                .route("/unavailable", web::post().to(unavailable))
                .route("/plain", web::post().to(plain_text))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))?;
        let base = format!("http://{}", server.addrs()[0]);
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        Ok((base, handle))
    }

    fn perplexity_request(base: &str, path: &str) -> UpstreamRequest {
        let provider: Provider = "perplexity".parse().unwrap();
        let mut request = provider.build_request("dinner for two", "pplx-secret").unwrap();
        request.url = Url::parse(&format!("{}{}", base, path)).unwrap();
        request
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).unwrap()
    }

    #[actix_web::test]
    async fn bearer_token_reaches_the_provider() {
        let (base, handle) = stub_provider().unwrap();

        let payload = transport().send(perplexity_request(&base, "/echo")).await.unwrap();
        assert_eq!(payload["authorization"], "Bearer pplx-secret");

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn error_status_is_an_upstream_error() {
        let (base, handle) = stub_provider().unwrap();

        let err = transport().send(perplexity_request(&base, "/unavailable")).await.unwrap_err();
        match err {
            ProxyError::Upstream { provider, message } => {
                assert_eq!(provider, "Perplexity");
                assert!(message.contains("503"));
            }
            other => panic!("expected an upstream error, got {:?}", other),
        }

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn non_json_body_is_an_upstream_error() {
        let (base, handle) = stub_provider().unwrap();

        let err = transport().send(perplexity_request(&base, "/plain")).await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream { provider: "Perplexity", .. }));

        handle.stop(true).await;
    }
}
