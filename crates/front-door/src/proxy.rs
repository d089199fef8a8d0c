use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Method;

use crate::types::{HttpResponse, ProxyRequest, ResponseBody};
use crate::FrontDoorError;

#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: "front-door".to_string(),
        }
    }
}

#[async_trait]
pub trait ProxyForwarder: Send + Sync {
    async fn forward(&self, request: &ProxyRequest) -> Result<HttpResponse, FrontDoorError>;
}

#[derive(Clone)]
pub struct HttpProxyForwarder {
    client: reqwest::Client,
    config: ProxyConfig,
}

impl HttpProxyForwarder {
    pub fn new(config: ProxyConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }
}

#[async_trait]
impl ProxyForwarder for HttpProxyForwarder {
    async fn forward(&self, request: &ProxyRequest) -> Result<HttpResponse, FrontDoorError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|err| FrontDoorError::BadRequest(err.to_string()))?;
        let mut headers = HeaderMap::new();
        let mut has_user_agent = false;
        for (key, value) in &request.headers {
            if key.eq_ignore_ascii_case("host") || key.eq_ignore_ascii_case("content-length") {
                continue;
            }
            if key.eq_ignore_ascii_case("user-agent") {
                has_user_agent = true;
            }
            if let (Ok(name), Ok(value)) =
                (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value))
            {
                headers.insert(name, value);
            }
        }
        if !has_user_agent {
            if let Ok(value) = HeaderValue::from_str(&self.config.user_agent) {
                headers.insert(USER_AGENT, value);
            }
        }

        let response = self
            .client
            .request(method, &request.url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let stream = response.bytes_stream().map(|item| {
            item.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
        });
        Ok(HttpResponse {
            status,
            headers,
            body: ResponseBody::Stream(Box::pin(stream)),
        })
    }
}

fn classify_error(err: reqwest::Error) -> FrontDoorError {
    if err.is_timeout() {
        FrontDoorError::UpstreamTimeout(err.to_string())
    } else {
        FrontDoorError::UpstreamUnavailable(err.to_string())
    }
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (name, value) in headers {
        let name = name.as_str().to_lowercase();
        // The body is relayed as a stream, so framing headers no longer apply.
        if name == "content-length" || name == "transfer-encoding" || name == "connection" {
            continue;
        }
        if let Ok(value) = value.to_str() {
            out.insert(name, value.to_string());
        }
    }
    out
}
