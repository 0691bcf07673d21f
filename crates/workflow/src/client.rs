//! HTTP client adapter for the scheduling API
//!
//! The client attaches tenant and bearer headers, executes one request and
//! normalises the response. It never fails on a non-2xx status; callers
//! decide what is fatal. It never retries either.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use careflow_common::{Error, Result, WorkflowConfig};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::auth::Credential;

/// One outgoing request, relative to the API prefix
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A request after the client resolved the URL and headers
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Status and undecoded body as received from the wire
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Response body, parsed when possible
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn from_raw(raw: RawResponse) -> Self {
        let body = if raw.body.trim().is_empty() {
            ResponseBody::Empty
        } else {
            match serde_json::from_str::<Value>(&raw.body) {
                Ok(json) => ResponseBody::Json(json),
                Err(e) => {
                    debug!("Response body is not JSON ({}), keeping raw text", e);
                    ResponseBody::Text(raw.body)
                }
            }
        };
        Self { status: raw.status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    /// JSON body, or a diagnostic object carrying the status and raw text
    pub fn json_or_diagnostic(&self) -> Value {
        match &self.body {
            ResponseBody::Json(v) => v.clone(),
            ResponseBody::Text(text) => serde_json::json!({
                "error": "Failed to parse response",
                "status": self.status,
                "text": text,
            }),
            ResponseBody::Empty => serde_json::json!({ "status": self.status }),
        }
    }

    /// Body rendered for logs and reports
    pub fn body_text(&self) -> String {
        match &self.body {
            ResponseBody::Json(v) => v.to_string(),
            ResponseBody::Text(t) => t.clone(),
            ResponseBody::Empty => String::new(),
        }
    }

    /// The vendor's `code` field, if any
    pub fn code(&self) -> Option<&str> {
        self.json().and_then(|v| v.get("code")).and_then(Value::as_str)
    }
}

/// Wire-level request execution
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse>;
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
        let mut builder = self.client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("failed to read body: {}", e)))?;

        Ok(RawResponse { status, body })
    }
}

/// Tenant-aware API client, cheap to clone and safe to share between runs
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_prefix: String,
    tenant_id: String,
    portal_origin: Option<String>,
}

impl ApiClient {
    /// Client backed by a real HTTP transport
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: &WorkflowConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_prefix: config.api_prefix.clone(),
            tenant_id: config.tenant_id.clone(),
            portal_origin: config.portal_origin.clone(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    fn default_headers(&self, credential: Option<&Credential>) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept".to_string(), "application/json, text/plain, */*".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-TENANT-ID".to_string(), self.tenant_id.clone()),
        ];
        if let Some(origin) = &self.portal_origin {
            headers.push(("Origin".to_string(), origin.clone()));
            headers.push(("Referer".to_string(), format!("{}/", origin.trim_end_matches('/'))));
        }
        if let Some(credential) = credential {
            headers.push(("Authorization".to_string(), format!("Bearer {}", credential.secret())));
        }
        headers
    }

    /// Execute a request. Only transport failures are errors.
    pub async fn execute(
        &self,
        request: ApiRequest,
        credential: Option<&Credential>,
    ) -> Result<ApiResponse> {
        let mut headers = self.default_headers(credential);
        headers.extend(request.headers);

        let outgoing = TransportRequest {
            url: self.url(&request.path),
            method: request.method,
            query: request.query,
            headers,
            body: request.body,
        };

        debug!("{} {}", outgoing.method, outgoing.url);
        let raw = self.transport.send(outgoing).await?;
        let response = ApiResponse::from_raw(raw);
        debug!("-> HTTP {}", response.status);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<TransportRequest>>,
        reply: RawResponse,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    fn client_with(reply: RawResponse) -> (ApiClient, Arc<Recorder>) {
        let recorder = Arc::new(Recorder { seen: Mutex::new(Vec::new()), reply });
        let mut config = WorkflowConfig::default();
        config.base_url = "https://api.test/".into();
        config.tenant_id = "tenant_a".into();
        config.portal_origin = Some("https://tenant_a.portal.test".into());
        (ApiClient::with_transport(&config, recorder.clone()), recorder)
    }

    #[tokio::test]
    async fn test_attaches_tenant_and_bearer_headers() {
        let (client, recorder) = client_with(RawResponse { status: 200, body: "{}".into() });
        let credential = Credential::new("tok-123");

        client
            .execute(ApiRequest::get("/patient").query("page", 0), Some(&credential))
            .await
            .unwrap();

        let seen = recorder.seen.lock().unwrap();
        let req = &seen[0];
        assert_eq!(req.url, "https://api.test/api/master/patient");
        assert_eq!(req.query, vec![("page".to_string(), "0".to_string())]);
        let header = |name: &str| {
            req.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
        };
        assert_eq!(header("X-TENANT-ID").as_deref(), Some("tenant_a"));
        assert_eq!(header("Authorization").as_deref(), Some("Bearer tok-123"));
        assert_eq!(header("Referer").as_deref(), Some("https://tenant_a.portal.test/"));
    }

    #[tokio::test]
    async fn test_non_2xx_is_not_an_error() {
        let (client, _) = client_with(RawResponse {
            status: 409,
            body: r#"{"code":"SLOT_TAKEN"}"#.into(),
        });
        let response = client.execute(ApiRequest::post("/appointment"), None).await.unwrap();
        assert_eq!(response.status, 409);
        assert!(!response.is_success());
        assert_eq!(response.code(), Some("SLOT_TAKEN"));
    }

    #[tokio::test]
    async fn test_unparseable_body_falls_back_to_text() {
        let (client, _) = client_with(RawResponse {
            status: 502,
            body: "<html>Bad Gateway</html>".into(),
        });
        let response = client.execute(ApiRequest::get("/provider"), None).await.unwrap();
        assert_eq!(response.body, ResponseBody::Text("<html>Bad Gateway</html>".into()));
        let diag = response.json_or_diagnostic();
        assert_eq!(diag["status"], 502);
        assert_eq!(diag["text"], "<html>Bad Gateway</html>");
    }

    #[test]
    fn test_empty_body() {
        let response = ApiResponse::from_raw(RawResponse { status: 204, body: " ".into() });
        assert_eq!(response.body, ResponseBody::Empty);
        assert!(response.json().is_none());
    }
}
