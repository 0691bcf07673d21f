//! Scripted in-memory transport for workflow tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use careflow_common::{BackoffConfig, Error, Result, WorkflowConfig};
use careflow_workflow::{ApiClient, RawResponse, Transport, TransportRequest, WorkflowRunner};
use reqwest::Method;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

type Reply = std::result::Result<(u16, Value), String>;

struct Route {
    method: Method,
    path: String,
    replies: VecDeque<Reply>,
}

/// Replies per `(method, path)` in order; the last reply repeats.
/// Unscripted routes answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.method == method && r.path == path) {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.push(method, path, Ok((status, body)));
        self
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, Err(message.to_string()));
        self
    }

    pub fn login_ok(&self) -> &Self {
        self.on(Method::POST, "/login", 200, json!({"data": {"access_token": "tok-123"}}))
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url.ends_with(path))
            .collect()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && request.url.ends_with(&r.path));
        let reply = match route {
            Some(route) if route.replies.len() > 1 => route.replies.pop_front(),
            Some(route) => route.replies.front().cloned(),
            None => None,
        };

        match reply {
            Some(Ok((status, body))) => Ok(RawResponse { status, body: body.to_string() }),
            Some(Err(message)) => Err(Error::Transport(message)),
            None => Ok(RawResponse {
                status: 404,
                body: json!({"message": "no route"}).to_string(),
            }),
        }
    }
}

pub fn test_config() -> WorkflowConfig {
    let mut config = WorkflowConfig::default();
    config.base_url = "https://api.test".into();
    config.tenant_id = "tenant_test".into();
    config.retry.backoff = BackoffConfig::Fixed { delay_ms: 0 };
    config
}

/// Route runner logs to the test harness; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn runner(transport: &Arc<ScriptedTransport>) -> WorkflowRunner {
    init_tracing();
    let config = test_config();
    let client = ApiClient::with_transport(&config, transport.clone());
    WorkflowRunner::with_client(&config, client)
}
