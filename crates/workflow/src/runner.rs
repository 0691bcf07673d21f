//! Step executor and sequential workflow runner

use std::time::Instant;

use async_trait::async_trait;
use careflow_common::{Error, Result, WorkflowConfig};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::auth::{Credential, TokenManager};
use crate::client::{ApiClient, ApiRequest, ApiResponse};
use crate::report::{summarize, WorkflowReport};
use crate::resolver::IdResolver;
use crate::retry::{Retried, RetryPolicy};
use crate::state::{RunStatus, StagedWrites, StepOutcome, StepRecord, WorkflowState};

/// What a step hands back to the runner when its call completed
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// Expected response; `writes` are committed to the state
    Completed { value: Value, writes: StagedWrites },
    /// Call went through but the status or code was not the expected one
    Unexpected { status: u16, body: String },
}

impl StepOutput {
    pub fn completed(value: impl Into<Value>) -> Self {
        StepOutput::Completed {
            value: value.into(),
            writes: StagedWrites::new(),
        }
    }

    /// Stage a write; a no-op on `Unexpected`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let StepOutput::Completed { writes, .. } = &mut self {
            writes.set(key, value);
        }
        self
    }

    pub fn unexpected(response: &ApiResponse) -> Self {
        StepOutput::Unexpected {
            status: response.status,
            body: response.body_text(),
        }
    }
}

/// Read-only view handed to a running step
pub struct StepContext<'a> {
    pub state: &'a WorkflowState,
    pub client: &'a ApiClient,
    pub resolver: &'a IdResolver,
    credential: Option<&'a Credential>,
    retry_server_errors: bool,
}

impl<'a> StepContext<'a> {
    /// A committed string value, or [`Error::MissingDependency`]
    pub fn require_str(&self, key: &str) -> Result<&'a str> {
        self.state.get_str(key).ok_or_else(|| Error::missing(key))
    }

    pub fn credential(&self) -> Option<&'a Credential> {
        self.credential
    }

    /// Execute a request with this step's credential attached
    pub async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.client.execute(request, self.credential).await
    }

    /// Check a response against the expected statuses.
    ///
    /// Returns `Ok(true)` when expected and `Ok(false)` when the step should
    /// report a soft failure. 5xx responses become [`Error::ServerError`] so
    /// the runner retries them, unless server-error retries are disabled.
    pub fn expect_status(&self, response: &ApiResponse, expected: &[u16]) -> Result<bool> {
        if expected.contains(&response.status) {
            return Ok(true);
        }
        if self.retry_server_errors && response.status >= 500 {
            return Err(Error::ServerError {
                status: response.status,
                body: response.body_text(),
            });
        }
        Ok(false)
    }
}

/// One unit of work in a workflow
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// A required step that fails aborts the run
    fn required(&self) -> bool {
        false
    }

    /// Whether the runner should log in before running this step
    fn authenticated(&self) -> bool {
        true
    }

    /// State keys that must be present; otherwise the step is skipped
    fn requires(&self) -> &[&str] {
        &[]
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput>;
}

pub type StepFuture<'a> = BoxFuture<'a, Result<StepOutput>>;

/// A [`Step`] built from a closure
pub struct FnStep<F> {
    name: String,
    required: bool,
    authenticated: bool,
    requires: Vec<&'static str>,
    func: F,
}

impl<F> FnStep<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self
    where
        F: for<'a> Fn(&'a StepContext<'a>) -> StepFuture<'a> + Send + Sync,
    {
        Self {
            name: name.into(),
            required: false,
            authenticated: true,
            requires: Vec::new(),
            func,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn requires(mut self, keys: &[&'static str]) -> Self {
        self.requires.extend_from_slice(keys);
        self
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: for<'a> Fn(&'a StepContext<'a>) -> StepFuture<'a> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        self.required
    }

    fn authenticated(&self) -> bool {
        self.authenticated
    }

    fn requires(&self) -> &[&str] {
        &self.requires
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput> {
        (self.func)(ctx).await
    }
}

/// Runs steps in order over one [`WorkflowState`].
///
/// The runner holds no per-run state and can drive several independent runs
/// concurrently.
#[derive(Clone)]
pub struct WorkflowRunner {
    client: ApiClient,
    tokens: TokenManager,
    retry: RetryPolicy,
    resolver: IdResolver,
    retry_server_errors: bool,
}

impl WorkflowRunner {
    pub fn new(client: ApiClient, tokens: TokenManager, retry: RetryPolicy) -> Self {
        Self {
            client,
            tokens,
            retry,
            resolver: IdResolver::default(),
            retry_server_errors: true,
        }
    }

    /// Runner with a real HTTP transport built from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        config.validate()?;
        let client = ApiClient::from_config(config)?;
        Ok(Self::with_client(config, client))
    }

    /// Runner over an existing client, with retry settings from configuration
    pub fn with_client(config: &WorkflowConfig, client: ApiClient) -> Self {
        let tokens = TokenManager::new(client.clone(), config.credentials.clone());
        let mut runner = Self::new(client, tokens, RetryPolicy::from_config(&config.retry));
        runner.retry_server_errors = config.retry.retry_server_errors;
        runner
    }

    /// Run every step on a fresh state and summarise the result
    pub async fn run_workflow(&self, name: &str, steps: &[Box<dyn Step>]) -> WorkflowReport {
        let mut state = WorkflowState::named(name);
        self.run_with_state(steps, &mut state).await;
        summarize(&state)
    }

    /// Run every step on a caller-provided state
    pub async fn run_with_state(&self, steps: &[Box<dyn Step>], state: &mut WorkflowState) -> RunStatus {
        let start = Instant::now();
        state.set_status(RunStatus::Running);
        info!("Running workflow '{}' ({} steps)", state.name(), steps.len());

        for step in steps {
            if let StepOutcome::HardFailure { .. } = self.run_step(step.as_ref(), state).await {
                state.set_status(RunStatus::Aborted);
                error!(
                    "Workflow '{}' aborted at step '{}' ({} ms)",
                    state.name(),
                    step.name(),
                    start.elapsed().as_millis()
                );
                return RunStatus::Aborted;
            }
        }

        state.set_status(RunStatus::Completed);
        info!(
            "Workflow '{}' completed ({} ms)",
            state.name(),
            start.elapsed().as_millis()
        );
        RunStatus::Completed
    }

    /// Run one step: check inputs, log in, execute with retry, classify, record.
    ///
    /// A `HardFailure` outcome means the run must stop.
    pub async fn run_step(&self, step: &dyn Step, state: &mut WorkflowState) -> StepOutcome {
        let start = Instant::now();
        debug!("Running step: {}", step.name());

        let (outcome, attempts) = self.execute(step, state).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            StepOutcome::Success { .. } => info!("✓ {} ({} ms)", step.name(), duration_ms),
            StepOutcome::SoftFailure { status, body } => warn!(
                "⚠ {} - unexpected response {:?}: {}",
                step.name(),
                status,
                body
            ),
            StepOutcome::HardFailure { error: e } => error!("✗ {} - {}", step.name(), e),
            StepOutcome::Skipped { missing } => info!("↷ {} skipped, missing {}", step.name(), missing),
        }

        state.record(StepRecord {
            name: step.name().to_string(),
            outcome: outcome.clone(),
            attempts,
            duration_ms,
        });
        outcome
    }

    async fn execute(&self, step: &dyn Step, state: &mut WorkflowState) -> (StepOutcome, u32) {
        if let Some(missing) = step.requires().iter().find(|k| !state.contains(k)) {
            return self.missing_input(step, missing, 0);
        }

        let credential = if step.authenticated() {
            match self.retry.retry_if(|_| self.tokens.get_token(), Error::is_transient).await {
                Ok(Retried { value, .. }) => Some(value),
                Err(Retried { value: e, attempts }) => {
                    return self.failure(step, e, attempts);
                }
            }
        } else {
            None
        };

        let result = {
            let ctx = StepContext {
                state: &*state,
                client: &self.client,
                resolver: &self.resolver,
                credential: credential.as_ref(),
                retry_server_errors: self.retry_server_errors,
            };
            let ctx = &ctx;
            self.retry
                .retry_if(move |_| step.run(ctx), Error::is_transient)
                .await
        };

        match result {
            Ok(Retried { value: StepOutput::Completed { value, writes }, attempts }) => {
                if !writes.is_empty() {
                    debug!("{} publishes {:?}", step.name(), writes.keys().collect::<Vec<_>>());
                }
                state.commit(writes);
                (StepOutcome::Success { value }, attempts)
            }
            Ok(Retried { value: StepOutput::Unexpected { status, body }, attempts }) => {
                if step.required() {
                    let error = format!("unexpected HTTP {}: {}", status, body);
                    (StepOutcome::HardFailure { error }, attempts)
                } else {
                    (StepOutcome::SoftFailure { status: Some(status), body }, attempts)
                }
            }
            Err(Retried { value: Error::MissingDependency(missing), attempts }) => {
                self.missing_input(step, &missing, attempts)
            }
            Err(Retried { value: e, attempts }) => self.failure(step, e, attempts),
        }
    }

    fn missing_input(&self, step: &dyn Step, missing: &str, attempts: u32) -> (StepOutcome, u32) {
        if step.required() {
            let error = format!("required input '{}' was never produced", missing);
            (StepOutcome::HardFailure { error }, attempts)
        } else {
            let missing = missing.to_string();
            (StepOutcome::Skipped { missing }, attempts)
        }
    }

    /// Auth errors and failures of required steps abort; the rest is downgraded
    fn failure(&self, step: &dyn Step, e: Error, attempts: u32) -> (StepOutcome, u32) {
        if e.is_fatal() || step.required() {
            return (StepOutcome::HardFailure { error: e.to_string() }, attempts);
        }

        let outcome = match e {
            Error::ServerError { status, body } | Error::UnexpectedStatus { status, body } => {
                StepOutcome::SoftFailure { status: Some(status), body }
            }
            other => StepOutcome::SoftFailure {
                status: None,
                body: other.to_string(),
            },
        };
        (outcome, attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RawResponse, Transport, TransportRequest};
    use crate::retry::Backoff;
    use crate::state::keys;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers every login with a token and counts calls
    struct LoginOnly {
        logins: AtomicU32,
        status: u16,
    }

    #[async_trait]
    impl Transport for LoginOnly {
        async fn send(&self, _request: TransportRequest) -> Result<RawResponse> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(RawResponse {
                status: self.status,
                body: r#"{"data":{"access_token":"token-abc"}}"#.into(),
            })
        }
    }

    fn runner(login_status: u16) -> (WorkflowRunner, Arc<LoginOnly>) {
        let transport = Arc::new(LoginOnly { logins: AtomicU32::new(0), status: login_status });
        let config = WorkflowConfig::default();
        let client = ApiClient::with_transport(&config, transport.clone());
        let tokens = TokenManager::new(client.clone(), config.credentials.clone());
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::ZERO));
        (WorkflowRunner::new(client, tokens, policy), transport)
    }

    fn boxed<S: Step + 'static>(step: S) -> Box<dyn Step> {
        Box::new(step)
    }

    #[tokio::test]
    async fn test_writes_visible_only_after_success() {
        let (runner, _) = runner(200);
        let steps = vec![
            boxed(FnStep::new("soft", |_ctx| {
                Box::pin(async {
                    Ok(StepOutput::Unexpected { status: 400, body: "bad".into() })
                })
            })),
            boxed(FnStep::new("produce", |ctx| {
                Box::pin(async move {
                    assert!(ctx.state.get(keys::PATIENT_ID).is_none());
                    Ok(StepOutput::completed("ok").with(keys::PATIENT_ID, "pat-7"))
                })
            })),
            boxed(
                FnStep::new("consume", |ctx| {
                    Box::pin(async move {
                        let id = ctx.require_str(keys::PATIENT_ID)?;
                        Ok(StepOutput::completed(id.to_string()))
                    })
                })
                .requires(&[keys::PATIENT_ID]),
            ),
        ];

        let mut state = WorkflowState::named("visibility");
        let status = runner.run_with_state(&steps, &mut state).await;

        assert_eq!(status, RunStatus::Completed);
        assert_eq!(
            state.outcome("consume"),
            Some(&StepOutcome::Success { value: Value::from("pat-7") })
        );
    }

    #[tokio::test]
    async fn test_failed_step_writes_are_discarded() {
        let (runner, _) = runner(200);
        let steps = vec![boxed(
            FnStep::new("fails", |_ctx| {
                Box::pin(async { Err(Error::Config("broken payload".into())) })
            })
            .unauthenticated(),
        )];
        let mut state = WorkflowState::new();
        runner.run_with_state(&steps, &mut state).await;

        assert!(matches!(
            state.outcome("fails"),
            Some(StepOutcome::SoftFailure { status: None, .. })
        ));
        assert!(state.get(keys::PATIENT_ID).is_none());
    }

    #[tokio::test]
    async fn test_fresh_token_per_authenticated_step() {
        let (runner, transport) = runner(200);
        let step = || {
            boxed(FnStep::new("needs-token", |ctx| {
                Box::pin(async move {
                    let token = ctx.credential().map(|c| c.secret().to_string());
                    Ok(StepOutput::completed(token.unwrap_or_default()))
                })
            }))
        };
        let steps = vec![step(), step(), step()];
        let report = runner.run_workflow("tokens", &steps).await;

        assert_eq!(transport.logins.load(Ordering::SeqCst), 3);
        assert_eq!(report.tally.succeeded, 3);
    }

    #[tokio::test]
    async fn test_auth_error_aborts_even_optional_step() {
        let (runner, _) = runner(401);
        let steps = vec![
            boxed(FnStep::new("optional", |_ctx| {
                Box::pin(async { Ok(StepOutput::completed(Value::Null)) })
            })),
            boxed(FnStep::new("after", |_ctx| {
                Box::pin(async { Ok(StepOutput::completed(Value::Null)) })
            })),
        ];
        let mut state = WorkflowState::new();
        let status = runner.run_with_state(&steps, &mut state).await;

        assert_eq!(status, RunStatus::Aborted);
        assert_eq!(state.records().len(), 1);
        assert!(matches!(
            state.records()[0].outcome,
            StepOutcome::HardFailure { .. }
        ));
    }

    #[tokio::test]
    async fn test_transient_errors_retry_then_downgrade() {
        let (runner, _) = runner(200);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let steps = vec![boxed(
            FnStep::new("flaky", move |_ctx| {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Transport("connection reset".into()))
                })
            })
            .unauthenticated(),
        )];
        let mut state = WorkflowState::new();
        let status = runner.run_with_state(&steps, &mut state).await;

        assert_eq!(status, RunStatus::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(state.records()[0].attempts, 3);
        assert!(matches!(
            state.records()[0].outcome,
            StepOutcome::SoftFailure { status: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_optional_step_does_not_stop_the_run() {
        let (runner, _) = runner(200);
        let steps = vec![
            boxed(
                FnStep::new("broken", |_ctx| {
                    Box::pin(async { Err(Error::Config("malformed payload".into())) })
                })
                .unauthenticated(),
            ),
            boxed(
                FnStep::new("after", |_ctx| {
                    Box::pin(async { Ok(StepOutput::completed("ran").with(keys::PATIENT_ID, "pat-1")) })
                })
                .unauthenticated(),
            ),
        ];
        let mut state = WorkflowState::named("resilient");
        let status = runner.run_with_state(&steps, &mut state).await;

        assert_eq!(status, RunStatus::Completed);
        assert_eq!(state.records().len(), 2);
        assert_eq!(
            state.records()[0].outcome,
            StepOutcome::SoftFailure {
                status: None,
                body: "Invalid configuration: malformed payload".into()
            }
        );
        assert_eq!(state.records()[0].attempts, 1);
        assert_eq!(state.outcome("after"), Some(&StepOutcome::Success { value: "ran".into() }));
        assert_eq!(state.get_str(keys::PATIENT_ID), Some("pat-1"));

        let report = summarize(&state);
        assert_eq!(report.tally.soft_failed, 1);
        assert_eq!(report.tally.succeeded, 1);
        assert_eq!(report.lines[1].step, "after");
    }

    #[tokio::test]
    async fn test_unexpected_status_is_not_retried() {
        let (runner, _) = runner(200);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let steps = vec![boxed(
            FnStep::new("conflict", move |_ctx| {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(StepOutput::Unexpected { status: 409, body: "slot taken".into() })
                })
            })
            .unauthenticated(),
        )];
        let mut state = WorkflowState::new();
        runner.run_with_state(&steps, &mut state).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            state.outcome("conflict"),
            Some(&StepOutcome::SoftFailure { status: Some(409), body: "slot taken".into() })
        );
    }

    #[tokio::test]
    async fn test_missing_input_on_required_step_aborts() {
        let (runner, _) = runner(200);
        let steps = vec![
            boxed(
                FnStep::new("needs-provider", |_ctx| {
                    Box::pin(async { Ok(StepOutput::completed(Value::Null)) })
                })
                .requires(&[keys::PROVIDER_ID])
                .required(),
            ),
            boxed(FnStep::new("never", |_ctx| {
                Box::pin(async { Ok(StepOutput::completed(Value::Null)) })
            })),
        ];
        let mut state = WorkflowState::new();
        let status = runner.run_with_state(&steps, &mut state).await;
        assert_eq!(status, RunStatus::Aborted);
        assert_eq!(state.records().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_dependency_error_inside_step_is_skip() {
        let (runner, _) = runner(200);
        let steps = vec![boxed(
            FnStep::new("late-check", |ctx| {
                Box::pin(async move {
                    let id = ctx.require_str(keys::ENCOUNTER_ID)?;
                    Ok(StepOutput::completed(id.to_string()))
                })
            })
            .unauthenticated(),
        )];
        let mut state = WorkflowState::new();
        runner.run_with_state(&steps, &mut state).await;
        assert_eq!(
            state.outcome("late-check"),
            Some(&StepOutcome::Skipped { missing: keys::ENCOUNTER_ID.into() })
        );
        assert_eq!(state.records()[0].attempts, 1);
    }
}
