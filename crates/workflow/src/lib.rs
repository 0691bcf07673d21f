//! Careflow Workflow Runner
//!
//! Drives an ordered chain of API calls against a multi-tenant healthcare
//! scheduling service. Each step reads identifiers produced by earlier steps,
//! calls the API with a freshly issued bearer token, and publishes new
//! identifiers only when it succeeds.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   WorkflowRunner (sequential)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  for step in steps:                                         │
//! │    ├── requires() satisfied?        no -> Skipped           │
//! │    ├── TokenManager::get_token()    (fresh login, retried)  │
//! │    ├── RetryPolicy::retry_if(step.run, is_transient)        │
//! │    ├── classify -> StepOutcome                              │
//! │    │     ├── Success      commit staged writes              │
//! │    │     ├── SoftFailure  continue                          │
//! │    │     ├── HardFailure  abort run                         │
//! │    │     └── Skipped      continue                          │
//! │    └── WorkflowState::record(StepRecord)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  summarize(&WorkflowState) -> WorkflowReport                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod healthcare;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod runner;
pub mod state;

pub use auth::{Credential, TokenManager};
pub use client::{ApiClient, ApiRequest, ApiResponse, HttpTransport, RawResponse, Transport, TransportRequest};
pub use healthcare::{HealthcareOptions, HealthcareWorkflow};
pub use report::{summarize, ReportLine, Tally, WorkflowReport};
pub use resolver::{IdResolver, IdSource, ResolvedId};
pub use retry::{Backoff, Retried, RetryPolicy};
pub use runner::{FnStep, Step, StepContext, StepOutput, WorkflowRunner};
pub use state::{keys, OutcomeKind, RunStatus, StepOutcome, StepRecord, WorkflowState};
