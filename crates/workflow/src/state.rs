//! Per-run workflow state
//!
//! A [`WorkflowState`] is owned by exactly one run. It holds the ordered log
//! of step records and a bag of named values produced by successful steps.
//! Steps never write to the bag directly: they return staged writes that the
//! runner commits only when the step succeeds.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known value names shared between steps
pub mod keys {
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const PATIENT_ID: &str = "patientId";
    pub const PROVIDER_ID: &str = "providerId";
    pub const APPOINTMENT_ID: &str = "appointmentId";
    pub const ENCOUNTER_ID: &str = "encounterId";
    pub const SELECTED_SLOT: &str = "selectedSlot";
    pub const TELEHEALTH_TOKEN: &str = "telehealthToken";
    pub const AVAILABILITY_SETTING: &str = "availabilitySetting";
}

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    NotStarted,
    Running,
    Completed,
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::NotStarted => write!(f, "not started"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Result of one step, immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Step completed as expected
    Success { value: Value },
    /// Call completed but the status or code was not what the step expected
    SoftFailure { status: Option<u16>, body: String },
    /// Unrecoverable error; aborts the run
    HardFailure { error: String },
    /// An upstream value the step needs was never produced
    Skipped { missing: String },
}

impl StepOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            StepOutcome::Success { .. } => OutcomeKind::Success,
            StepOutcome::SoftFailure { .. } => OutcomeKind::SoftFailure,
            StepOutcome::HardFailure { .. } => OutcomeKind::HardFailure,
            StepOutcome::Skipped { .. } => OutcomeKind::Skipped,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    SoftFailure,
    HardFailure,
    Skipped,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "SUCCESS"),
            OutcomeKind::SoftFailure => write!(f, "SOFT-FAIL"),
            OutcomeKind::HardFailure => write!(f, "HARD-FAIL"),
            OutcomeKind::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Log entry for one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub outcome: StepOutcome,
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Values a step wants to publish, applied only on success
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedWrites {
    entries: Vec<(String, Value)>,
}

impl StagedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    name: String,
    values: HashMap<String, Value>,
    records: Vec<StepRecord>,
    status: RunStatus,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Workflow name used in logs and reports
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Committed value, `None` until a successful step has set it
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Committed value decoded into `T`; `None` if unset or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Seed a value before the run starts (e.g. a pre-existing patient id)
    pub fn seed(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub(crate) fn commit(&mut self, writes: StagedWrites) {
        for (key, value) in writes.entries {
            self.values.insert(key, value);
        }
    }

    pub(crate) fn record(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.records.iter().rev().find(|r| r.name == step).map(|r| &r.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_value_reads_none() {
        let state = WorkflowState::new();
        assert!(state.get(keys::PATIENT_ID).is_none());
        assert!(!state.contains(keys::PATIENT_ID));
        assert_eq!(state.status(), RunStatus::NotStarted);
    }

    #[test]
    fn test_commit_makes_values_visible() {
        let mut state = WorkflowState::new();
        let mut writes = StagedWrites::new();
        writes.set(keys::PATIENT_ID, "pat-1");
        assert!(state.get(keys::PATIENT_ID).is_none());

        state.commit(writes);
        assert_eq!(state.get_str(keys::PATIENT_ID), Some("pat-1"));
    }

    #[test]
    fn test_later_commit_overwrites() {
        let mut state = WorkflowState::new();
        let mut first = StagedWrites::new();
        first.set(keys::APPOINTMENT_ID, "a-1");
        state.commit(first);
        let mut second = StagedWrites::new();
        second.set(keys::APPOINTMENT_ID, "a-2");
        state.commit(second);
        assert_eq!(state.get_str(keys::APPOINTMENT_ID), Some("a-2"));
    }

    #[test]
    fn test_null_counts_as_absent() {
        let mut state = WorkflowState::new();
        state.seed(keys::ENCOUNTER_ID, Value::Null);
        assert!(!state.contains(keys::ENCOUNTER_ID));
    }

    #[test]
    fn test_typed_read() {
        let mut state = WorkflowState::new();
        state.seed("count", 3);
        assert_eq!(state.get_as::<u32>("count"), Some(3));
        assert_eq!(state.get_as::<String>("count"), None);
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let outcome = StepOutcome::Skipped { missing: "patientId".into() };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "skipped");
        assert_eq!(outcome.kind().to_string(), "SKIPPED");
    }
}
