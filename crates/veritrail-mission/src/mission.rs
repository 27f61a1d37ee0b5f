//! The mission loop: `IDLE -> RUNNING -> (COMPLETED | TERMINATED_BY_STEP_LIMIT)`.
//!
//! Per step:
//!
//!   context → Brain::think → THOUGHT → parse → (complete | dispatch | no-op)
//!
//! There is no failed state.  A brain that errors or stalls, or a tool that
//! fails, panics, times out, or is handed invalid parameters, leaves an
//! `ERROR` event and the loop continues.  The step deadline covers the brain
//! request and the tool call together.  The exception is a response that cannot
//! be decoded, which halts the run after it has been recorded.

use std::{fmt, sync::Arc};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use veritrail_audit::{Basis, Recorder};
use veritrail_contracts::{
    config::MissionConfig,
    error::{BrainError, ToolError},
    event::{EventKind, BRAIN_TOOL},
};
use veritrail_core::{Attestor, Brain, Receipt, Tool, ToolRegistry};

use crate::{decision::parse_decision, prompt};

/// How a mission run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MissionStatus {
    /// The brain signalled completion.
    Completed,
    /// The step budget ran out first.
    TerminatedByStepLimit,
    /// A brain response could not be decoded into a decision.
    Halted { reason: String },
}

impl MissionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MissionStatus::Completed => "completed",
            MissionStatus::TerminatedByStepLimit => "terminated_by_step_limit",
            MissionStatus::Halted { .. } => "halted",
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionStatus::Halted { reason } => write!(f, "halted: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of [`MissionLoop::run`].  The root is always present, including
/// for incomplete runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionOutcome {
    pub status: MissionStatus,
    /// Steps started, including the one that ended the run.
    pub steps: u32,
    pub final_root: String,
    pub event_count: usize,
    /// Present when an attestor was configured and accepted the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
}

enum StepOutcome {
    Continue,
    Complete,
    Halt(String),
}

/// Drives a bounded decide-and-act cycle over an audited tool registry.
pub struct MissionLoop {
    recorder: Recorder,
    brain: Arc<dyn Brain>,
    registry: ToolRegistry,
    config: MissionConfig,
    attestor: Option<Arc<dyn Attestor>>,
}

impl MissionLoop {
    pub fn new(recorder: Recorder, brain: Arc<dyn Brain>, registry: ToolRegistry) -> Self {
        Self {
            recorder,
            brain,
            registry,
            config: MissionConfig::default(),
            attestor: None,
        }
    }

    pub fn with_config(mut self, config: MissionConfig) -> Self {
        self.config = config;
        self
    }

    /// Hand the final root to `attestor` once the loop stops.
    pub fn with_attestor(mut self, attestor: Arc<dyn Attestor>) -> Self {
        self.attestor = Some(attestor);
        self
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Run the mission until completion, halt, or the step budget is spent.
    pub async fn run(&self, objective: &str) -> MissionOutcome {
        let session_id = self.recorder.session_id().to_string();
        let max_steps = self.config.max_steps;
        let system = prompt::system_prompt(objective, &self.registry.descriptors());

        info!(
            session_id = %session_id,
            objective = %objective,
            max_steps,
            tools = self.registry.len(),
            "mission started"
        );

        let mut status = MissionStatus::TerminatedByStepLimit;
        let mut steps = 0;
        for step in 1..=max_steps {
            steps = step;
            match self.step(step, &system).await {
                StepOutcome::Continue => {}
                StepOutcome::Complete => {
                    status = MissionStatus::Completed;
                    break;
                }
                StepOutcome::Halt(reason) => {
                    status = MissionStatus::Halted { reason };
                    break;
                }
            }
        }

        let final_root = self.recorder.current_root();
        let event_count = self.recorder.event_count();
        info!(
            session_id = %session_id,
            status = %status,
            steps,
            event_count,
            final_root = %final_root,
            "mission finished"
        );

        let receipt = self.attest(objective, &status, &final_root, event_count).await;

        MissionOutcome {
            status,
            steps,
            final_root,
            event_count,
            receipt,
        }
    }

    // ── One step ──────────────────────────────────────────────────────────────

    async fn step(&self, step: u32, system: &str) -> StepOutcome {
        let recent = self.recorder.recent_events(self.config.recent_events);
        let user = prompt::user_prompt(step, self.config.max_steps, &recent);
        let step_inputs = json!({ "step": step });
        let deadline = Instant::now() + self.config.step_deadline();

        // ── Ask the brain, under the step deadline ───────────────────────────
        let raw = match timeout_at(deadline, self.brain.think(system, &user)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return self.brain_failed(step, step_inputs, e),
            Err(_) => {
                let e = BrainError::Timeout {
                    secs: self.config.step_deadline_secs,
                };
                return self.brain_failed(step, step_inputs, e);
            }
        };

        // ── Preserve the raw answer before interpreting it ───────────────────
        self.record(BRAIN_TOOL, EventKind::Thought, step_inputs.clone(), Value::String(raw.clone()));

        let decision = match parse_decision(&raw) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(step, error = %e, "brain response could not be decoded, halting");
                self.record(BRAIN_TOOL, EventKind::Error, step_inputs, Value::String(e.to_string()));
                return StepOutcome::Halt(e.to_string());
            }
        };

        if decision.complete {
            info!(step, "brain signalled completion");
            return StepOutcome::Complete;
        }

        let Some(tool_name) = decision.tool_name() else {
            debug!(step, "no tool requested");
            return StepOutcome::Continue;
        };
        let Some(tool) = self.registry.get(tool_name) else {
            debug!(step, tool = %tool_name, "unknown tool requested, skipping");
            return StepOutcome::Continue;
        };

        self.dispatch(step, tool, decision.params_or_empty(), deadline).await;
        StepOutcome::Continue
    }

    /// Run one tool call for at most `tool_timeout`, and never past the
    /// step's `deadline`.
    async fn dispatch(&self, step: u32, tool: Arc<Tool>, params: Value, deadline: Instant) {
        let name = tool.name().to_string();

        if self.config.validate_params {
            if let Err(e) = validate_params(&tool.descriptor.parameters, &params) {
                warn!(step, tool = %name, error = %e, "parameters rejected");
                self.record(&name, EventKind::Error, params, Value::String(e.to_string()));
                return;
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let (budget, secs) = if remaining < self.config.tool_timeout() {
            (remaining, self.config.step_deadline_secs)
        } else {
            (self.config.tool_timeout(), self.config.tool_timeout_secs)
        };

        let kind = tool.descriptor.kind;
        let audited = self.recorder.wrap(tool, kind);
        match timeout(budget, audited.invoke(params.clone())).await {
            Ok(Ok(_)) => debug!(step, tool = %name, "tool call succeeded"),
            // Already recorded as an ERROR by the audited wrapper.
            Ok(Err(e)) => warn!(step, tool = %name, error = %e, "tool call failed"),
            Err(_) => {
                let e = ToolError::TimedOut { secs };
                warn!(step, tool = %name, error = %e, "tool call abandoned");
                self.record(&name, EventKind::Error, params, Value::String(e.to_string()));
            }
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn brain_failed(&self, step: u32, inputs: Value, error: BrainError) -> StepOutcome {
        warn!(step, error = %error, "brain request failed");
        self.record(BRAIN_TOOL, EventKind::Error, inputs, Value::String(error.to_string()));
        StepOutcome::Continue
    }

    /// Record with the previous event as basis; failures are logged only.
    fn record(&self, tool_name: &str, kind: EventKind, inputs: Value, output: Value) {
        if let Err(e) = self
            .recorder
            .record_with(tool_name, kind, inputs, output, Basis::Last)
        {
            warn!(tool = %tool_name, error = %e, "failed to record mission event");
        }
    }

    async fn attest(
        &self,
        objective: &str,
        status: &MissionStatus,
        root: &str,
        event_count: usize,
    ) -> Option<Receipt> {
        let attestor = self.attestor.as_ref()?;
        let metadata = json!({
            "sessionId": self.recorder.session_id(),
            "objective": objective,
            "status": status.label(),
            "eventCount": event_count,
        });
        match attestor.attest(root, &metadata).await {
            Ok(receipt) => {
                info!(root = %root, receipt = %receipt.0, "session root attested");
                Some(receipt)
            }
            Err(e) => {
                warn!(root = %root, error = %e, "attestation failed");
                None
            }
        }
    }
}

/// Check `params` against a tool's parameter schema.  A null schema accepts
/// anything.
fn validate_params(schema: &Value, params: &Value) -> Result<(), ToolError> {
    if schema.is_null() {
        return Ok(());
    }
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ToolError::InvalidParams(format!("tool parameter schema is invalid: {e}")))?;

    let violations: Vec<String> = validator
        .iter_errors(params)
        .map(|error| format!("at '{}': {}", error.instance_path, error))
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidParams(violations.join("; ")))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use veritrail_audit::Recorder;
    use veritrail_contracts::{
        config::MissionConfig,
        error::{BrainError, ToolError, VeritrailResult},
        event::{EventKind, BRAIN_TOOL},
        session::EMPTY_ROOT,
    };
    use veritrail_core::{Attestor, Brain, Receipt, Tool, ToolRegistry};
    use veritrail_verify::SessionVerifier;

    use super::{MissionLoop, MissionStatus};

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Replays canned answers, then idles with a no-op decision.
    struct ScriptedBrain {
        answers: Mutex<VecDeque<Result<String, BrainError>>>,
    }

    impl ScriptedBrain {
        fn new(answers: Vec<Result<&str, BrainError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into_iter().map(|a| a.map(str::to_string)).collect()),
            })
        }
    }

    #[async_trait]
    impl Brain for ScriptedBrain {
        async fn think(&self, _system: &str, _user: &str) -> Result<String, BrainError> {
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(r#"{"thought": "nothing to do"}"#.to_string()))
        }
    }

    struct StalledBrain;

    #[async_trait]
    impl Brain for StalledBrain {
        async fn think(&self, _system: &str, _user: &str) -> Result<String, BrainError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("{}".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingAttestor {
        seen: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Attestor for RecordingAttestor {
        async fn attest(&self, root: &str, metadata: &Value) -> VeritrailResult<Receipt> {
            self.seen.lock().unwrap().push((root.to_string(), metadata.clone()));
            Ok(Receipt("0xreceipt".to_string()))
        }
    }

    // ── Builder helpers ───────────────────────────────────────────────────────

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::blocking(
            "get_balance",
            "Current ETH balance",
            json!({ "type": "object", "properties": {} }),
            EventKind::Observation,
            |_| Ok(json!({ "balance_eth": 1.5 })),
        ));
        registry.register(Tool::asynchronous(
            "explode",
            "Always fails",
            Value::Null,
            EventKind::Action,
            |_| async { Err(ToolError::Failed("boom".to_string())) },
        ));
        registry.register(Tool::asynchronous(
            "crash",
            "Panics mid-call",
            Value::Null,
            EventKind::Action,
            |_| async {
                let quotes: Vec<f64> = Vec::new();
                Ok(json!(quotes[3]))
            },
        ));
        registry.register(Tool::asynchronous(
            "hang",
            "Never returns in time",
            Value::Null,
            EventKind::Action,
            |_| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!("late"))
            },
        ));
        registry
    }

    fn mission(brain: Arc<dyn Brain>, max_steps: u32) -> MissionLoop {
        MissionLoop::new(Recorder::new("mission-test"), brain, registry()).with_config(MissionConfig {
            max_steps,
            ..MissionConfig::default()
        })
    }

    fn kinds(mission: &MissionLoop) -> Vec<(EventKind, String)> {
        mission
            .recorder()
            .events()
            .into_iter()
            .map(|e| (e.kind, e.tool_name))
            .collect()
    }

    // ── Resilience ────────────────────────────────────────────────────────────

    /// A tool that always fails leaves an ERROR event, changes the root, and
    /// does not stop the loop.
    #[tokio::test]
    async fn test_failing_tool_is_recorded_and_survived() {
        let brain = ScriptedBrain::new(vec![Ok(r#"{"tool": "explode", "params": {}}"#)]);
        let mission = mission(brain, 2);

        let outcome = mission.run("try the risky thing").await;

        assert_eq!(outcome.status, MissionStatus::TerminatedByStepLimit);
        assert_eq!(outcome.steps, 2);
        assert_ne!(outcome.final_root, EMPTY_ROOT);

        let events = mission.recorder().events();
        assert_eq!(events[0].kind, EventKind::Thought);
        assert_eq!(events[1].kind, EventKind::Error);
        assert_eq!(events[1].tool_name, "explode");
        assert_eq!(events[1].output, json!("boom"));
        assert_eq!(events[1].basis_id, Some(events[0].id.clone()));
        // Exactly one ERROR: the loop must not record the failure twice.
        assert_eq!(events.iter().filter(|e| e.kind == EventKind::Error).count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_no_op() {
        let brain = ScriptedBrain::new(vec![Ok(r#"{"tool": "teleport", "params": {"to": "mars"}}"#)]);
        let mission = mission(brain, 1);

        let outcome = mission.run("go far").await;

        assert_eq!(outcome.status, MissionStatus::TerminatedByStepLimit);
        assert_eq!(kinds(&mission), vec![(EventKind::Thought, BRAIN_TOOL.to_string())]);
        assert!(mission.recorder().events()[0]
            .output
            .as_str()
            .unwrap()
            .contains("teleport"));
    }

    #[tokio::test]
    async fn test_undecodable_response_halts_after_recording() {
        let brain = ScriptedBrain::new(vec![Ok("I would rather not answer in JSON.")]);
        let mission = mission(brain, 5);

        let outcome = mission.run("anything").await;

        assert!(matches!(outcome.status, MissionStatus::Halted { .. }));
        assert_eq!(outcome.steps, 1);
        assert_eq!(
            kinds(&mission),
            vec![
                (EventKind::Thought, BRAIN_TOOL.to_string()),
                (EventKind::Error, BRAIN_TOOL.to_string()),
            ]
        );
        assert_eq!(
            mission.recorder().events()[0].output,
            json!("I would rather not answer in JSON.")
        );
    }

    #[tokio::test]
    async fn test_brain_transport_error_is_recorded_and_skipped() {
        let brain = ScriptedBrain::new(vec![
            Err(BrainError::Transport("connection reset".to_string())),
            Ok(r#"{"complete": true}"#),
        ]);
        let mission = mission(brain, 5);

        let outcome = mission.run("anything").await;

        assert_eq!(outcome.status, MissionStatus::Completed);
        assert_eq!(outcome.steps, 2);
        let events = mission.recorder().events();
        assert_eq!(events[0].kind, EventKind::Error);
        assert_eq!(events[0].tool_name, BRAIN_TOOL);
        assert!(events[0].output.as_str().unwrap().contains("connection reset"));
        assert_eq!(events[1].kind, EventKind::Thought);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_brain_hits_step_deadline() {
        let mission = mission(Arc::new(StalledBrain), 2);

        let outcome = mission.run("anything").await;

        assert_eq!(outcome.status, MissionStatus::TerminatedByStepLimit);
        let events = mission.recorder().events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == EventKind::Error));
        assert_eq!(events[0].output, json!("brain did not answer within 60s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tool_times_out() {
        let brain = ScriptedBrain::new(vec![Ok(r#"{"tool": "hang"}"#)]);
        let mission = mission(brain, 1);

        mission.run("wait forever").await;

        let events = mission.recorder().events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Error);
        assert_eq!(events[1].tool_name, "hang");
        assert_eq!(events[1].inputs, json!({}));
        assert_eq!(events[1].output, json!("timed out after 15s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_deadline_bounds_the_tool_call() {
        let brain = ScriptedBrain::new(vec![Ok(r#"{"tool": "hang"}"#)]);
        let mission = MissionLoop::new(Recorder::new("deadline"), brain, registry()).with_config(MissionConfig {
            max_steps: 1,
            tool_timeout_secs: 15,
            step_deadline_secs: 10,
            ..MissionConfig::default()
        });

        let started = tokio::time::Instant::now();
        mission.run("wait forever").await;

        assert!(started.elapsed() <= Duration::from_secs(10));
        let events = mission.recorder().events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Error);
        assert_eq!(events[1].output, json!("timed out after 10s"));
    }

    #[tokio::test]
    async fn test_panicking_async_tool_is_recorded_and_survived() {
        let brain = ScriptedBrain::new(vec![Ok(r#"{"tool": "crash"}"#), Ok(r#"{"complete": true}"#)]);
        let mission = mission(brain, 3);

        let outcome = mission.run("read the third quote").await;

        assert_eq!(outcome.status, MissionStatus::Completed);
        assert_eq!(outcome.final_root, mission.recorder().current_root());
        let events = mission.recorder().events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].kind, EventKind::Error);
        assert_eq!(events[1].tool_name, "crash");
        assert!(events[1].output.as_str().unwrap().starts_with("tool worker aborted"));
    }

    #[tokio::test]
    async fn test_invalid_params_are_rejected_before_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register(Tool::blocking(
            "transfer",
            "Send ETH",
            json!({
                "type": "object",
                "properties": { "amount": { "type": "number" } },
                "required": ["amount"]
            }),
            EventKind::Action,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("sent"))
            },
        ));
        let brain = ScriptedBrain::new(vec![Ok(r#"{"tool": "transfer", "params": {"amount": "lots"}}"#)]);
        let mission = MissionLoop::new(Recorder::new("params"), brain, registry).with_config(MissionConfig {
            max_steps: 1,
            ..MissionConfig::default()
        });

        mission.run("pay").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let events = mission.recorder().events();
        assert_eq!(events[1].kind, EventKind::Error);
        assert_eq!(events[1].tool_name, "transfer");
        assert!(events[1].output.as_str().unwrap().contains("amount"));
    }

    // ── Happy paths ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_observation_then_completion() {
        let brain = ScriptedBrain::new(vec![
            Ok("<think>check first</think>```json\n{\"tool\": \"get_balance\"}\n```"),
            Ok(r#"{"thought": "funded", "complete": true}"#),
        ]);
        let mission = mission(brain, 10);

        let outcome = mission.run("check funds").await;

        assert_eq!(outcome.status, MissionStatus::Completed);
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.event_count, 3);
        assert_eq!(outcome.final_root, mission.recorder().current_root());

        let events = mission.recorder().events();
        assert_eq!(events[1].kind, EventKind::Observation);
        assert_eq!(events[1].output, json!({ "balance_eth": 1.5 }));
        assert_eq!(events[1].basis_id, Some(events[0].id.clone()));
        assert_eq!(events[2].basis_id, Some(events[1].id.clone()));
    }

    #[tokio::test]
    async fn test_step_limit_still_yields_verifiable_session() {
        let brain = ScriptedBrain::new(vec![
            Ok(r#"{"tool": "get_balance"}"#),
            Ok(r#"{"tool": "explode"}"#),
        ]);
        let mission = mission(brain, 4);

        let outcome = mission.run("keep going").await;

        assert_eq!(outcome.status, MissionStatus::TerminatedByStepLimit);
        assert_eq!(outcome.steps, 4);
        let report = SessionVerifier::new().verify(&mission.recorder().export_session());
        assert!(report.valid, "details: {:#?}", report.details);
        assert_eq!(report.computed_root.as_deref(), Some(outcome.final_root.as_str()));
    }

    #[tokio::test]
    async fn test_attestor_receives_final_root() {
        let attestor = Arc::new(RecordingAttestor::default());
        let brain = ScriptedBrain::new(vec![Ok(r#"{"tool": "get_balance"}"#), Ok(r#"{"done": true}"#)]);
        let mission = mission(brain, 5).with_attestor(attestor.clone());

        let outcome = mission.run("attest me").await;

        assert_eq!(outcome.receipt, Some(Receipt("0xreceipt".to_string())));
        let seen = attestor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, outcome.final_root);
        assert_eq!(seen[0].1["status"], json!("completed"));
        assert_eq!(seen[0].1["eventCount"], json!(3));
        // Attestation itself is never recorded.
        assert_eq!(mission.recorder().event_count(), 3);
    }
}
