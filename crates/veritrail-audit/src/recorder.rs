//! The single-writer event recorder.
//!
//! `Recorder` owns the `EventStore` and the `HashTree` of one session.  Every
//! append goes through [`Recorder::record`], which holds one `Mutex` while it
//! resolves the basis, hashes the canonical leaf, stores the event, and
//! advances `last_event_id`.  Tool calls themselves run outside the lock and
//! may overlap; whichever completes first is appended first, and that order
//! is final.
//!
//! Subscribers are notified after the lock is released: synchronous
//! listeners behind a panic guard, and a `broadcast` feed whose sends never
//! block.

use std::{
    fmt::Display,
    future::Future,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use veritrail_contracts::{
    canonical::{event_to_leaf, to_recorded_value},
    error::{VeritrailError, VeritrailResult},
    event::{Event, EventId, EventKind},
    session::{SessionExport, EMPTY_ROOT},
};
use veritrail_core::{EventListener, RecordedEvent, Tool, ToolResult};
use veritrail_merkle::{HashTree, ProofStep};

use crate::store::EventStore;

/// Capacity of the live feed; slow subscribers past this lag and skip.
const FEED_CAPACITY: usize = 256;

/// Which earlier event a new event is based on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Basis {
    /// Whatever was recorded last in this session (nothing, if empty).
    #[default]
    Last,
    /// A specific, already-recorded event.
    Explicit(EventId),
    /// No basis.
    Unlinked,
}

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct RecorderState {
    pub(crate) store: EventStore,
    pub(crate) tree: HashTree,
    pub(crate) last_event_id: Option<EventId>,
}

// ── Public recorder ───────────────────────────────────────────────────────────

/// Records tool invocations into an append-only, hash-tree-backed session.
///
/// Cloning is cheap and every clone writes to the same session.
#[derive(Clone)]
pub struct Recorder {
    session_id: String,
    pub(crate) state: Arc<Mutex<RecorderState>>,
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
    feed: broadcast::Sender<RecordedEvent>,
}

impl Recorder {
    pub fn new(session_id: impl Into<String>) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            session_id: session_id.into(),
            state: Arc::new(Mutex::new(RecorderState {
                store: EventStore::new(),
                tree: HashTree::new(),
                last_event_id: None,
            })),
            listeners: Arc::new(RwLock::new(Vec::new())),
            feed,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Register a synchronous listener for every subsequent event.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Subscribe to the live feed of recorded events.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordedEvent> {
        self.feed.subscribe()
    }

    /// Append one event.
    ///
    /// `basis_id` is taken as given: `None` records an unlinked event.  An
    /// explicit basis that is not already in the session is rejected with
    /// `UnknownBasis` and nothing is appended.
    pub fn record(
        &self,
        tool_name: impl Into<String>,
        kind: EventKind,
        inputs: Value,
        output: Value,
        basis_id: Option<EventId>,
    ) -> VeritrailResult<Event> {
        let basis = match basis_id {
            Some(id) => Basis::Explicit(id),
            None => Basis::Unlinked,
        };
        self.record_with(tool_name, kind, inputs, output, basis)
    }

    /// Append one event, resolving `basis` inside the critical section.
    pub fn record_with(
        &self,
        tool_name: impl Into<String>,
        kind: EventKind,
        inputs: Value,
        output: Value,
        basis: Basis,
    ) -> VeritrailResult<Event> {
        self.append(tool_name.into(), kind, inputs, output, basis, Utc::now())
    }

    /// The single write path; `started` becomes the event's timestamp.
    fn append(
        &self,
        tool_name: String,
        kind: EventKind,
        inputs: Value,
        output: Value,
        basis: Basis,
        started: DateTime<Utc>,
    ) -> VeritrailResult<Event> {
        let recorded = {
            let mut state = self.lock_for_write()?;
            let basis_id = match basis {
                Basis::Last => state.last_event_id.clone(),
                Basis::Explicit(id) => Some(id),
                Basis::Unlinked => None,
            };

            let mut event = Event::new(tool_name, kind, inputs, output, basis_id).at(started);
            state.store.check_appendable(&event)?;

            let leaf = event_to_leaf(&event);
            let digest = state.tree.add_leaf(&leaf);
            event.leaf_hash = Some(hex::encode(digest));

            let index = state.store.append(event.clone())?;
            state.last_event_id = Some(event.id.clone());
            let root = state.tree.root_hex().unwrap_or_else(|| EMPTY_ROOT.to_string());

            debug!(
                session_id = %self.session_id,
                index,
                event_id = %event.id,
                kind = %event.kind,
                tool = %event.tool_name,
                root = %root,
                "event recorded"
            );

            RecordedEvent { index, event, root }
        };

        self.notify(&recorded);
        Ok(recorded.event)
    }

    /// Return a callable that audits every invocation of `tool` as `kind`.
    pub fn wrap(&self, tool: Arc<Tool>, kind: EventKind) -> AuditedTool {
        AuditedTool {
            recorder: self.clone(),
            tool,
            kind,
        }
    }

    /// Run `f(args)` and record it, for callers that hold typed values rather
    /// than a registered [`Tool`].
    ///
    /// `args` and the success value are captured through
    /// [`to_recorded_value`], so a value serde cannot represent is stored as
    /// the placeholder string.  On `Err` an `ERROR` event with the error's
    /// message is recorded and the error is returned unchanged.
    pub async fn execute<A, R, E, F, Fut>(
        &self,
        tool_name: &str,
        kind: EventKind,
        args: A,
        basis: Basis,
        f: F,
    ) -> Result<R, E>
    where
        A: Serialize,
        R: Serialize,
        E: Display,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let inputs = to_recorded_value(&args);
        let basis = self.resolve(basis);
        let started = Utc::now();
        let result = f(args).await;
        let (kind, output) = match &result {
            Ok(value) => (kind, to_recorded_value(value)),
            Err(e) => (EventKind::Error, Value::String(e.to_string())),
        };
        self.record_best_effort(tool_name, kind, inputs, output, basis, started);
        result
    }

    /// The id of the most recently recorded event.
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_for_read().last_event_id.clone()
    }

    /// Current root as lowercase hex, or [`EMPTY_ROOT`] when nothing is recorded.
    pub fn current_root(&self) -> String {
        self.lock_for_read()
            .tree
            .root_hex()
            .unwrap_or_else(|| EMPTY_ROOT.to_string())
    }

    pub fn event_count(&self) -> usize {
        self.lock_for_read().store.len()
    }

    /// Copies of every recorded event, in append order.
    pub fn events(&self) -> Vec<Event> {
        self.lock_for_read().store.as_slice().to_vec()
    }

    /// Copies of the latest `n` events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.lock_for_read().store.recent(n).to_vec()
    }

    /// Inclusion proof for the event at `index`, or `None` when out of range.
    pub fn proof(&self, index: usize) -> Option<Vec<ProofStep>> {
        let state = self.lock_for_read();
        (index < state.tree.len()).then(|| state.tree.proof(index))
    }

    /// Snapshot the session for export.
    pub fn export_session(&self) -> SessionExport {
        let state = self.lock_for_read();
        let export = SessionExport {
            session_id: self.session_id.clone(),
            session_root: state.tree.root_hex().unwrap_or_else(|| EMPTY_ROOT.to_string()),
            event_count: state.store.len(),
            events: state.store.as_slice().to_vec(),
            exported_at: Some(Utc::now()),
        };
        info!(
            session_id = %self.session_id,
            event_count = export.event_count,
            session_root = %export.session_root,
            "session exported"
        );
        export
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Turn a `Basis` into a concrete id using the current `last_event_id`.
    pub(crate) fn resolve(&self, basis: Basis) -> Basis {
        match basis {
            Basis::Last => match self.last_event_id() {
                Some(id) => Basis::Explicit(id),
                None => Basis::Unlinked,
            },
            other => other,
        }
    }

    /// Record a call that began at `started`, logging instead of returning a
    /// failure.
    pub(crate) fn record_best_effort(
        &self,
        tool_name: &str,
        kind: EventKind,
        inputs: Value,
        output: Value,
        basis: Basis,
        started: DateTime<Utc>,
    ) {
        if let Err(e) = self.append(tool_name.to_string(), kind, inputs, output, basis, started) {
            warn!(
                session_id = %self.session_id,
                tool = %tool_name,
                error = %e,
                "failed to record tool invocation"
            );
        }
    }

    fn lock_for_write(&self) -> VeritrailResult<MutexGuard<'_, RecorderState>> {
        self.state.lock().map_err(|e| VeritrailError::AuditWriteFailed {
            reason: format!("recorder state lock poisoned: {}", e),
        })
    }

    /// Readers tolerate poisoning: the state is only mutated after every
    /// fallible check has passed, so a poisoned guard still holds a
    /// consistent store and tree.
    fn lock_for_read(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, recorded: &RecordedEvent) {
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(recorded))) {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => warn!(
                    session_id = %self.session_id,
                    event_id = %recorded.event.id,
                    %reason,
                    "event listener failed"
                ),
                Err(_) => warn!(
                    session_id = %self.session_id,
                    event_id = %recorded.event.id,
                    "event listener panicked"
                ),
            }
        }

        // No receivers is the normal case when nobody watches the feed.
        let _ = self.feed.send(recorded.clone());
    }
}

// ── Audited tool ──────────────────────────────────────────────────────────────

/// A [`Tool`] whose every invocation is recorded.
///
/// Returned by [`Recorder::wrap`].  `invoke` has the same signature as
/// `Tool::invoke` and returns the tool's result untouched; failures are
/// recorded as `ERROR` events before being handed back.
#[derive(Clone)]
pub struct AuditedTool {
    recorder: Recorder,
    tool: Arc<Tool>,
    kind: EventKind,
}

impl AuditedTool {
    pub fn name(&self) -> &str {
        self.tool.name()
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Invoke with the basis defaulting to the last recorded event.
    pub async fn invoke(&self, params: Value) -> ToolResult {
        self.invoke_with_basis(params, Basis::Last).await
    }

    /// Invoke with an explicit basis.
    ///
    /// `Basis::Last` is resolved when the call starts, not when it finishes,
    /// so an event recorded by a concurrent call in the meantime does not
    /// become this call's evidence.  The event's timestamp is also the start
    /// of the call; its position in the trail is where it completed.
    pub async fn invoke_with_basis(&self, params: Value, basis: Basis) -> ToolResult {
        let basis = self.recorder.resolve(basis);
        let started = Utc::now();
        let result = self.tool.invoke(params.clone()).await;

        match &result {
            Ok(output) => {
                self.recorder.record_best_effort(
                    self.name(),
                    self.kind,
                    params,
                    output.clone(),
                    basis,
                    started,
                );
            }
            Err(e) => {
                debug!(tool = %self.name(), error = %e, "tool call failed, recording error");
                self.recorder.record_best_effort(
                    self.name(),
                    EventKind::Error,
                    params,
                    Value::String(e.to_string()),
                    basis,
                    started,
                );
            }
        }

        result
    }
}
