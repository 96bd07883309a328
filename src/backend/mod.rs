//! Message boundary to the remote execution backend.
//!
//! Outbound messages are queued on a bounded channel and delivered by a
//! background pump task; [`BackendChannel::send`] never waits for the backend.
//! Inbound messages are parsed by [`BackendChannel::ingest`], which updates the
//! mirrored [`BackendGlobalState`] and republishes the event to subscribers.

pub mod transport;

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{SequencerError, SequencerResult};
use crate::sequence::{ElementStatus, TestRootNode};

pub use transport::{BackendTransport, HttpTransport};

/// Capacity of the inbound event broadcast.
const EVENT_CAPACITY: usize = 256;

/// Coarse execution phase of the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendGlobalState {
    TestSetStart,
    Running,
    #[default]
    TestSetDone,
    TestSetExport,
    TestExported,
    Error,
}

impl BackendGlobalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendGlobalState::TestSetStart => "test_set_start",
            BackendGlobalState::Running => "running",
            BackendGlobalState::TestSetDone => "test_set_done",
            BackendGlobalState::TestSetExport => "test_set_export",
            BackendGlobalState::TestExported => "test_exported",
            BackendGlobalState::Error => "error",
        }
    }

    /// Whether the backend is busy with a test set.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            BackendGlobalState::TestSetStart
                | BackendGlobalState::Running
                | BackendGlobalState::TestSetExport
        )
    }
}

impl fmt::Display for BackendGlobalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Messages sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BackendMessage {
    /// Execute the given tree.
    TestSequenceRun { data: TestRootNode },
    /// Abort the running test set.
    TestSequenceStop,
    /// Upload the results of the given tree to a cloud project.
    #[serde(rename_all = "camelCase")]
    TestSequenceExportCloud {
        data: TestRootNode,
        serial_number: String,
        project_id: String,
    },
}

impl BackendMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendMessage::TestSequenceRun { .. } => "test_sequence_run",
            BackendMessage::TestSequenceStop => "test_sequence_stop",
            BackendMessage::TestSequenceExportCloud { .. } => "test_sequence_export_cloud",
        }
    }
}

/// A state update received from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendEvent {
    /// Phase this particular message reports.
    #[serde(default)]
    pub state: Option<BackendGlobalState>,
    /// New coarse phase; falls back to `state` when absent.
    #[serde(default)]
    pub global_state: Option<BackendGlobalState>,
    /// Element the status refers to.
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub status: Option<ElementStatus>,
    /// Seconds the element took.
    #[serde(default)]
    pub time_taken: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendEvent {
    /// The phase this event moves the backend to, if any.
    pub fn phase(&self) -> Option<BackendGlobalState> {
        self.global_state.or(self.state)
    }
}

/// Handle to the backend: bounded outbound queue plus inbound state mirror.
#[derive(Debug)]
pub struct BackendChannel {
    outbound: mpsc::Sender<BackendMessage>,
    global_state: watch::Sender<BackendGlobalState>,
    events: broadcast::Sender<BackendEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl BackendChannel {
    /// Start the outbound pump on the current tokio runtime.
    pub fn spawn(transport: Arc<dyn BackendTransport>, capacity: usize) -> Self {
        let (outbound, mut receiver) = mpsc::channel::<BackendMessage>(capacity.max(1));
        let (global_state, _) = watch::channel(BackendGlobalState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let kind = message.kind();
                match transport.deliver(&message).await {
                    Ok(()) => debug!(kind, "delivered backend message"),
                    Err(err) => warn!(kind, error = %err, "failed to deliver backend message"),
                }
            }
            debug!("backend pump stopped");
        });

        Self {
            outbound,
            global_state,
            events,
            pump: Mutex::new(Some(handle)),
        }
    }

    /// Queue a message without waiting. Fails when the queue is full or the
    /// pump has stopped.
    pub fn send(&self, message: BackendMessage) -> SequencerResult<()> {
        let kind = message.kind();
        self.outbound.try_send(message).map_err(|err| {
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "outbound queue is full",
                mpsc::error::TrySendError::Closed(_) => "backend channel is closed",
            };
            warn!(kind, reason, "backend message dropped");
            SequencerError::Transport(format!("{kind} not sent: {reason}"))
        })?;
        debug!(kind, "queued backend message");
        Ok(())
    }

    /// Parse an inbound JSON message and apply it.
    pub fn ingest(&self, raw: &str) -> SequencerResult<BackendEvent> {
        let event: BackendEvent = serde_json::from_str(raw)?;
        self.apply(event.clone());
        Ok(event)
    }

    /// Apply an inbound event: update the global state and notify subscribers.
    pub fn apply(&self, event: BackendEvent) {
        if let Some(phase) = event.phase() {
            let changed = self.global_state.send_if_modified(|current| {
                let changed = *current != phase;
                *current = phase;
                changed
            });
            if changed {
                info!(state = %phase, "backend state changed");
            }
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Latest backend phase.
    pub fn global_state(&self) -> BackendGlobalState {
        *self.global_state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BackendGlobalState> {
        self.global_state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }

    /// Stop accepting messages and wait until queued ones are delivered.
    pub async fn shutdown(self) {
        let handle = match self.pump.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(self.outbound);
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "backend pump ended abnormally");
            }
        }
    }
}
