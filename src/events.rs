use crate::config::ProfileConfig;
use crate::stats::Snapshot;
use crate::types::{NodeId, NodeType, ScanNode};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Notifications published by the engine for GUIs, loggers and other observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    NodeAdded {
        node: ScanNode,
    },
    NodeDiscovered {
        node: ScanNode,
    },
    ModuleRegistered {
        name: String,
    },
    TaskStarted {
        node_id: NodeId,
        node_type: NodeType,
        data: String,
        module: String,
    },
    TaskCompleted {
        node_id: NodeId,
        module: String,
        spawned: usize,
        simulated: bool,
    },
    TaskFailed {
        node_id: NodeId,
        module: String,
        error: String,
    },
    ProgressUpdate {
        snapshot: Snapshot,
    },
    ScanStarted {
        pending: usize,
        max_depth: u32,
        max_concurrent_tasks: usize,
    },
    ScanCompleted {
        snapshot: Snapshot,
    },
    EngineStopped {
        pending: usize,
    },
    ProfileChanged {
        name: String,
        profile: ProfileConfig,
    },
    ConfigReloaded {
        active_profile: String,
    },
    ResultsExported {
        path: PathBuf,
        nodes: usize,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::NodeAdded { .. } => "node_added",
            EngineEvent::NodeDiscovered { .. } => "node_discovered",
            EngineEvent::ModuleRegistered { .. } => "module_registered",
            EngineEvent::TaskStarted { .. } => "task_started",
            EngineEvent::TaskCompleted { .. } => "task_completed",
            EngineEvent::TaskFailed { .. } => "task_failed",
            EngineEvent::ProgressUpdate { .. } => "progress_update",
            EngineEvent::ScanStarted { .. } => "scan_started",
            EngineEvent::ScanCompleted { .. } => "scan_completed",
            EngineEvent::EngineStopped { .. } => "engine_stopped",
            EngineEvent::ProfileChanged { .. } => "profile_changed",
            EngineEvent::ConfigReloaded { .. } => "config_reloaded",
            EngineEvent::ResultsExported { .. } => "results_exported",
        }
    }
}

pub type EventReceiver = mpsc::Receiver<EngineEvent>;

/// Publishing half of the bounded observer channel. Emission never waits: when the
/// buffer is full or the consumer is gone the event is dropped.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<EngineEvent>,
    dropped: Arc<AtomicU64>,
}

pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

impl EventSender {
    pub fn emit(&self, event: EngineEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Event buffer full, dropped {}", event.kind());
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("No observer attached, dropped {}", event.kind());
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drain `rx` into a single callback on a background task. A panicking callback is
/// logged and the sink keeps delivering. Resolves to the number of events handled once
/// every sender is gone.
pub fn spawn_callback_sink<F>(mut rx: EventReceiver, mut callback: F) -> JoinHandle<usize>
where
    F: FnMut(&EngineEvent) + Send + 'static,
{
    tokio::spawn(async move {
        let mut delivered = 0;
        while let Some(event) = rx.recv().await {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!("Observer callback panicked while handling {}", event.kind()),
            }
        }
        delivered
    })
}
