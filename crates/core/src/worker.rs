use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Lifecycle of a locally-managed worker process.
///
/// `NotStarted -> Starting` when the process is spawned, `Starting -> Ready`
/// when its port opens, `Starting -> Failed` on timeout or early exit, and
/// `Ready -> Terminated` at shutdown. A worker that exits after reaching
/// `Ready` is not auto-restarted; a later `ensure_started` may retry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    NotStarted,
    Starting,
    Ready,
    Failed,
    Terminated,
}

/// How to reach (and if necessary launch) one model worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Model id, e.g. "meta-llama/Llama-3.2-1B-Instruct".
    pub id: String,
    /// Port the worker's generate endpoint listens on.
    pub port: u16,
    /// Command used to launch the worker when its port is closed.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Registry entry for one worker: model id maps to port, pid, and state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEntry {
    pub id: String,
    pub port: u16,
    /// Pid of the process we spawned; absent for externally managed workers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub state: WorkerState,
}

/// Set of known workers behind a single lock, shared by the supervisor and
/// request routing. Entries are added on launch or dynamic load, looked up
/// by model id, and removed (or marked terminated) on unload.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    inner: Mutex<HashMap<String, WorkerEntry>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entry: WorkerEntry) {
        self.lock().insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<WorkerEntry> {
        self.lock().get(id).cloned()
    }

    pub fn set_state(&self, id: &str, state: WorkerState) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.state = state;
        }
    }

    pub fn set_pid(&self, id: &str, pid: Option<u32>) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.pid = pid;
        }
    }

    pub fn remove(&self, id: &str) -> Option<WorkerEntry> {
        self.lock().remove(id)
    }

    pub fn all(&self) -> Vec<WorkerEntry> {
        let mut entries: Vec<_> = self.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, WorkerEntry>> {
        // A poisoned lock only means another thread panicked mid-update;
        // the map itself is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
