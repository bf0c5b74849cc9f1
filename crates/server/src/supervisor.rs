use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use storyloom_core::{WorkerEntry, WorkerRegistry, WorkerSpec, WorkerState};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Owns the set of locally-managed worker processes: starts them if their
/// port is closed, polls for readiness, and tears them down at shutdown.
///
/// A worker that exits silently after reaching `Ready` is not restarted
/// here; the next `ensure_started` for it will spawn a fresh process. There
/// is deliberately no watchdog.
pub struct WorkerSupervisor {
    registry: Arc<WorkerRegistry>,
    config: SupervisorConfig,
    children: Mutex<HashMap<String, Child>>,
}

impl WorkerSupervisor {
    pub fn new(registry: Arc<WorkerRegistry>, config: SupervisorConfig) -> Self {
        Self {
            registry,
            config,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Make sure one worker is reachable, spawning it if necessary.
    ///
    /// An already-open port means the worker is externally managed: it is
    /// marked `Ready` without spawning a duplicate. A startup failure is
    /// logged and recorded as `Failed`, never propagated as a host error;
    /// the worker simply stays unavailable until a later retry.
    ///
    /// Cancellation-safe: a process spawned by this call is killed when the
    /// call's future is dropped before the worker became ready.
    pub async fn ensure_started(&self, spec: &WorkerSpec) -> WorkerState {
        if is_port_open(spec.port).await {
            info!(worker = %spec.id, port = spec.port, "Worker already running");
            self.registry.register(WorkerEntry {
                id: spec.id.clone(),
                port: spec.port,
                pid: None,
                state: WorkerState::Ready,
            });
            return WorkerState::Ready;
        }

        info!(worker = %spec.id, command = %spec.command, "Launching worker");
        self.registry.register(WorkerEntry {
            id: spec.id.clone(),
            port: spec.port,
            pid: None,
            state: WorkerState::Starting,
        });

        // kill_on_drop reaps the child if this future is cancelled before
        // the handle is moved into the tracked set.
        let spawned = Command::new(&spec.command)
            .args(&spec.args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!(worker = %spec.id, error = %e, "Failed to spawn worker process");
                self.registry.set_state(&spec.id, WorkerState::Failed);
                return WorkerState::Failed;
            }
        };
        self.registry.set_pid(&spec.id, child.id());

        let ready = wait_until_ready(
            spec.port,
            self.config.startup_timeout(),
            self.config.poll_interval(),
        )
        .await;

        if !ready {
            error!(worker = %spec.id, port = spec.port, "Worker did not become ready in time");
            self.registry.set_state(&spec.id, WorkerState::Failed);
            // Dropping the handle kills the stalled process.
            drop(child);
            return WorkerState::Failed;
        }

        info!(worker = %spec.id, port = spec.port, "Worker ready");
        self.registry.set_state(&spec.id, WorkerState::Ready);
        self.children.lock().await.insert(spec.id.clone(), child);
        WorkerState::Ready
    }

    /// Terminate every tracked process concurrently: graceful terminate
    /// first, then a forced kill for anything still alive after the grace
    /// period.
    pub async fn shutdown_all(&self) {
        let children: Vec<(String, Child)> = self.children.lock().await.drain().collect();
        if children.is_empty() {
            return;
        }

        info!(count = children.len(), "Shutting down workers");
        let grace = self.config.grace_period();
        let shutdowns = children.into_iter().map(|(id, mut child)| {
            let registry = Arc::clone(&self.registry);
            async move {
                terminate_gracefully(&mut child);
                match tokio::time::timeout(grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        debug!(worker = %id, %status, "Worker terminated");
                    }
                    Ok(Err(e)) => {
                        warn!(worker = %id, error = %e, "Error waiting for worker exit");
                    }
                    Err(_) => {
                        warn!(worker = %id, "Worker ignored terminate, killing");
                        if let Err(e) = child.kill().await {
                            warn!(worker = %id, error = %e, "Failed to kill worker");
                        }
                    }
                }
                registry.set_state(&id, WorkerState::Terminated);
            }
        });
        futures::future::join_all(shutdowns).await;
    }
}

/// Probe whether anything is accepting connections on a localhost port.
pub async fn is_port_open(port: u16) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}

/// Poll a port until it opens or the deadline passes. Bounded by
/// construction: the deadline is explicit, and each probe itself times out.
pub async fn wait_until_ready(port: u16, timeout: Duration, poll_interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;
    loop {
        if is_port_open(port).await {
            debug!(port, attempt, "Port is open");
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        attempt += 1;
        debug!(port, attempt, "Waiting for worker port");
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(unix)]
fn terminate_gracefully(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SIGTERM first; escalation to SIGKILL happens after the grace
        // period in shutdown_all.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(child: &mut Child) {
    let _ = child.start_kill();
}
