//! Process supervisor: spawn and tear down tool-host processes.
//!
//! Every [`ToolHost`] is one child process plus the [`Session`] over its
//! stdin/stdout. The child's stderr goes to the endpoint's log file (or is
//! discarded), never to the protocol stream. Hosts are killed when dropped, so
//! an early return or a cancelled future cannot leave an orphan behind.

use crate::config::ServerEndpoint;
use crate::error::McpError;
use crate::session::Session;
use std::fs::OpenOptions;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::process::{Child, Command};

/// How long a host gets to exit on its own after stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Decrements the supervisor's live count when a host goes away.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A running tool-host process with its session.
pub struct ToolHost {
    child: Child,
    session: Session,
    _live: LiveGuard,
}

impl ToolHost {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the process without waiting for it.
    ///
    /// The session notices the closed stdout and fails all pending calls.
    pub fn kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

/// Owns the lifetime of tool-host processes for one endpoint.
pub struct ProcessSupervisor {
    endpoint: ServerEndpoint,
    live: Arc<AtomicUsize>,
}

impl ProcessSupervisor {
    pub fn new(endpoint: ServerEndpoint) -> Self {
        Self {
            endpoint,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// Number of hosts spawned by this supervisor that have not been dropped.
    pub fn live_processes(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Spawn a fresh host and start an (uninitialized) session on it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn acquire(&self) -> Result<ToolHost, McpError> {
        let name = self.endpoint.command.clone();

        let stderr = match &self.endpoint.stderr_log {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| McpError::SpawnFailed {
                        name: format!("{name} (stderr log {})", path.display()),
                        source: e,
                    })?;
                Stdio::from(file)
            }
            None => Stdio::null(),
        };

        let mut cmd = Command::new(&self.endpoint.command);
        cmd.args(&self.endpoint.args)
            .envs(&self.endpoint.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: name.clone(),
            source: e,
        })?;
        self.live.fetch_add(1, Ordering::SeqCst);
        let live = LiveGuard(Arc::clone(&self.live));

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(McpError::SpawnFailed {
                name,
                source: std::io::Error::other("stdio was not piped"),
            });
        };

        let label = match child.id() {
            Some(pid) => format!("{name}[{pid}]"),
            None => name,
        };
        tracing::debug!("Spawned tool host {label}");

        Ok(ToolHost {
            session: Session::start(label, stdout, stdin),
            child,
            _live: live,
        })
    }

    /// Close the session and reap the process, killing it if it lingers.
    pub async fn release(&self, mut host: ToolHost) {
        host.session.close().await;

        match tokio::time::timeout(SHUTDOWN_GRACE, host.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("Tool host {} exited with {status}", host.session.label())
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to wait on tool host {}: {e}", host.session.label())
            }
            Err(_) => {
                tracing::warn!(
                    "Tool host {} ignored stdin EOF for {}s, killing",
                    host.session.label(),
                    SHUTDOWN_GRACE.as_secs()
                );
                let _ = host.child.kill().await;
            }
        }
    }

    /// Run one full acquire → handshake → `op` → release cycle.
    ///
    /// The endpoint's timeout bounds the handshake and `op` together. The host
    /// is released on every path, including errors and timeouts.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, McpError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, McpError>>,
    {
        let host = self.acquire()?;
        let session = host.session().clone();

        let outcome = tokio::time::timeout(self.endpoint.timeout(), async move {
            session.initialize().await?;
            op(session).await
        })
        .await;

        self.release(host).await;

        outcome.unwrap_or(Err(McpError::Timeout {
            timeout_ms: self.endpoint.timeout_ms,
        }))
    }
}
