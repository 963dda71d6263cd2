//! The sandbox bridge: a persistent interpreter subprocess and the
//! JSON-RPC plumbing that drives it.
//!
//! One dedicated task reads frames from the child's stdout. Response frames
//! resolve entries in the in-flight table; request frames (primitive
//! callbacks) each get their own task so a slow primitive cannot starve
//! other callbacks or response delivery. Writes to the child's stdin are
//! serialized behind a single mutex so lines never interleave.
//!
//! # Lifecycle
//!
//! Starting -> (child spawned) -> Running -> (shutdown sent) -> Draining ->
//! (child exited) -> Terminated. A fatal I/O error at any point jumps to
//! Terminated and fails every in-flight caller.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::rpc::{
    self, CallbackParams, Frame, Request, Response, RpcError, CODE_HANDLER_ERROR,
    CODE_UNKNOWN_METHOD,
};

/// The interpreter-side shim staged into a temp directory at startup.
const SHIM_SOURCE: &str = include_str!("shim.py");

/// Error returned by a primitive handler; relayed to the child as a
/// JSON-RPC error on that single callback.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct PrimitiveError(String);

impl PrimitiveError {
    /// Wrap a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Wrap any error by its display form.
    #[must_use]
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self(err.to_string())
    }
}

/// A host-provided operation callable from a script. Handlers run on the
/// blocking pool and must be stateless with respect to which `run` invoked
/// them - under pipelining there is no temporal relationship between a
/// callback and a given outer `run`.
pub type PrimitiveHandler = Arc<
    dyn Fn(&[Value], &serde_json::Map<String, Value>) -> Result<Value, PrimitiveError>
        + Send
        + Sync,
>;

/// Error raised by bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The shim could not be staged into its temp directory.
    #[error("staging interpreter shim: {0}")]
    Stage(#[source] std::io::Error),

    /// The interpreter process could not be spawned.
    #[error("starting interpreter: {0}")]
    Spawn(#[source] std::io::Error),

    /// Writing a frame to the child failed.
    #[error("writing to interpreter: {0}")]
    Io(#[source] std::io::Error),

    /// The script raised, or the interpreter rejected it.
    #[error("{0}")]
    Script(String),

    /// The `run` deadline expired. The child is not unwound; its eventual
    /// response, if any, is discarded.
    #[error("script execution timed out after {0:?}")]
    Timeout(Duration),

    /// The child process exited with calls still in flight.
    #[error("bridge process exited unexpectedly")]
    ChildExited,

    /// The bridge has been shut down.
    #[error("bridge is shut down")]
    Terminated,
}

/// Bridge construction knobs.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Per-`run` deadline.
    pub run_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Starting,
    Running,
    Draining,
    Terminated,
}

enum Reply {
    Result(Value),
    Error(RpcError),
}

struct Inner {
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    handlers: RwLock<HashMap<String, PrimitiveHandler>>,
    next_id: AtomicU64,
    state: Mutex<State>,
    run_timeout: Duration,
    // Keeps the staged shim alive until the last task drops its handle.
    _stage_dir: tempfile::TempDir,
}

impl Inner {
    fn state(&self) -> State {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: State) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    async fn send<T: serde::Serialize>(&self, message: &T) -> Result<(), BridgeError> {
        let mut line = serde_json::to_string(message).map_err(|e| {
            BridgeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(BridgeError::Io)?;
        stdin.flush().await.map_err(BridgeError::Io)
    }

    /// Fail every in-flight caller by dropping its sender.
    fn drain_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Host-side handle to the sandbox interpreter subprocess.
pub struct Bridge {
    inner: Arc<Inner>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl Bridge {
    /// Stage the interpreter shim and spawn the sandbox subprocess.
    ///
    /// # Errors
    ///
    /// Returns an error if the shim cannot be written or the interpreter
    /// cannot be started.
    pub fn spawn(config: BridgeConfig) -> Result<Self, BridgeError> {
        let stage_dir = tempfile::Builder::new()
            .prefix("tally-bridge-")
            .tempdir()
            .map_err(BridgeError::Stage)?;
        let shim_path: PathBuf = stage_dir.path().join("shim.py");
        std::fs::write(&shim_path, SHIM_SOURCE).map_err(BridgeError::Stage)?;

        let mut child = Command::new("uv")
            .args(["run", "--with", "pydantic-monty", "--no-project", "python3"])
            .arg(&shim_path)
            .current_dir(stage_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(BridgeError::Spawn)?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(BridgeError::Spawn(std::io::Error::other(
                    "interpreter pipes unavailable",
                )));
            }
        };

        let inner = Arc::new(Inner {
            stdin: tokio::sync::Mutex::new(stdin),
            pending: Mutex::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            state: Mutex::new(State::Starting),
            run_timeout: config.run_timeout,
            _stage_dir: stage_dir,
        });

        tokio::spawn(read_loop(Arc::clone(&inner), stdout));
        inner.set_state(State::Running);
        debug!("bridge started");

        Ok(Self {
            inner,
            child: tokio::sync::Mutex::new(Some(child)),
        })
    }

    /// Register a handler for a named primitive. Registration before the
    /// first `run` keeps the whitelist deterministic.
    pub fn register_primitive(&self, name: impl Into<String>, handler: PrimitiveHandler) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), handler);
    }

    /// Names of all registered primitives, sorted for a stable whitelist.
    #[must_use]
    pub fn primitive_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Execute a script in the sandbox and return its final value. The
    /// `externals` list caps which primitives the script may call back
    /// into. Concurrent calls are multiplexed by id; there is no ordering
    /// between them.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Script`] if the script raises,
    /// [`BridgeError::Timeout`] after the configured deadline (the child
    /// is left running), [`BridgeError::ChildExited`] if the interpreter
    /// dies mid-call, [`BridgeError::Terminated`] after shutdown.
    pub async fn run_script(&self, script: &str, externals: &[String]) -> Result<Value, BridgeError> {
        if self.inner.state() != State::Running {
            return Err(BridgeError::Terminated);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        let request = Request::new(
            "run",
            serde_json::json!({
                "script": script,
                "external_functions": externals,
            }),
            id,
        );
        if let Err(err) = self.inner.send(&request).await {
            self.remove_pending(id);
            return Err(err);
        }

        // The reader may have torn down between the state check and the
        // send; a drained table would leave this entry dangling forever.
        if self.inner.state() == State::Terminated {
            self.remove_pending(id);
            return Err(BridgeError::ChildExited);
        }

        match tokio::time::timeout(self.inner.run_timeout, rx).await {
            Ok(Ok(Reply::Result(value))) => Ok(value),
            Ok(Ok(Reply::Error(err))) => Err(BridgeError::Script(err.message)),
            Ok(Err(_closed)) => Err(BridgeError::ChildExited),
            Err(_elapsed) => {
                self.remove_pending(id);
                Err(BridgeError::Timeout(self.inner.run_timeout))
            }
        }
    }

    /// Send the shutdown notification and wait for the child to exit.
    /// Idempotent; operations after shutdown fail with
    /// [`BridgeError::Terminated`].
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on the child fails.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        {
            let state = self.inner.state();
            if state == State::Draining || state == State::Terminated {
                return Ok(());
            }
            self.inner.set_state(State::Draining);
        }

        // Best effort: the child may already be gone.
        let _ = self.inner.send(&Request::notification("shutdown")).await;

        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            child.wait().await.map_err(BridgeError::Io)?;
        }

        self.inner.set_state(State::Terminated);
        self.inner.drain_pending();
        debug!("bridge terminated");
        Ok(())
    }

    fn remove_pending(&self, id: u64) {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.inner.state())
            .finish_non_exhaustive()
    }
}

/// Read frames from the child until EOF or a fatal error, then fail every
/// in-flight caller.
async fn read_loop(inner: Arc<Inner>, stdout: ChildStdout) {
    // Lines may be arbitrarily long; the buffer grows as needed.
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "bridge read failed");
                break;
            }
        };

        let frame: Frame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "discarding unparseable frame");
                continue;
            }
        };

        if frame.is_response() {
            deliver_response(&inner, frame);
        } else if frame.method.is_some() {
            tokio::spawn(handle_callback(Arc::clone(&inner), frame));
        }
    }

    inner.set_state(State::Terminated);
    inner.drain_pending();
}

fn deliver_response(inner: &Inner, frame: Frame) {
    let Some(id) = frame.id.as_ref().and_then(rpc::id_as_u64) else {
        warn!("response frame without a usable id");
        return;
    };

    let sender = inner
        .pending
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&id);
    let Some(sender) = sender else {
        // Deadline already expired for this caller; discard.
        debug!(id, "discarding response with no waiter");
        return;
    };

    let reply = match frame.error {
        Some(err) => Reply::Error(err),
        None => Reply::Result(frame.result.unwrap_or(Value::Null)),
    };
    let _ = sender.send(reply);
}

/// Run one primitive callback and reply to the child. Spawned per frame so
/// a slow handler never blocks the read loop.
async fn handle_callback(inner: Arc<Inner>, frame: Frame) {
    let method = frame.method.unwrap_or_default();
    let id = frame.id.unwrap_or(Value::Null);

    let params: CallbackParams = frame
        .params
        .and_then(|p| serde_json::from_value(p).ok())
        .unwrap_or_default();

    let handler = inner
        .handlers
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&method)
        .cloned();

    let response = match handler {
        None => Response::error(
            id,
            CODE_UNKNOWN_METHOD,
            format!("unknown primitive: {method}"),
        ),
        Some(handler) => {
            let outcome = tokio::task::spawn_blocking(move || {
                handler(&params.args, &params.kwargs)
            })
            .await;
            match outcome {
                Ok(Ok(value)) => Response::result(id, value),
                Ok(Err(err)) => Response::error(id, CODE_HANDLER_ERROR, err.to_string()),
                Err(join_err) => Response::error(
                    id,
                    CODE_HANDLER_ERROR,
                    format!("primitive {method} panicked: {join_err}"),
                ),
            }
        }
    };

    if let Err(err) = inner.send(&response).await {
        warn!(%err, "failed to deliver callback response");
    }
}
