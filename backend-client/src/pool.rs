use std::fmt;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use crate::PoolError;

/// Runs blocking remote calls on a dedicated runtime's blocking threads. At
/// most `size` calls run at once; the rest queue until a thread is free.
/// Submission never blocks.
pub struct CallPool {
    running: Mutex<Option<Running>>,
}

struct Running {
    runtime: Runtime,
    /// Every queued or running call holds a clone, so `drained` closes once
    /// the last one returns.
    in_flight: mpsc::Sender<()>,
    drained: mpsc::Receiver<()>,
}

impl fmt::Debug for CallPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallPool")
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl CallPool {
    pub fn new(size: usize) -> std::io::Result<Self> {
        // One worker drives the timer behind `PendingCall::get_timeout`.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size.max(1))
            .thread_name("remote-api-call")
            .enable_time()
            .build()?;
        let (in_flight, drained) = mpsc::channel(1);
        Ok(Self {
            running: Mutex::new(Some(Running {
                runtime,
                in_flight,
                drained,
            })),
        })
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submit<T, F>(&self, call: F) -> Result<PendingCall<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let running = self.running();
        let Some(Running {
            runtime, in_flight, ..
        }) = running.as_ref()
        else {
            return Err(PoolError::ShutDown);
        };
        let in_flight = in_flight.clone();
        let join = runtime.spawn_blocking(move || {
            let _in_flight = in_flight;
            call()
        });
        Ok(PendingCall {
            state: State::Running {
                runtime: runtime.handle().clone(),
                join,
            },
        })
    }

    /// Stops accepting work, lets queued calls drain and tears the runtime
    /// down. Calling it again is a no-op.
    pub fn shutdown(&self) {
        let Some(Running {
            runtime,
            in_flight,
            mut drained,
        }) = self.running().take()
        else {
            return;
        };
        drop(in_flight);
        if Handle::try_current().is_ok() {
            // Waiting here could mean waiting on ourselves.
            debug!("call pool shut down from inside a runtime; queued calls are dropped");
            runtime.shutdown_background();
            return;
        }
        // `None` once every call has returned.
        let _ = drained.blocking_recv();
        drop(runtime);
    }

    pub fn is_shut_down(&self) -> bool {
        self.running().is_none()
    }
}

impl Drop for CallPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to the eventual result of a call. The result is delivered once.
pub struct PendingCall<T> {
    state: State<T>,
}

enum State<T> {
    Ready(T),
    Running { runtime: Handle, join: JoinHandle<T> },
    Taken,
}

impl<T> fmt::Debug for PendingCall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Ready(_) => "ready",
            State::Running { join, .. } if join.is_finished() => "finished",
            State::Running { .. } => "running",
            State::Taken => "taken",
        };
        f.debug_struct("PendingCall").field("state", &state).finish()
    }
}

impl<T> PendingCall<T> {
    /// A handle whose result is already known.
    pub fn ready(value: T) -> Self {
        Self {
            state: State::Ready(value),
        }
    }

    /// Blocks until the call finishes.
    pub fn get(mut self) -> Result<T, PoolError> {
        self.wait(None)
    }

    /// Like [`PendingCall::get`] but gives up after `timeout`. The call keeps
    /// running and the handle can be waited on again.
    pub fn get_timeout(&mut self, timeout: Duration) -> Result<T, PoolError> {
        self.wait(Some(timeout))
    }

    fn wait(&mut self, timeout: Option<Duration>) -> Result<T, PoolError> {
        let (runtime, mut join) = match std::mem::replace(&mut self.state, State::Taken) {
            State::Ready(value) => return Ok(value),
            State::Running { runtime, join } => (runtime, join),
            State::Taken => return Err(PoolError::Disconnected),
        };
        let joined = match timeout {
            Some(timeout) if !join.is_finished() => {
                let waited =
                    runtime.block_on(async { tokio::time::timeout(timeout, &mut join).await });
                match waited {
                    Ok(joined) => joined,
                    Err(_) => {
                        self.state = State::Running { runtime, join };
                        return Err(PoolError::timeout(timeout));
                    }
                }
            }
            _ => runtime.block_on(&mut join),
        };
        joined.map_err(call_failed)
    }
}

fn call_failed(err: JoinError) -> PoolError {
    if err.is_panic() {
        warn!("remote call panicked: {err}");
        PoolError::Panicked
    } else {
        debug!("remote call was cancelled: {err}");
        PoolError::Disconnected
    }
}
