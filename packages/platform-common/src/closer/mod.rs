//! One-shot shutdown coordination.
//!
//! Subsystems register cleanup callbacks on a shared [`Closer`] while they
//! start up; the main task awaits [`Closer::wait`]. When shutdown is
//! triggered, by an OS signal or an explicit call, every registered callback
//! runs concurrently exactly once and only then are the waiters released.

pub mod signals;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

pub use signals::ShutdownSignal;

use crate::error::{BoxError, InfraError};

type Callback = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

#[derive(Default)]
struct Pending {
    callbacks: Vec<Callback>,
    closed: bool,
}

/// Runs registered cleanup callbacks once and lets any number of tasks wait for it.
///
/// Construct one per process and share it (`Arc<Closer>`) with every component
/// that owns something to release.
///
/// Known limitation: there is no per-callback timeout. A callback that never
/// completes keeps [`trigger_shutdown`](Self::trigger_shutdown) and every
/// [`wait`](Self::wait) pending forever.
pub struct Closer {
    pending: Mutex<Pending>,
    triggered: AtomicBool,
    done: Arc<watch::Sender<bool>>,
}

impl Closer {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            pending: Mutex::new(Pending::default()),
            triggered: AtomicBool::new(false),
            done: Arc::new(done),
        }
    }

    /// Create a closer that triggers itself when one of `signals` arrives.
    ///
    /// Spawns the listener on the current tokio runtime. An empty slice
    /// installs nothing.
    pub fn with_signals(signals: &[ShutdownSignal]) -> Result<Arc<Self>, InfraError> {
        let closer = Arc::new(Self::new());
        if signals.is_empty() {
            return Ok(closer);
        }

        let received = signals::listen(signals).map_err(InfraError::Signal)?;
        let listener = Arc::clone(&closer);
        tokio::spawn(async move {
            let signal = received.await;
            info!(signal = signal.name(), "received shutdown signal");
            listener.trigger_shutdown().await;
        });

        Ok(closer)
    }

    /// Add a cleanup callback.
    ///
    /// Callbacks run concurrently with each other in no particular order.
    /// Anything registered after shutdown was triggered is dropped unrun.
    pub fn register<F, Fut, E>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let callback: Callback =
            Box::new(move || f().map(|res| res.map_err(Into::<BoxError>::into)).boxed());

        let mut pending = self.pending.lock();
        if pending.closed {
            debug!("closer callback registered after shutdown; dropping it");
            return;
        }
        pending.callbacks.push(callback);
    }

    /// Block until shutdown has been triggered and every callback has finished.
    pub async fn wait(&self) {
        let mut rx = self.done.subscribe();
        // The sender lives as long as `self`, so this only returns once fired.
        let _ = rx.wait_for(|fired| *fired).await;
    }

    /// Run all registered callbacks once, then release the waiters.
    ///
    /// Only the first call does anything; concurrent and later calls return
    /// immediately. Callback errors and panics are logged, never returned.
    pub async fn trigger_shutdown(&self) {
        if self.triggered.swap(true, Ordering::AcqRel) {
            return;
        }

        let callbacks = {
            let mut pending = self.pending.lock();
            pending.closed = true;
            std::mem::take(&mut pending.callbacks)
        };

        // The fan-out owns the completion signal so waiters are released even
        // if this future is dropped half way.
        let done = Arc::clone(&self.done);
        let fan_out = tokio::spawn(async move {
            run_callbacks(callbacks).await;
            done.send_replace(true);
        });

        if let Err(e) = fan_out.await {
            error!(error = %e, "shutdown fan-out task failed");
            self.done.send_replace(true);
        }
    }

    /// Whether shutdown has completed.
    pub fn is_shutdown(&self) -> bool {
        *self.done.borrow()
    }

    /// Number of callbacks waiting for shutdown.
    pub fn pending(&self) -> usize {
        self.pending.lock().callbacks.len()
    }
}

impl Default for Closer {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_callbacks(callbacks: Vec<Callback>) {
    info!(callbacks = callbacks.len(), "running shutdown callbacks");

    let mut tasks = JoinSet::new();
    for callback in callbacks {
        // Build the future inside the task so a panicking factory only takes
        // down its own task.
        tasks.spawn(async move { callback().await });
    }

    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failed += 1;
                error!(error = %e, "error returned from closer callback");
            }
            Err(e) => {
                failed += 1;
                error!(error = %e, "closer callback panicked");
            }
        }
    }

    info!(failed, "shutdown callbacks finished");
}
