//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGINT, SIGTERM, plus any extras)
//! - Translate deliveries into a cancellation context
//! - Escalate a repeated delivery into forced shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe, multiplexed per process)
//! - The context is an explicit value; independent instances never share
//!   watcher tasks. Production code should install exactly one.
//! - First delivery cancels `shutdown`; any later delivery cancels `force`
//! - Watcher tasks exit once `force` fires or every handle to the context
//!   is dropped

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Signals that cancel a default context: SIGINT (Ctrl-C) and SIGTERM
/// (orchestrator stop).
#[cfg(unix)]
pub fn default_signals() -> Vec<SignalKind> {
    vec![SignalKind::interrupt(), SignalKind::terminate()]
}

/// One-shot broadcast "time to stop", with a second stage for forcing.
///
/// Cloning shares the same state. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct SignalContext {
    shutdown: CancellationToken,
    force: CancellationToken,
    deliveries: Arc<AtomicUsize>,
    /// Cancels the watchers' stop token once the last handle goes away.
    watchers: Option<Arc<DropGuard>>,
}

impl SignalContext {
    /// A context not bound to any OS signal; cancel it with [`trigger`](Self::trigger).
    pub fn manual() -> Self {
        Self::from_tokens(CancellationToken::new(), CancellationToken::new())
    }

    /// A context cancelled by SIGINT or SIGTERM.
    pub fn new() -> Result<Self, crate::Error> {
        Self::builder().install()
    }

    pub fn builder() -> SignalContextBuilder {
        SignalContextBuilder::default()
    }

    fn from_tokens(shutdown: CancellationToken, force: CancellationToken) -> Self {
        Self {
            shutdown,
            force,
            deliveries: Arc::new(AtomicUsize::new(0)),
            watchers: None,
        }
    }

    /// A handle for a watcher task that does not keep the watchers alive.
    fn detached(&self) -> Self {
        Self {
            shutdown: self.shutdown.clone(),
            force: self.force.clone(),
            deliveries: self.deliveries.clone(),
            watchers: None,
        }
    }

    /// A context cancelled when this one is, which can also be cancelled on
    /// its own without affecting the parent.
    pub fn child(&self) -> Self {
        let mut child = Self::from_tokens(self.shutdown.child_token(), self.force.child_token());
        child.watchers = self.watchers.clone();
        child
    }

    /// Deliver one termination request.
    ///
    /// The first request begins graceful shutdown; any later one forces it.
    pub fn trigger(&self) {
        let previous = self.deliveries.fetch_add(1, Ordering::SeqCst);
        if previous == 0 && !self.shutdown.is_cancelled() {
            self.shutdown.cancel();
        } else {
            self.force();
        }
    }

    /// Begin graceful shutdown without counting as a delivery.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Skip the graceful drain.
    pub fn force(&self) {
        self.shutdown.cancel();
        self.force.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn is_forced(&self) -> bool {
        self.force.is_cancelled()
    }

    /// Completes once shutdown has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }

    /// Completes once shutdown has been forced.
    pub fn forced(&self) -> WaitForCancellationFuture<'_> {
        self.force.cancelled()
    }

    /// The graceful-shutdown token, for handing to other libraries.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// Configures which signals and parent a [`SignalContext`] listens to.
#[derive(Debug, Default)]
pub struct SignalContextBuilder {
    parent: Option<CancellationToken>,
    #[cfg(unix)]
    extra: Vec<SignalKind>,
}

impl SignalContextBuilder {
    /// Also cancel when `parent` is cancelled.
    pub fn parent(mut self, parent: &CancellationToken) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Listen for an extra signal besides SIGINT and SIGTERM.
    #[cfg(unix)]
    pub fn signal(mut self, kind: SignalKind) -> Self {
        self.extra.push(kind);
        self
    }

    /// Register the handlers and spawn the watcher tasks.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn install(self) -> Result<SignalContext, crate::Error> {
        self.spawn_watchers().map(|(ctx, _)| ctx)
    }

    fn spawn_watchers(self) -> Result<(SignalContext, Vec<JoinHandle<()>>), crate::Error> {
        let shutdown = match &self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let mut ctx = SignalContext::from_tokens(shutdown, CancellationToken::new());
        let stop = CancellationToken::new();
        let mut tasks = Vec::new();

        #[cfg(unix)]
        {
            let mut kinds = default_signals();
            for kind in self.extra {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            for kind in kinds {
                let stream = signal(kind).map_err(crate::Error::Signal)?;
                tasks.push(tokio::spawn(watch_signal(stream, kind, ctx.detached(), stop.clone())));
            }
        }

        #[cfg(not(unix))]
        tasks.push(tokio::spawn(watch_ctrl_c(ctx.detached(), stop.clone())));

        ctx.watchers = Some(Arc::new(stop.drop_guard()));
        Ok((ctx, tasks))
    }
}

#[cfg(unix)]
async fn watch_signal(
    mut stream: tokio::signal::unix::Signal,
    kind: SignalKind,
    ctx: SignalContext,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            received = stream.recv() => {
                if received.is_none() {
                    break;
                }
                if ctx.is_cancelled() {
                    tracing::warn!(signal = kind.as_raw_value(), "Repeated signal received, forcing shutdown");
                } else {
                    tracing::info!(signal = kind.as_raw_value(), "Signal received, initiating graceful shutdown");
                }
                ctx.trigger();
            }
            _ = ctx.forced() => break,
            _ = stop.cancelled() => break,
        }
    }
}

#[cfg(not(unix))]
async fn watch_ctrl_c(ctx: SignalContext, stop: CancellationToken) {
    loop {
        tokio::select! {
            received = tokio::signal::ctrl_c() => {
                if let Err(e) = received {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    break;
                }
                tracing::info!("Ctrl+C received");
                ctx.trigger();
            }
            _ = ctx.forced() => break,
            _ = stop.cancelled() => break,
        }
    }
}
