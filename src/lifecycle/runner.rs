//! Running long-lived components until told to stop.
//!
//! # Responsibilities
//! - `Service`: anything with a blocking run and a shutdown hook
//! - `run`: race a service against a cancellation context
//! - `Runner`: a one-shot "serve until cancelled, report outcome" operation
//! - `Runner::join`: run two runners as one, first error wins

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::lifecycle::signals::SignalContext;
use crate::Result;

/// The minimal interface accepted by [`run`].
pub trait Service: Send + Sync + 'static {
    /// Serve until stopped, then report the outcome.
    fn run(&self) -> impl Future<Output = Result<()>> + Send;

    /// Ask a running service to stop and wait for it to do so.
    fn shutdown(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Run `service`, calling its shutdown hook once `ctx` is cancelled.
///
/// Returns the shutdown result if cancellation wins, otherwise the run
/// result. A run that is still winding down after cancellation is left to
/// finish in the background.
pub async fn run<S: Service>(ctx: &SignalContext, service: Arc<S>) -> Result<()> {
    let running = Arc::clone(&service);
    let mut task = tokio::spawn(async move { running.run().await });

    tokio::select! {
        _ = ctx.cancelled() => service.shutdown().await,
        joined = &mut task => joined?,
    }
}

type RunFn = Box<dyn FnOnce(SignalContext) -> BoxFuture<'static, Result<()>> + Send>;

/// Serve until the given context is cancelled, then stop and report.
///
/// Invoked exactly once.
pub struct Runner {
    inner: RunFn,
}

impl Runner {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(SignalContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            inner: Box::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    pub async fn run(self, ctx: SignalContext) -> Result<()> {
        (self.inner)(ctx).await
    }

    /// Run both concurrently under one context.
    ///
    /// If either side fails, the other is told to stop. Waits for both and
    /// returns the first error observed.
    pub fn join(self, other: Runner) -> Runner {
        Runner::new(move |ctx: SignalContext| async move {
            let group = ctx.child();
            let mut left = tokio::spawn(self.run(group.clone()));
            let mut right = tokio::spawn(other.run(group.clone()));

            let (first, rest) = tokio::select! {
                res = &mut left => (res, right),
                res = &mut right => (res, left),
            };
            let first = first.map_err(crate::Error::from).and_then(|r| r);
            if let Err(e) = &first {
                tracing::warn!(error = %e, "Server exited with error, stopping the other");
                group.cancel();
            }

            let second = rest.await.map_err(crate::Error::from).and_then(|r| r);
            first.and(second)
        })
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner").finish_non_exhaustive()
    }
}
